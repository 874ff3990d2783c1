//! Set, run and meld enumeration.
//!
//! Sets and runs are generated from *shapes*: a rank's per-suit natural
//! counts plus the wild count for sets, a suit's rank-presence bitmask plus
//! the wild count for runs. Everything a recognizer emits depends on the hand
//! only through these shapes, which is what lets the lookup tables in
//! [`crate::lut`] share results between hands.

use crate::{Card, Hand, Meld, Objective, RANK_MAX, RANK_MIN, Run, Set, Suit, ranks};
use std::ops::Range;

/// One slot per natural card plus one for wilds.
pub(crate) const SLOTS: usize = 53;
const WILD_SLOT: usize = 52;

fn slot(card: Card) -> usize {
    match card {
        Card::Natural { rank, suit } => (rank.get() - RANK_MIN) as usize * 4 + suit.index(),
        Card::Wild(_) => WILD_SLOT,
    }
}

fn rank_bit(rank: u8) -> u16 {
    1 << (rank - RANK_MIN)
}

/// Hand cards consumed by a candidate, as (slot, count) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Usage(Vec<(usize, u32)>);

impl Usage {
    pub fn of(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut slots: Vec<(usize, u32)> = Vec::new();
        for card in cards {
            let slot = slot(card);
            match slots.iter_mut().find(|(s, _)| *s == slot) {
                Some((_, count)) => *count += 1,
                None => slots.push((slot, 1)),
            }
        }
        slots.sort_unstable();
        Usage(slots)
    }
}

/// Remaining card instances during a search. Every wild is one resource,
/// however it ends up materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pool([u32; SLOTS]);

impl Pool {
    pub fn of(hand: &Hand) -> Self {
        let mut counts = [0u32; SLOTS];
        for (card, count) in hand.iter() {
            counts[slot(card)] += count;
        }
        Pool(counts)
    }

    pub fn count(&self, card: Card) -> u32 {
        self.0[slot(card)]
    }

    pub fn wilds(&self) -> u32 {
        self.0[WILD_SLOT]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }

    pub fn covers(&self, usage: &Usage) -> bool {
        usage.0.iter().all(|&(slot, count)| self.0[slot] >= count)
    }

    pub fn take(&mut self, usage: &Usage) {
        for &(slot, count) in &usage.0 {
            self.0[slot] -= count;
        }
    }

    pub fn give(&mut self, usage: &Usage) {
        for &(slot, count) in &usage.0 {
            self.0[slot] += count;
        }
    }
}

/// What set enumeration needs to know about one rank of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SetShape {
    pub suits: [u32; 4],
    pub wilds: u32,
}

impl SetShape {
    pub fn of(hand: &Hand, rank: u8) -> Self {
        SetShape {
            suits: hand.suit_counts(rank),
            wilds: hand.wilds(),
        }
    }
}

/// A rank-free set: how many naturals of each suit, and how many wilds
/// materialized to each suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SetPattern {
    naturals: [u32; 4],
    wilds: [u32; 4],
}

impl SetPattern {
    pub fn materialize(&self, rank: u8) -> Set {
        let mut cards = Vec::new();
        for suit in Suit::ALL {
            let n = self.naturals[suit.index()] as usize;
            let w = self.wilds[suit.index()] as usize;
            cards.extend(std::iter::repeat_n(Card::natural(rank, suit), n));
            cards.extend(std::iter::repeat_n(Card::joker(rank, suit), w));
        }
        Set::assemble(rank, cards)
    }
}

/// Every per-suit selection with `0 <= pick[s] <= counts[s]`.
pub(crate) fn selections(counts: [u32; 4]) -> Vec<[u32; 4]> {
    let mut picks = Vec::new();
    for a in 0..=counts[0] {
        for b in 0..=counts[1] {
            for c in 0..=counts[2] {
                for d in 0..=counts[3] {
                    picks.push([a, b, c, d]);
                }
            }
        }
    }
    picks
}

/// Every way to spread `k` indistinguishable wilds over the four suits.
fn suit_multisets(k: u32) -> Vec<[u32; 4]> {
    let mut spreads = Vec::new();
    for a in 0..=k {
        for b in 0..=k - a {
            for c in 0..=k - a - b {
                spreads.push([a, b, c, k - a - b - c]);
            }
        }
    }
    spreads
}

/// All sets for one rank shape. Wild placements are enumerated as suit
/// multisets, so swapping two wilds' suits never yields a second copy.
pub(crate) fn set_patterns(shape: SetShape) -> Vec<SetPattern> {
    let naturals: u32 = shape.suits.iter().sum();
    if (naturals as usize + shape.wilds as usize) < Set::MIN {
        return Vec::new();
    }
    let spreads: Vec<Vec<[u32; 4]>> = (0..=shape.wilds).map(suit_multisets).collect();
    let mut patterns = Vec::new();
    for picked in selections(shape.suits) {
        let held: u32 = picked.iter().sum();
        for (k, spread) in spreads.iter().enumerate() {
            if (held as usize + k) < Set::MIN {
                continue;
            }
            for &wilds in spread {
                patterns.push(SetPattern {
                    naturals: picked,
                    wilds,
                });
            }
        }
    }
    patterns
}

/// What run enumeration needs to know about one suit of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RunShape {
    pub ranks: u16,
    pub wilds: u32,
}

impl RunShape {
    pub fn of(hand: &Hand, suit: Suit) -> Self {
        RunShape {
            ranks: hand.rank_mask(suit),
            wilds: hand.wilds(),
        }
    }
}

/// A suit-free run: a rank window and which positions are wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunPattern {
    start: u8,
    end: u8,
    wilds: u16,
}

impl RunPattern {
    pub fn materialize(&self, suit: Suit) -> Run {
        let cards = (self.start..=self.end)
            .map(|rank| match self.wilds & rank_bit(rank) {
                0 => Card::natural(rank, suit),
                _ => Card::joker(rank, suit),
            })
            .collect();
        Run::assemble(suit, self.start, cards)
    }
}

/// Submasks of `mask` with at most `limit` bits set.
fn submasks(mask: u16, limit: u32) -> Vec<u16> {
    let mut subs = vec![0];
    if limit == 0 {
        return subs;
    }
    let mut sub = mask;
    while sub != 0 {
        if sub.count_ones() <= limit {
            subs.push(sub);
        }
        sub = (sub - 1) & mask;
    }
    subs
}

/// All runs for one suit shape: every window of length four or more whose
/// gaps the wilds can fill, and every extra substitution of held positions
/// by leftover wilds.
pub(crate) fn run_patterns(shape: RunShape) -> Vec<RunPattern> {
    let mut patterns = Vec::new();
    let min = Run::MIN as u8;
    for start in RANK_MIN..=RANK_MAX + 1 - min {
        let mut window = 0u16;
        for end in start..=RANK_MAX {
            window |= rank_bit(end);
            let gaps = window & !shape.ranks;
            if gaps.count_ones() > shape.wilds {
                // widening only adds gaps
                break;
            }
            if end + 1 - start < min {
                continue;
            }
            let spare = shape.wilds - gaps.count_ones();
            for extra in submasks(window & shape.ranks, spare) {
                patterns.push(RunPattern {
                    start,
                    end,
                    wilds: gaps | extra,
                });
            }
        }
    }
    patterns
}

/// Every set that can be formed from the hand.
///
/// Finite and restartable: calling again yields the same sequence.
pub fn iter_sets(hand: &Hand) -> impl Iterator<Item = Set> + use<> {
    let shapes: Vec<(u8, SetShape)> = ranks().map(|rank| (rank, SetShape::of(hand, rank))).collect();
    shapes.into_iter().flat_map(|(rank, shape)| {
        set_patterns(shape)
            .into_iter()
            .map(move |pattern| pattern.materialize(rank))
    })
}

/// Every run that can be formed from the hand, including every shorter
/// window inside a longer one.
pub fn iter_runs(hand: &Hand) -> impl Iterator<Item = Run> + use<> {
    let shapes: Vec<(Suit, RunShape)> = Suit::ALL
        .into_iter()
        .map(|suit| (suit, RunShape::of(hand, suit)))
        .collect();
    shapes.into_iter().flat_map(|(suit, shape)| {
        run_patterns(shape)
            .into_iter()
            .map(move |pattern| pattern.materialize(suit))
    })
}

/// Every meld satisfying `objective` from the hand: exactly the required
/// number of sets and runs, no card instance used twice.
pub fn iter_melds(hand: &Hand, objective: Objective) -> Melds {
    let sets = match objective.sets() {
        0 => Vec::new(),
        _ => iter_sets(hand).collect(),
    };
    let runs = match objective.runs() {
        0 => Vec::new(),
        _ => iter_runs(hand).collect(),
    };
    Melds::new(sets, runs, objective, Pool::of(hand))
}

/// Lazy meld search over a fixed list of candidate sets and runs.
///
/// Candidates are picked in non-decreasing index order, sets first, so every
/// multiset of candidates is visited once. The same candidate may be picked
/// twice when the hand holds two copies of its cards.
pub struct Melds {
    sets: Vec<(Set, Usage)>,
    runs: Vec<(Run, Usage)>,
    objective: Objective,
    pool: Pool,
    picks: Vec<usize>,
    next: usize,
    done: bool,
}

impl Melds {
    pub(crate) fn new(sets: Vec<Set>, runs: Vec<Run>, objective: Objective, pool: Pool) -> Self {
        log::trace!(
            "meld search for {objective}: {} set and {} run candidates",
            sets.len(),
            runs.len()
        );
        let sets = sets
            .into_iter()
            .map(|s| {
                let usage = Usage::of(s.cards().iter().copied());
                (s, usage)
            })
            .collect();
        let runs = runs
            .into_iter()
            .map(|r| {
                let usage = Usage::of(r.cards().iter().copied());
                (r, usage)
            })
            .collect();
        Melds {
            sets,
            runs,
            objective,
            pool,
            picks: Vec::with_capacity(objective.total()),
            next: 0,
            done: false,
        }
    }

    /// Candidate index range for the pick at `depth`.
    fn bounds(&self, depth: usize) -> Range<usize> {
        if depth < self.objective.sets() {
            0..self.sets.len()
        } else {
            self.sets.len()..self.sets.len() + self.runs.len()
        }
    }

    fn usage(&self, index: usize) -> &Usage {
        match index.checked_sub(self.sets.len()) {
            None => &self.sets[index].1,
            Some(run) => &self.runs[run].1,
        }
    }

    fn backtrack(&mut self) {
        match self.picks.pop() {
            Some(index) => {
                let usage = self.usage(index).clone();
                self.pool.give(&usage);
                self.next = index + 1;
            }
            None => self.done = true,
        }
    }

    fn assemble(&self) -> Meld {
        let mut sets = Vec::with_capacity(self.objective.sets());
        let mut runs = Vec::with_capacity(self.objective.runs());
        for &index in &self.picks {
            match index.checked_sub(self.sets.len()) {
                None => sets.push(self.sets[index].0.clone()),
                Some(run) => runs.push(self.runs[run].0.clone()),
            }
        }
        Meld::new(sets, runs)
    }
}

impl Iterator for Melds {
    type Item = Meld;

    fn next(&mut self) -> Option<Meld> {
        let total = self.objective.total();
        while !self.done {
            let depth = self.picks.len();
            if depth == total {
                let meld = self.assemble();
                self.backtrack();
                return Some(meld);
            }
            let bounds = self.bounds(depth);
            let start = self.next.max(bounds.start);
            let found = (start..bounds.end).find(|&i| self.pool.covers(self.usage(i)));
            match found {
                Some(index) => {
                    let usage = self.usage(index).clone();
                    self.pool.take(&usage);
                    self.picks.push(index);
                    self.next = if depth + 1 < total && self.bounds(depth + 1) == bounds {
                        index
                    } else {
                        0
                    };
                }
                None => self.backtrack(),
            }
        }
        None
    }
}
