//! Laying cards off onto melds already on the table.
//!
//! The search walks the table one target (a set or run) at a time. Each
//! frame holds only the edits the *remaining* hand can pay for, no-op first,
//! so the work done is bounded by the product of per-target choices along
//! each path rather than by every subset of (card, target) pairs.

use crate::generation::{Pool, Usage, selections};
use crate::{Card, Error, Hand, Meld, Result, Run, Set, Suit, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

/// Position of a set or run inside one seat's meld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Slot {
    Set(usize),
    Run(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Target {
    pub seat: usize,
    pub slot: Slot,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.slot {
            Slot::Set(i) => write!(f, "seat {} set {i}", self.seat),
            Slot::Run(i) => write!(f, "seat {} run {i}", self.seat),
        }
    }
}

/// What gets played onto one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Edit {
    /// Cards joining a set. Wilds arrive materialized to the set's rank.
    Add { cards: Vec<Card> },
    /// Cards laid below and above a run, plus naturals swapped in for the
    /// run's wilds. `left` and `right` are in rank order.
    Extend {
        left: Vec<Card>,
        right: Vec<Card>,
        swaps: Vec<Card>,
    },
}

impl Edit {
    /// Every hand card this edit consumes.
    pub fn played(&self) -> Vec<Card> {
        match self {
            Edit::Add { cards } => cards.clone(),
            Edit::Extend { left, right, swaps } => {
                left.iter().chain(right).chain(swaps).copied().collect()
            }
        }
    }

    /// Wilds released back to the hand.
    pub fn freed(&self) -> u32 {
        match self {
            Edit::Add { .. } => 0,
            Edit::Extend { swaps, .. } => swaps.len() as u32,
        }
    }
}

fn joined(cards: &[Card]) -> String {
    let cards: Vec<String> = cards.iter().map(|c| c.to_string()).collect();
    cards.join(" ")
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Edit::Add { cards } => write!(f, "add {}", joined(cards)),
            Edit::Extend { left, right, swaps } => {
                let mut parts = Vec::new();
                if !left.is_empty() {
                    parts.push(format!("left {}", joined(left)));
                }
                if !right.is_empty() {
                    parts.push(format!("right {}", joined(right)));
                }
                if !swaps.is_empty() {
                    parts.push(format!("swap {}", joined(swaps)));
                }
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetEdit {
    pub target: Target,
    pub edit: Edit,
}

/// One legal play: a non-empty edit for each touched target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAssignment {
    edits: Vec<TargetEdit>,
    freed: u32,
}

impl UpdateAssignment {
    pub fn edits(&self) -> &[TargetEdit] {
        &self.edits
    }

    /// Wilds returned to the hand once the play is made.
    pub fn freed(&self) -> u32 {
        self.freed
    }

    /// Each played card and where it goes.
    pub fn placements(&self) -> Vec<(Card, Target)> {
        self.edits
            .iter()
            .flat_map(|e| e.edit.played().into_iter().map(move |card| (card, e.target)))
            .collect()
    }

    /// Make the play: played cards leave the hand, freed wilds join it as
    /// generic wilds, and every touched meld is rebuilt on the table.
    ///
    /// Nothing is modified unless the whole assignment is valid. Slot indexes
    /// refer to the table as it was searched; rebuilt melds are re-sorted, so
    /// an assignment is applied once.
    pub fn apply(&self, hand: &mut Hand, table: &mut Table) -> Result<()> {
        let played: Hand = self.edits.iter().flat_map(|e| e.edit.played()).collect();
        if let Some((card, _)) = played.iter().find(|&(card, n)| hand.count(&card) < n) {
            return Err(Error::MissingCard(card));
        }

        let mut rebuilt: BTreeMap<usize, (Vec<Set>, Vec<Run>)> = BTreeMap::new();
        for TargetEdit { target, edit } in &self.edits {
            let unknown = || Error::UnknownTarget(target.to_string());
            let (sets, runs) = match rebuilt.entry(target.seat) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let meld = table.meld(target.seat).ok_or_else(unknown)?;
                    entry.insert(meld.clone().into_parts())
                }
            };
            match (target.slot, edit) {
                (Slot::Set(i), Edit::Add { cards }) => {
                    let set = sets.get_mut(i).ok_or_else(unknown)?;
                    *set = set.extend(cards)?;
                }
                (Slot::Run(i), Edit::Extend { left, right, swaps }) => {
                    let run = runs.get_mut(i).ok_or_else(unknown)?;
                    let mut next = run.extend(left, right)?;
                    for &natural in swaps {
                        next = next.swap(natural)?.0;
                    }
                    *run = next;
                }
                _ => {
                    return Err(Error::InvalidExtend(format!("{target} cannot take {edit}")));
                }
            }
        }

        for card in played.cards() {
            hand.remove(&card);
        }
        hand.extend(std::iter::repeat_n(Card::wild(), self.freed as usize));
        for (seat, (sets, runs)) in rebuilt {
            table.lay(seat, Meld::new(sets, runs));
        }
        Ok(())
    }
}

impl fmt::Display for UpdateAssignment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let edits: Vec<String> = self
            .edits
            .iter()
            .map(|e| format!("{}: {}", e.target, e.edit))
            .collect();
        write!(f, "{}", edits.join("; "))?;
        if self.freed > 0 {
            write!(f, " (frees {} wild)", self.freed)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Piece {
    Set(Set),
    Run(Run),
}

fn targets(table: &Table) -> Vec<(Target, Piece)> {
    let mut targets = Vec::new();
    for (seat, meld) in table.melds() {
        for (i, set) in meld.sets().iter().enumerate() {
            let target = Target { seat, slot: Slot::Set(i) };
            targets.push((target, Piece::Set(set.clone())));
        }
        for (i, run) in meld.runs().iter().enumerate() {
            let target = Target { seat, slot: Slot::Run(i) };
            targets.push((target, Piece::Run(run.clone())));
        }
    }
    targets
}

fn noop(piece: &Piece) -> (Edit, Usage) {
    let edit = match piece {
        Piece::Set(_) => Edit::Add { cards: Vec::new() },
        Piece::Run(_) => Edit::Extend {
            left: Vec::new(),
            right: Vec::new(),
            swaps: Vec::new(),
        },
    };
    (edit, Usage::default())
}

/// Naturals of the set's rank, any mix, plus up to every wild in the pool.
/// Each wild takes the lowest suit not yet in the set.
fn set_options(set: &Set, pool: &Pool) -> Vec<(Edit, Usage)> {
    let rank = set.rank();
    let counts = Suit::ALL.map(|suit| pool.count(Card::natural(rank, suit)));
    let mut present = [false; 4];
    for suit in set.cards().iter().filter_map(|c| c.suit()) {
        present[suit.index()] = true;
    }

    let mut options = Vec::new();
    for picked in selections(counts) {
        for wilds in 0..=pool.wilds() {
            if wilds == 0 && picked == [0; 4] {
                continue;
            }
            let mut cards = Vec::new();
            let mut present = present;
            for suit in Suit::ALL {
                let n = picked[suit.index()] as usize;
                cards.extend(std::iter::repeat_n(Card::natural(rank, suit), n));
                present[suit.index()] |= n > 0;
            }
            for _ in 0..wilds {
                let suit = Suit::ALL
                    .into_iter()
                    .find(|s| !present[s.index()])
                    .unwrap_or(Suit::Clubs);
                present[suit.index()] = true;
                cards.push(Card::joker(rank, suit));
            }
            let usage = Usage::of(cards.iter().copied());
            options.push((Edit::Add { cards }, usage));
        }
    }
    options
}

/// Contiguous lay-offs walking outward from a run end through `ranks`, each
/// position filled by the natural (when held) or a wild. Returns each
/// sequence with its wild count, the empty one included.
fn side_options(suit: Suit, ranks: impl Iterator<Item = u8>, pool: &Pool) -> Vec<(Vec<Card>, u32)> {
    let mut options = vec![(Vec::new(), 0u32)];
    let mut frontier = vec![(Vec::new(), 0u32)];
    for rank in ranks {
        let natural = Card::natural(rank, suit);
        let held = pool.count(natural) > 0;
        let mut grown = Vec::new();
        for (cards, wilds) in &frontier {
            if held {
                let mut with = cards.clone();
                with.push(natural);
                grown.push((with, *wilds));
            }
            if *wilds < pool.wilds() {
                let mut with = cards.clone();
                with.push(Card::joker(rank, suit));
                grown.push((with, wilds + 1));
            }
        }
        if grown.is_empty() {
            break;
        }
        options.extend(grown.iter().cloned());
        frontier = grown;
    }
    options
}

fn run_options(run: &Run, pool: &Pool) -> Vec<(Edit, Usage)> {
    let suit = run.suit();
    let mut lefts = match run.next_left() {
        Some(_) => side_options(suit, (crate::RANK_MIN..run.start()).rev(), pool),
        None => vec![(Vec::new(), 0)],
    };
    for (cards, _) in &mut lefts {
        cards.reverse();
    }
    let rights = match run.next_right() {
        Some(_) => side_options(suit, run.end() + 1..=crate::RANK_MAX, pool),
        None => vec![(Vec::new(), 0)],
    };
    let swappable: Vec<Card> = run
        .cards()
        .iter()
        .filter(|c| c.is_materialized())
        .filter_map(|c| c.represented())
        .filter(|&natural| pool.count(natural) > 0)
        .collect();

    let mut options = Vec::new();
    for (left, left_wilds) in &lefts {
        for (right, right_wilds) in &rights {
            if left_wilds + right_wilds > pool.wilds() {
                continue;
            }
            for mask in 0..1u32 << swappable.len() {
                if left.is_empty() && right.is_empty() && mask == 0 {
                    continue;
                }
                let swaps: Vec<Card> = swappable
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, &card)| card)
                    .collect();
                let edit = Edit::Extend {
                    left: left.clone(),
                    right: right.clone(),
                    swaps,
                };
                let usage = Usage::of(edit.played());
                options.push((edit, usage));
            }
        }
    }
    options
}

/// Hand cards that could go onto each target one at a time, for diagnostics.
pub(crate) fn compatible(hand: &Hand, table: &Table) -> Vec<(Card, Target)> {
    let mut pairs = Vec::new();
    for (target, piece) in targets(table) {
        for (card, _) in hand.iter() {
            let fits = match &piece {
                Piece::Set(set) => card.is_wild() || card.rank() == Some(set.rank()),
                Piece::Run(run) => {
                    let ends = [run.next_left(), run.next_right()];
                    if card.is_wild() {
                        ends.iter().any(Option::is_some)
                    } else {
                        ends.contains(&Some(card))
                            || run
                                .cards()
                                .iter()
                                .any(|c| c.is_materialized() && c.represented() == Some(card))
                    }
                }
            };
            if fits {
                pairs.push((card, target));
            }
        }
    }
    pairs
}

struct Frame {
    options: Vec<(Edit, Usage)>,
    current: usize,
}

/// Lazy search over every way to lay off cards from a hand onto a table.
pub struct Updates {
    targets: Vec<(Target, Piece)>,
    pool: Pool,
    frames: Vec<Frame>,
    started: bool,
    done: bool,
}

impl Updates {
    fn new(hand: &Hand, table: &Table) -> Self {
        let targets = targets(table);
        Updates {
            frames: Vec::with_capacity(targets.len()),
            done: targets.is_empty(),
            targets,
            pool: Pool::of(hand),
            started: false,
        }
    }

    fn options(&self, depth: usize) -> Vec<(Edit, Usage)> {
        let (_, piece) = &self.targets[depth];
        let mut options = vec![noop(piece)];
        if !self.pool.is_empty() {
            match piece {
                Piece::Set(set) => options.extend(set_options(set, &self.pool)),
                Piece::Run(run) => options.extend(run_options(run, &self.pool)),
            }
        }
        options
    }

    /// Push no-op frames down to the last target.
    fn descend(&mut self) {
        while self.frames.len() < self.targets.len() {
            let options = self.options(self.frames.len());
            log::trace!(
                "{}: {} options",
                self.targets[self.frames.len()].0,
                options.len()
            );
            self.frames.push(Frame {
                options,
                current: 0,
            });
        }
    }

    /// Move the deepest frame with an untried option onto it, dropping
    /// exhausted frames. False once every frame is exhausted.
    fn step(&mut self) -> bool {
        while let Some(frame) = self.frames.last_mut() {
            self.pool.give(&frame.options[frame.current].1);
            frame.current += 1;
            if let Some((_, usage)) = frame.options.get(frame.current) {
                self.pool.take(usage);
                return true;
            }
            self.frames.pop();
        }
        false
    }

    fn assignment(&self) -> Option<UpdateAssignment> {
        let edits: Vec<TargetEdit> = self
            .frames
            .iter()
            .zip(&self.targets)
            .filter(|(frame, _)| frame.current != 0)
            .map(|(frame, (target, _))| TargetEdit {
                target: *target,
                edit: frame.options[frame.current].0.clone(),
            })
            .collect();
        if edits.is_empty() {
            return None;
        }
        let freed = edits.iter().map(|e| e.edit.freed()).sum();
        Some(UpdateAssignment { edits, freed })
    }
}

impl Iterator for Updates {
    type Item = UpdateAssignment;

    fn next(&mut self) -> Option<UpdateAssignment> {
        while !self.done {
            if self.started && !self.step() {
                self.done = true;
                break;
            }
            self.started = true;
            self.descend();
            if let Some(assignment) = self.assignment() {
                return Some(assignment);
            }
        }
        None
    }
}

/// Every legal lay-off of hand cards across all melds on the table.
pub fn iter_updates_multi(hand: &Hand, table: &Table) -> Updates {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "update search: {} cards, {} compatible (card, target) pairs",
            hand.len(),
            compatible(hand, table).len()
        );
    }
    Updates::new(hand, table)
}

/// Every legal lay-off onto a single meld, reported as seat 0.
pub fn iter_updates(hand: &Hand, meld: &Meld) -> Updates {
    let mut table = Table::new();
    table.lay(0, meld.clone());
    iter_updates_multi(hand, &table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn hand(s: &str) -> Hand {
        s.parse().unwrap()
    }

    fn set(s: &str) -> Set {
        Set::new(s.split_whitespace().map(|c| c.parse().unwrap())).unwrap()
    }

    fn run(s: &str) -> Run {
        Run::new(s.split_whitespace().map(|c| c.parse().unwrap())).unwrap()
    }

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    #[test]
    fn test_every_nine_to_every_set() {
        let mut table = Table::new();
        table.lay(0, Meld::new(vec![set("9S 9S 9D"), set("9C 9D 9H")], vec![]));
        table.lay(1, Meld::new(vec![set("9S 9H 9D"), set("9H 9S 9D")], vec![]));
        // each of the three nines goes to one of four sets or stays home
        let count = iter_updates_multi(&hand("9C 9H 9S"), &table).count();
        assert_eq!(count, 5 * 5 * 5 - 1);
    }

    #[test]
    fn test_many_compatible_pairs_stay_fast() {
        let mut table = Table::new();
        for seat in 0..8 {
            table.lay(
                seat,
                Meld::new(vec![set("9S 9D 9D"), set("9S 9S 9H")], vec![run("5D 6D 7D 8D")]),
            );
        }
        let h = hand("9C 9H 2C 3S 5H 6H JC QS KS AH 10C 4S 7S 2S");
        assert_eq!(h.len(), 14);
        assert!(compatible(&h, &table).len() > 30);

        let began = Instant::now();
        let count = iter_updates_multi(&h, &table).count();
        assert!(began.elapsed() < Duration::from_secs(1));
        // 17 choices for each nine (16 sets or none), minus playing nothing
        assert_eq!(count, 17 * 17 - 1);
    }

    #[test]
    fn test_set_wilds_take_missing_suits() {
        let options = set_options(&set("7S 7D 7H"), &Pool::of(&hand("* *")));
        let cards: Vec<Vec<Card>> = options
            .into_iter()
            .map(|(edit, _)| match edit {
                Edit::Add { cards } => cards,
                Edit::Extend { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(cards, vec![vec![card("*7C")], vec![card("*7C"), card("*7C")]]);

        let options = set_options(&set("7C 7S 7D *7H"), &Pool::of(&hand("*")));
        assert_eq!(options[0].0, Edit::Add { cards: vec![card("*7C")] });
    }

    #[test]
    fn test_run_extension_options() {
        let meld = Meld::new(vec![], vec![run("2H 3H 4H 5H")]);
        let updates: Vec<UpdateAssignment> = iter_updates(&hand("6H *"), &meld).collect();
        let rights: Vec<Edit> = updates.iter().map(|u| u.edits()[0].edit.clone()).collect();
        let extend = |right: &str| Edit::Extend {
            left: vec![],
            right: right.split_whitespace().map(card).collect(),
            swaps: vec![],
        };
        assert_eq!(rights.len(), 3);
        assert!(rights.contains(&extend("6H")));
        assert!(rights.contains(&extend("*6H")));
        assert!(rights.contains(&extend("6H *7H")));
    }

    #[test]
    fn test_run_left_extension_stops_at_deuce() {
        let meld = Meld::new(vec![], vec![run("4C 5C 6C 7C")]);
        let updates: Vec<UpdateAssignment> = iter_updates(&hand("3C 2C"), &meld).collect();
        let lefts: Vec<Edit> = updates.iter().map(|u| u.edits()[0].edit.clone()).collect();
        // 2C alone leaves a gap, so only 3C or 2C 3C
        assert_eq!(lefts.len(), 2);
        assert!(lefts.contains(&Edit::Extend {
            left: vec![card("2C"), card("3C")],
            right: vec![],
            swaps: vec![],
        }));
    }

    #[test]
    fn test_swap_frees_wild() {
        let mut table = Table::new();
        table.lay(3, Meld::new(vec![], vec![run("5D *6D 7D 8D")]));
        let mut h = hand("6D");
        let updates: Vec<UpdateAssignment> = iter_updates_multi(&h, &table).collect();
        // the freed wild cannot be reused to extend the run in the same play
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.freed(), 1);
        assert_eq!(
            update.placements(),
            vec![(card("6D"), Target { seat: 3, slot: Slot::Run(0) })]
        );

        update.apply(&mut h, &mut table).unwrap();
        assert_eq!(h, hand("*"));
        assert_eq!(table.meld(3).unwrap().runs()[0], run("5D 6D 7D 8D"));
    }

    #[test]
    fn test_mixed_table_assignments_apply() {
        let mut table = Table::new();
        table.lay(0, Meld::new(vec![set("7S 7D 7H")], vec![run("2H 3H 4H 5H")]));
        table.lay(1, Meld::new(vec![set("KC KD *KS")], vec![run("8C *9C 10C JC")]));
        let h = hand("7C 6H 9C QC AH * 3S");

        let updates: Vec<UpdateAssignment> = iter_updates_multi(&h, &table).collect();
        assert!(updates.iter().any(|u| u.freed() == 1));
        assert!(updates.iter().any(|u| {
            u.placements() == vec![(card("6H"), Target { seat: 0, slot: Slot::Run(0) })]
        }));

        for update in updates.iter().take(200) {
            let mut hand = h.clone();
            let mut after = table.clone();
            update.apply(&mut hand, &mut after).unwrap();
            let played = update.placements().len();
            assert_eq!(hand.len(), h.len() - played + update.freed() as usize);
            assert_eq!(after.len(), table.len());
        }
    }

    #[test]
    fn test_nothing_to_play() {
        let mut table = Table::new();
        table.lay(0, Meld::new(vec![set("7S 7D 7H")], vec![run("2H 3H 4H 5H")]));
        assert_eq!(iter_updates_multi(&hand("9C 10D"), &table).count(), 0);
        assert_eq!(iter_updates_multi(&Hand::new(), &table).count(), 0);
        assert_eq!(iter_updates_multi(&hand("7C"), &Table::new()).count(), 0);
    }

    #[test]
    fn test_apply_rejects_missing_cards() {
        let mut table = Table::new();
        table.lay(0, Meld::new(vec![set("7S 7D 7H")], vec![]));
        let update = iter_updates_multi(&hand("7C"), &table).next().unwrap();
        let mut other = hand("8C");
        let before = table.clone();
        assert_eq!(
            update.apply(&mut other, &mut table),
            Err(Error::MissingCard(card("7C")))
        );
        assert_eq!(table, before);
        assert_eq!(other, hand("8C"));
    }

    #[test]
    fn test_apply_rejects_unknown_seat() {
        let mut table = Table::new();
        table.lay(0, Meld::new(vec![set("7S 7D 7H")], vec![]));
        let update = iter_updates_multi(&hand("7C"), &table).next().unwrap();
        let mut h = hand("7C");
        assert!(matches!(
            update.apply(&mut h, &mut Table::new()),
            Err(Error::UnknownTarget(_))
        ));
    }
}
