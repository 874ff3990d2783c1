//! Set, run and meld value types, and their canonical encoding.
//!
//! All three are immutable once built. Members are stored in canonical
//! order at construction, so the derived `Eq`, `Ord` and `Hash` never depend
//! on the order in which cards or sub-melds were discovered.

use crate::{Card, Error, Hand, RANK_MAX, RANK_MIN, Result, Suit, Wild};
use serde::Serialize;
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Order-independent byte encoding of a set, run or meld.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(Vec<u8>);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Equality, hashing and caching go through this, never through raw member order.
pub trait Canonical {
    fn canonical_key(&self) -> CanonicalKey;

    /// Stable 64-bit hash of the canonical key. Identical across runs and
    /// processes, unlike `std`'s randomly seeded hashers.
    fn fingerprint(&self) -> u64 {
        xxh3_64(self.canonical_key().as_bytes())
    }
}

fn card_codes(tag: u8, cards: &[Card]) -> Vec<u8> {
    let mut codes: Vec<u8> = cards.iter().map(|&c| u8::from(c)).collect();
    codes.sort_unstable();
    let mut key = Vec::with_capacity(codes.len() + 1);
    key.push(tag);
    key.extend(codes);
    key
}

fn generic_wild_error(card: &Card) -> Option<String> {
    matches!(card, Card::Wild(Wild::Generic))
        .then(|| format!("wild {card} must be materialized before joining a meld"))
}

/// A group of at least three cards sharing one rank. Suits are free and
/// duplicates are allowed since several decks are in play.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Set {
    rank: u8,
    cards: Vec<Card>,
}

impl Set {
    pub const MIN: usize = 3;

    pub fn new(cards: impl IntoIterator<Item = Card>) -> Result<Self> {
        let cards: Vec<Card> = cards.into_iter().collect();
        if cards.len() < Self::MIN {
            return Err(Error::InvalidSet(format!(
                "needs at least {} cards, got {}",
                Self::MIN,
                cards.len()
            )));
        }
        if let Some(message) = cards.iter().find_map(generic_wild_error) {
            return Err(Error::InvalidSet(message));
        }
        let rank = cards[0].rank().unwrap_or_default();
        if let Some(card) = cards.iter().find(|c| c.rank() != Some(rank)) {
            return Err(Error::InvalidSet(format!("{card} does not have rank {rank}")));
        }
        Ok(Self::assemble(rank, cards))
    }

    /// Build from cards already known to be valid.
    pub(crate) fn assemble(rank: u8, mut cards: Vec<Card>) -> Self {
        cards.sort_unstable();
        Set { rank, cards }
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn wilds(&self) -> usize {
        self.cards.iter().filter(|c| c.is_wild()).count()
    }

    /// A new set with `cards` added.
    pub fn extend(&self, cards: &[Card]) -> Result<Set> {
        if let Some(card) = cards.iter().find(|c| c.rank() != Some(self.rank)) {
            return Err(Error::InvalidExtend(format!(
                "{card} cannot join a set of rank {}",
                self.rank
            )));
        }
        Ok(Self::assemble(
            self.rank,
            self.cards.iter().chain(cards).copied().collect(),
        ))
    }
}

impl Canonical for Set {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey(card_codes(b'S', &self.cards))
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(f, "Set({})", cards.join(" "))
    }
}

/// At least four cards of one suit with consecutive ranks. Aces are high
/// only, so nothing wraps past the king.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Run {
    suit: Suit,
    start: u8,
    cards: Vec<Card>,
}

impl Run {
    pub const MIN: usize = 4;

    pub fn new(cards: impl IntoIterator<Item = Card>) -> Result<Self> {
        let mut cards: Vec<Card> = cards.into_iter().collect();
        if cards.len() < Self::MIN {
            return Err(Error::InvalidRun(format!(
                "needs at least {} cards, got {}",
                Self::MIN,
                cards.len()
            )));
        }
        if let Some(message) = cards.iter().find_map(generic_wild_error) {
            return Err(Error::InvalidRun(message));
        }
        cards.sort_by_key(|c| c.rank());
        let suit = cards[0].suit().unwrap_or(Suit::Clubs);
        if let Some(card) = cards.iter().find(|c| c.suit() != Some(suit)) {
            return Err(Error::InvalidRun(format!("{card} is not a {suit}")));
        }
        for pair in cards.windows(2) {
            let (a, b) = (pair[0].rank(), pair[1].rank());
            if b != a.map(|r| r + 1) {
                return Err(Error::InvalidRun(format!(
                    "{} and {} are not consecutive",
                    pair[0], pair[1]
                )));
            }
        }
        let start = cards[0].rank().unwrap_or(RANK_MIN);
        Ok(Run { suit, start, cards })
    }

    /// Build from cards already ordered by rank and known to be valid.
    pub(crate) fn assemble(suit: Suit, start: u8, cards: Vec<Card>) -> Self {
        debug_assert!(cards.len() >= Self::MIN);
        Run { suit, start, cards }
    }

    pub fn suit(&self) -> Suit {
        self.suit
    }

    /// Lowest rank in the run.
    pub fn start(&self) -> u8 {
        self.start
    }

    /// Highest rank in the run.
    pub fn end(&self) -> u8 {
        self.start + self.cards.len() as u8 - 1
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn wilds(&self) -> usize {
        self.cards.iter().filter(|c| c.is_wild()).count()
    }

    /// The natural card that would extend the run downwards.
    pub fn next_left(&self) -> Option<Card> {
        (self.start > RANK_MIN).then(|| Card::natural(self.start - 1, self.suit))
    }

    /// The natural card that would extend the run upwards.
    pub fn next_right(&self) -> Option<Card> {
        (self.end() < RANK_MAX).then(|| Card::natural(self.end() + 1, self.suit))
    }

    /// A new run with `left` prepended below the start and `right` appended
    /// above the end.
    pub fn extend(&self, left: &[Card], right: &[Card]) -> Result<Run> {
        if let Some(card) = left.iter().find(|c| c.rank().is_none_or(|r| r >= self.start)) {
            return Err(Error::InvalidExtend(format!("{card} is not below {self}")));
        }
        if let Some(card) = right.iter().find(|c| c.rank().is_none_or(|r| r <= self.end())) {
            return Err(Error::InvalidExtend(format!("{card} is not above {self}")));
        }
        let cards = left.iter().chain(&self.cards).chain(right).copied();
        Run::new(cards).map_err(|e| Error::InvalidExtend(e.to_string()))
    }

    /// Replace the wild standing in for `natural` with the real card,
    /// returning the new run and the freed (generic) wild.
    pub fn swap(&self, natural: Card) -> Result<(Run, Card)> {
        let position = self
            .cards
            .iter()
            .position(|c| c.is_materialized() && c.represented() == Some(natural))
            .ok_or_else(|| {
                Error::InvalidExtend(format!("no wild stands in for {natural} in {self}"))
            })?;
        let mut cards = self.cards.clone();
        cards[position] = natural;
        Ok((Run::assemble(self.suit, self.start, cards), Card::wild()))
    }
}

impl Canonical for Run {
    fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey(card_codes(b'R', &self.cards))
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cards: Vec<String> = self.cards.iter().map(|c| c.to_string()).collect();
        write!(f, "Run({})", cards.join(" "))
    }
}

/// A combination of sets and runs laid down together (a "lay").
///
/// Sets and runs are each kept sorted, so two melds built from the same
/// pieces in any order are equal and hash alike.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Meld {
    sets: Vec<Set>,
    runs: Vec<Run>,
}

impl Meld {
    pub fn new(mut sets: Vec<Set>, mut runs: Vec<Run>) -> Self {
        sets.sort_unstable();
        runs.sort_unstable();
        Meld { sets, runs }
    }

    pub fn sets(&self) -> &[Set] {
        &self.sets
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub(crate) fn into_parts(self) -> (Vec<Set>, Vec<Run>) {
        (self.sets, self.runs)
    }

    /// Every card in the meld, sets first.
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        let sets = self.sets.iter().flat_map(|s| s.cards().iter());
        let runs = self.runs.iter().flat_map(|r| r.cards().iter());
        sets.chain(runs).copied()
    }

    /// Total number of cards laid.
    pub fn len(&self) -> usize {
        self.cards().count()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.runs.is_empty()
    }

    /// The hand cards this meld consumes, wilds back in generic form.
    pub fn usage(&self) -> Hand {
        self.cards().collect()
    }

    pub fn points(&self) -> u32 {
        self.cards().map(|c| c.points()).sum()
    }
}

impl Canonical for Meld {
    fn canonical_key(&self) -> CanonicalKey {
        fn section(tag: u8, mut keys: Vec<CanonicalKey>) -> Vec<u8> {
            keys.sort_unstable();
            let mut bytes = vec![tag];
            bytes.extend((keys.len() as u32).to_le_bytes());
            for key in keys {
                bytes.extend((key.0.len() as u32).to_le_bytes());
                bytes.extend(key.0);
            }
            bytes
        }
        let mut key = section(b'M', self.sets.iter().map(Canonical::canonical_key).collect());
        key.extend(section(b'|', self.runs.iter().map(Canonical::canonical_key).collect()));
        CanonicalKey(key)
    }
}

impl fmt::Display for Meld {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .sets
            .iter()
            .map(|s| s.to_string())
            .chain(self.runs.iter().map(|r| r.to_string()))
            .collect();
        write!(f, "Meld[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ACE, JACK, KING, QUEEN};

    fn cards(s: &str) -> Vec<Card> {
        s.split_whitespace().map(|c| c.parse().unwrap()).collect()
    }

    #[test]
    fn test_set_construction() {
        let set = Set::new(cards("AH AH AD")).unwrap();
        assert_eq!(set.rank(), ACE);
        assert_eq!(set.cards().len(), 3);

        let with_wild = Set::new(cards("*AH AH AD")).unwrap();
        assert_eq!(with_wild.wilds(), 1);
        assert_ne!(set, with_wild);

        assert!(Set::new(cards("AH AD")).is_err());
        assert!(Set::new(cards("AH AD KD")).is_err());
        assert!(Set::new(cards("AH AD *")).is_err());
    }

    #[test]
    fn test_set_extend() {
        let set = Set::new(cards("AH AH AD")).unwrap();
        let bigger = set.extend(&cards("AS")).unwrap();
        assert_eq!(bigger, Set::new(cards("AS AH AH AD")).unwrap());
        assert!(set.extend(&cards("KD")).is_err());
    }

    #[test]
    fn test_run_construction() {
        let run = Run::new(cards("5H 3H 2H 4H")).unwrap();
        assert_eq!(run.start(), 2);
        assert_eq!(run.end(), 5);
        assert_eq!(run.cards(), cards("2H 3H 4H 5H").as_slice());

        let with_wilds = Run::new(cards("*2H 3H *4H 5H")).unwrap();
        assert_eq!(with_wilds.wilds(), 2);
        assert_ne!(run, with_wilds);

        let top = Run::new(cards("JH QH KH AH")).unwrap();
        assert_eq!(top.end(), ACE);
        assert_eq!(top.next_right(), None);
        assert_eq!(top.next_left(), Some(Card::new(10, Suit::Hearts).unwrap()));

        assert!(Run::new(cards("2H 3H 4H")).is_err());
        assert!(Run::new(cards("2H 3H 5H 6H")).is_err());
        assert!(Run::new(cards("2H 3H 4H 5D")).is_err());
        assert!(Run::new(cards("2H 3H 3H 4H")).is_err());
        assert!(Run::new(cards("2H 3H 4H *")).is_err());
    }

    #[test]
    fn test_run_extend() {
        let run = Run::new(cards("2H 3H 4H 5H")).unwrap();
        let longer = run.extend(&[], &cards("6H")).unwrap();
        assert_eq!(longer, Run::new(cards("2H 3H 4H 5H 6H")).unwrap());

        assert!(run.extend(&[], &cards("7H")).is_err());
        assert!(run.extend(&[], &cards("6S")).is_err());

        let run = Run::new(cards("8H 9H 10H JH")).unwrap();
        let both = run.extend(&cards("*7H"), &cards("QH")).unwrap();
        assert_eq!(both.start(), 7);
        assert_eq!(both.end(), QUEEN);
        assert!(run.extend(&cards("QH"), &[]).is_err());
    }

    #[test]
    fn test_run_swap() {
        let run = Run::new(cards("JS *QS KS AS")).unwrap();
        let queen = Card::new(QUEEN, Suit::Spades).unwrap();
        let (swapped, freed) = run.swap(queen).unwrap();
        assert_eq!(swapped, Run::new(cards("JS QS KS AS")).unwrap());
        assert_eq!(freed, Card::wild());
        assert!(run.swap(Card::new(KING, Suit::Spades).unwrap()).is_err());
        assert!(run.swap(Card::new(JACK, Suit::Hearts).unwrap()).is_err());
    }

    #[test]
    fn test_canonical_key_is_order_independent() {
        let a = Set::new(cards("7S *7D 7H 7S")).unwrap();
        let b = Set::new(cards("7S 7S 7H *7D")).unwrap();
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.fingerprint(), b.fingerprint());

        let run = Run::new(cards("2H 3H 4H 5H")).unwrap();
        let other = Set::new(cards("9C 9C 9D")).unwrap();
        let m1 = Meld::new(vec![a.clone(), other.clone()], vec![run.clone()]);
        let m2 = Meld::new(vec![other, b], vec![run]);
        assert_eq!(m1, m2);
        assert_eq!(m1.canonical_key(), m2.canonical_key());
        assert_eq!(m1.fingerprint(), m2.fingerprint());
    }

    #[test]
    fn test_canonical_key_distinguishes_wild_placement() {
        let a = Set::new(cards("7S 7D *7H")).unwrap();
        let b = Set::new(cards("7S 7D *7C")).unwrap();
        let c = Set::new(cards("7S 7D 7H")).unwrap();
        assert_ne!(a.canonical_key(), b.canonical_key());
        assert_ne!(a.canonical_key(), c.canonical_key());
    }

    #[test]
    fn test_meld_key_separates_sets_from_runs() {
        let set = Set::new(cards("2H 2H 2H")).unwrap();
        let run = Run::new(cards("2H 3H 4H 5H")).unwrap();
        let sets_only = Meld::new(vec![set.clone(), set.clone()], vec![]);
        let mixed = Meld::new(vec![set], vec![run]);
        assert_ne!(sets_only.canonical_key(), mixed.canonical_key());
    }

    #[test]
    fn test_meld_key_lengths_do_not_wrap() {
        let big = Set::new(std::iter::repeat_n(Card::new(9, Suit::Clubs).unwrap(), 300)).unwrap();
        let key = Meld::new(vec![big], vec![]).canonical_key();
        let bytes = key.as_bytes();
        assert_eq!(bytes[0], b'M');
        assert_eq!(bytes[1..5], 1u32.to_le_bytes());
        // tag plus 300 card codes
        assert_eq!(bytes[5..9], 301u32.to_le_bytes());
        assert_eq!(bytes.len(), 9 + 301 + 5);
    }

    #[test]
    fn test_meld_usage() {
        let meld = Meld::new(
            vec![Set::new(cards("7S 7D *7H")).unwrap()],
            vec![Run::new(cards("2H *3H 4H 5H")).unwrap()],
        );
        let usage = meld.usage();
        assert_eq!(usage.len(), 7);
        assert_eq!(usage.wilds(), 2);
        assert!(usage.cards().all(|c| !c.is_materialized()));
    }
}
