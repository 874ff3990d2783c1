use crate::{Card, Error, Hand, Objective, Result, Suit, ranks};
use rand::Rng;
use rand::seq::SliceRandom;

/// The seven rounds of a game: what must be laid down, and how many cards
/// each player is dealt.
pub const CONTRACTS: [(Objective, usize); 7] = [
    (Objective::contract(2, 0), 10),
    (Objective::contract(1, 1), 10),
    (Objective::contract(0, 2), 10),
    (Objective::contract(3, 0), 10),
    (Objective::contract(2, 1), 12),
    (Objective::contract(1, 2), 12),
    (Objective::contract(0, 3), 12),
];

/// Decks shuffled together for a table of `players`.
pub fn decks_for_players(players: usize) -> Option<usize> {
    match players {
        2..=4 => Some(2),
        5..=8 => Some(3),
        _ => None,
    }
}

/// A draw pile built from one or more standard decks, each with two jokers.
/// Cards are drawn from the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub const JOKERS: usize = 2;

    /// `decks` full decks in order, unshuffled.
    pub fn new(decks: usize) -> Self {
        let mut cards = Vec::with_capacity(decks * (52 + Self::JOKERS));
        for _ in 0..decks {
            for suit in Suit::ALL {
                cards.extend(ranks().map(|rank| Card::natural(rank, suit)));
            }
            cards.extend(std::iter::repeat_n(Card::wild(), Self::JOKERS));
        }
        Deck { cards }
    }

    pub fn shuffled<R: Rng + ?Sized>(decks: usize, rng: &mut R) -> Self {
        let mut deck = Self::new(decks);
        deck.shuffle(rng);
        deck
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn pop(&mut self) -> Result<Card> {
        self.cards.pop().ok_or(Error::EmptyDeck)
    }

    /// Deal `n` cards into a new hand. Fails without drawing anything when
    /// fewer than `n` remain.
    pub fn deal(&mut self, n: usize) -> Result<Hand> {
        if n > self.cards.len() {
            return Err(Error::EmptyDeck);
        }
        let at = self.cards.len() - n;
        Ok(self.cards.split_off(at).into_iter().collect())
    }

    /// Remove one specific card, e.g. one already seen in a hand.
    pub fn take(&mut self, card: Card) -> Result<()> {
        if card.is_materialized() {
            return Err(Error::InvalidCard(format!(
                "{card} is materialized and cannot come from a deck"
            )));
        }
        let position = self
            .cards
            .iter()
            .position(|&c| c == card)
            .ok_or(Error::MissingCard(card))?;
        self.cards.swap_remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_new_deck_contents() {
        let mut deck = Deck::new(2);
        assert_eq!(deck.len(), 108);
        let all = deck.deal(108).unwrap();
        assert_eq!(all.wilds(), 4);
        assert_eq!(all.count(&"QH".parse().unwrap()), 2);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_deal_is_all_or_nothing() {
        let mut deck = Deck::new(1);
        let hand = deck.deal(10).unwrap();
        assert_eq!(hand.len(), 10);
        assert_eq!(deck.len(), 44);
        assert_eq!(deck.deal(45), Err(Error::EmptyDeck));
        assert_eq!(deck.len(), 44);
    }

    #[test]
    fn test_pop_empty() {
        let mut deck = Deck::new(0);
        assert_eq!(deck.pop(), Err(Error::EmptyDeck));
    }

    #[test]
    fn test_take() {
        let mut deck = Deck::new(1);
        let seven: Card = "7S".parse().unwrap();
        deck.take(seven).unwrap();
        assert_eq!(deck.take(seven), Err(Error::MissingCard(seven)));
        deck.take(Card::wild()).unwrap();
        deck.take(Card::wild()).unwrap();
        assert_eq!(deck.take(Card::wild()), Err(Error::MissingCard(Card::wild())));
        let joker: Card = "*7S".parse().unwrap();
        assert!(matches!(deck.take(joker), Err(Error::InvalidCard(_))));
        assert_eq!(deck.len(), 51);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let a = Deck::shuffled(2, &mut SmallRng::seed_from_u64(11));
        let b = Deck::shuffled(2, &mut SmallRng::seed_from_u64(11));
        assert_eq!(a, b);
        assert_ne!(a, Deck::new(2));
    }

    #[test]
    fn test_contracts() {
        assert_eq!(CONTRACTS.len(), 7);
        assert!(CONTRACTS.iter().all(|(o, _)| o.total() > 0));
        assert_eq!(CONTRACTS[1], (Objective::new(1, 1).unwrap(), 10));
        assert_eq!(CONTRACTS[6], (Objective::new(0, 3).unwrap(), 12));
        assert_eq!(decks_for_players(4), Some(2));
        assert_eq!(decks_for_players(5), Some(3));
        assert_eq!(decks_for_players(9), None);
    }
}
