//! Which cards matter for a hand.

use crate::{Card, Hand, Lut, Objective};
use serde::Serialize;
use std::collections::BTreeMap;

/// How often cards take part in melds for a hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Usefulness {
    /// Cards not (necessarily) held, keyed by card then by how many extra
    /// wilds had to be added before a meld could use them.
    pub missing: BTreeMap<Card, BTreeMap<u32, u32>>,
    /// Naturals held, with the number of melds each one appears in.
    pub existing: BTreeMap<Card, u32>,
    /// Fewest extra wilds with which any meld exists.
    pub distance: Option<u32>,
}

/// Count card utility for `hand` under `objective`.
///
/// Phantom wilds are added one at a time until some meld exists, then
/// `extra_wilds` more. Each wild in a meld counts towards the natural it
/// stands in for at the current phantom level. The search gives up once
/// enough phantoms have been added to lay the contract with wilds alone.
pub fn find_useful_cards(
    hand: &Hand,
    objective: Objective,
    lut: &mut Lut,
    extra_wilds: u32,
) -> Usefulness {
    let mut useful = Usefulness {
        missing: BTreeMap::new(),
        existing: hand
            .iter()
            .filter(|(card, _)| card.is_natural())
            .map(|(card, _)| (card, 0))
            .collect(),
        distance: None,
    };
    let ceiling = (objective.sets() * crate::Set::MIN + objective.runs() * crate::Run::MIN) as u32;
    let mut hand = hand.clone();

    for phantoms in 0..=ceiling {
        let melds = lut.iter_melds(&hand, objective);
        if melds.len() > 0 && useful.distance.is_none() {
            useful.distance = Some(phantoms);
        }
        for meld in melds {
            for card in meld.cards() {
                match card.represented() {
                    Some(natural) => {
                        *useful
                            .missing
                            .entry(natural)
                            .or_default()
                            .entry(phantoms)
                            .or_default() += 1;
                    }
                    None => *useful.existing.entry(card).or_default() += 1,
                }
            }
        }
        if useful
            .distance
            .is_some_and(|distance| phantoms >= distance.saturating_add(extra_wilds))
        {
            break;
        }
        hand.add(Card::wild());
    }
    log::debug!(
        "usefulness of {hand} for {objective}: {} missing, {} existing",
        useful.missing.len(),
        useful.existing.len()
    );
    useful
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> Card {
        s.parse().unwrap()
    }

    #[test]
    fn test_hand_one_card_short() {
        let hand: Hand = "7S 7D 2H 3H 4H".parse().unwrap();
        let mut lut = Lut::new();
        let useful = find_useful_cards(&hand, Objective::new(1, 1).unwrap(), &mut lut, 0);

        // one wild for the set and one for the run
        assert_eq!(useful.distance, Some(2));
        assert!(useful.missing[&card("5H")][&2] > 0);
        assert!(useful.missing[&card("7C")][&2] > 0);
        assert!(useful.missing[&card("7H")][&2] > 0);
        assert!(useful.existing[&card("2H")] > 0);
        assert!(useful.existing[&card("7S")] > 0);
    }

    #[test]
    fn test_complete_hand_with_extra_level() {
        let hand: Hand = "9C 9H 9S".parse().unwrap();
        let mut lut = Lut::new();
        let useful = find_useful_cards(&hand, Objective::new(1, 0).unwrap(), &mut lut, 1);

        assert_eq!(useful.distance, Some(0));
        // the plain triple, then 17 sets once a wild joins: 13 hold the 9C
        assert_eq!(useful.existing[&card("9C")], 1 + 13);
        // with one phantom the fourth nine can be any suit
        assert!(useful.missing[&card("9D")][&1] > 0);
        assert!(useful.missing.values().all(|levels| levels.keys().all(|&k| k == 1)));
    }

    #[test]
    fn test_dead_hand_still_terminates() {
        let hand: Hand = "2C 5D 9H KS".parse().unwrap();
        let mut lut = Lut::new();
        let useful = find_useful_cards(&hand, Objective::new(1, 0).unwrap(), &mut lut, 0);
        // a lone natural needs two wilds to make a set
        assert_eq!(useful.distance, Some(2));
        assert!(useful.existing.values().all(|&n| n > 0));
    }
}
