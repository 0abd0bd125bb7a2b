//! Cards, suits and the variant table
//!
//! A deck is dealt once per game and never reordered. Apart from the
//! `discarded` flag a card is immutable after the deal.

use serde::{Deserialize, Serialize};

/// Highest rank a card can carry
pub const MAX_RANK: u8 = 5;

/// Rank distribution of a single suit (three 1s, two each of 2-4, one 5)
pub const RANKS_PER_SUIT: [u8; 10] = [1, 1, 1, 2, 2, 3, 3, 4, 4, 5];

/// The visible face of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardIdentity {
    pub suit: usize,
    pub rank: u8,
}

/// A dealt card and its position in the deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub suit: usize,
    pub rank: u8,
    /// Position in the deck, used as the card's identifier everywhere else
    pub order: usize,
    pub discarded: bool,
}

impl Card {
    pub fn new(suit: usize, rank: u8, order: usize) -> Self {
        Self {
            suit,
            rank,
            order,
            discarded: false,
        }
    }

    pub fn identity(&self) -> CardIdentity {
        CardIdentity {
            suit: self.suit,
            rank: self.rank,
        }
    }
}

/// Which way a play stack grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackDirection {
    Undecided,
    Up,
    Down,
    Finished,
}

impl StackDirection {
    /// Ranks that may be played next on a stack of the given height
    pub fn next_ranks(self, height: usize) -> Vec<u8> {
        let height = height as u8;
        match self {
            StackDirection::Undecided => vec![1, MAX_RANK],
            StackDirection::Up if height < MAX_RANK => vec![height + 1],
            StackDirection::Down if height < MAX_RANK => vec![MAX_RANK - height],
            _ => Vec::new(),
        }
    }
}

/// A rule variant. Only the suit list and the stacking mode matter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub id: usize,
    pub name: &'static str,
    pub suits: &'static [&'static str],
    /// Stacks may be built upward from 1 or downward from 5
    pub up_or_down: bool,
}

impl Variant {
    pub fn num_suits(&self) -> usize {
        self.suits.len()
    }

    /// True when every stack is built strictly 1 to 5
    pub fn is_monotonic(&self) -> bool {
        !self.up_or_down
    }

    pub fn initial_direction(&self) -> StackDirection {
        if self.up_or_down {
            StackDirection::Undecided
        } else {
            StackDirection::Up
        }
    }

    /// Best possible score with nothing discarded
    pub fn perfect_score(&self) -> usize {
        self.num_suits() * MAX_RANK as usize
    }
}

const FIVE_SUITS: &[&str] = &["Blue", "Green", "Yellow", "Red", "Purple"];
const SIX_SUITS: &[&str] = &["Blue", "Green", "Yellow", "Red", "Purple", "Teal"];

pub const VARIANTS: &[Variant] = &[
    Variant {
        id: 0,
        name: "No Variant",
        suits: FIVE_SUITS,
        up_or_down: false,
    },
    Variant {
        id: 1,
        name: "Six Suits",
        suits: SIX_SUITS,
        up_or_down: false,
    },
    Variant {
        id: 2,
        name: "Up or Down",
        suits: FIVE_SUITS,
        up_or_down: true,
    },
];

/// Looks up a variant by its identifier
pub fn variant(id: usize) -> Option<&'static Variant> {
    VARIANTS.iter().find(|v| v.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_creation() {
        let card = Card::new(2, 4, 17);
        assert_eq!(card.suit, 2);
        assert_eq!(card.rank, 4);
        assert_eq!(card.order, 17);
        assert!(!card.discarded);
        assert_eq!(card.identity(), CardIdentity { suit: 2, rank: 4 });
    }

    #[test]
    fn test_suit_distribution() {
        assert_eq!(RANKS_PER_SUIT.len(), 10);
        assert_eq!(RANKS_PER_SUIT.iter().filter(|&&r| r == 1).count(), 3);
        assert_eq!(RANKS_PER_SUIT.iter().filter(|&&r| r == 5).count(), 1);
    }

    #[test]
    fn test_variant_lookup() {
        assert_eq!(variant(0).map(|v| v.num_suits()), Some(5));
        assert_eq!(variant(1).map(|v| v.num_suits()), Some(6));
        assert!(variant(2).map(|v| !v.is_monotonic()).unwrap_or(false));
        assert!(variant(99).is_none());
    }

    #[test]
    fn test_perfect_score() {
        assert_eq!(variant(0).unwrap().perfect_score(), 25);
        assert_eq!(variant(1).unwrap().perfect_score(), 30);
    }

    #[test]
    fn test_next_ranks() {
        assert_eq!(StackDirection::Up.next_ranks(0), vec![1]);
        assert_eq!(StackDirection::Up.next_ranks(4), vec![5]);
        assert!(StackDirection::Up.next_ranks(5).is_empty());
        assert_eq!(StackDirection::Undecided.next_ranks(0), vec![1, 5]);
        assert_eq!(StackDirection::Down.next_ranks(1), vec![4]);
        assert!(StackDirection::Finished.next_ranks(5).is_empty());
    }
}
