//! Game events recorded in a table's action log
//!
//! The log is append-only and is the single source of truth for rebuilding a
//! game. Fields that some viewers must not see are `Option`s so that a
//! redacted copy keeps the same shape as the original.

use crate::card::{CardIdentity, StackDirection};
use serde::{Deserialize, Serialize};

/// What a clue names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clue {
    Color(usize),
    Rank(u8),
}

impl Clue {
    pub fn touches(&self, card: &CardIdentity) -> bool {
        match *self {
            Clue::Color(suit) => card.suit == suit,
            Clue::Rank(rank) => card.rank == rank,
        }
    }
}

/// Why a game stopped
///
/// Set exactly once; `InProgress` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndCondition {
    #[default]
    InProgress,
    Normal,
    Strikeout,
    Timeout,
    Terminated,
    IdleTimeout,
}

impl EndCondition {
    /// Numeric code as stored alongside finished games
    pub fn code(self) -> u8 {
        match self {
            EndCondition::InProgress => 0,
            EndCondition::Normal => 1,
            EndCondition::Strikeout => 2,
            EndCondition::Timeout => 3,
            EndCondition::Terminated => 4,
            EndCondition::IdleTimeout => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EndCondition::InProgress),
            1 => Some(EndCondition::Normal),
            2 => Some(EndCondition::Strikeout),
            3 => Some(EndCondition::Timeout),
            4 => Some(EndCondition::Terminated),
            6 => Some(EndCondition::IdleTimeout),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != EndCondition::InProgress
    }

    /// Every terminal reason other than a normal finish counts as a loss
    pub fn is_loss(self) -> bool {
        self.is_terminal() && self != EndCondition::Normal
    }
}

/// One immutable entry of the action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// A card moved from the deck into a hand. `card` is hidden from `who`.
    Draw {
        who: usize,
        order: usize,
        card: Option<CardIdentity>,
    },
    Play {
        who: usize,
        order: usize,
        card: CardIdentity,
    },
    /// `failed` marks a misplay that went to the discard pile
    Discard {
        who: usize,
        order: usize,
        card: CardIdentity,
        failed: bool,
    },
    Clue {
        giver: usize,
        target: usize,
        clue: Clue,
        list: Vec<usize>,
        turn: usize,
    },
    Strike {
        num: usize,
        order: usize,
        turn: usize,
    },
    Status {
        clues: usize,
        score: usize,
        max_score: usize,
    },
    StackDirections {
        directions: Vec<StackDirection>,
    },
    Turn {
        num: usize,
        who: usize,
    },
    Text {
        text: String,
    },
    GameOver {
        end_condition: EndCondition,
        score: usize,
        loss: bool,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Draw { .. } => "draw",
            Action::Play { .. } => "play",
            Action::Discard { .. } => "discard",
            Action::Clue { .. } => "clue",
            Action::Strike { .. } => "strike",
            Action::Status { .. } => "status",
            Action::StackDirections { .. } => "stackDirections",
            Action::Turn { .. } => "turn",
            Action::Text { .. } => "text",
            Action::GameOver { .. } => "gameOver",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::GameOver { .. })
    }
}
