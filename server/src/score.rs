//! End-of-game rules and the achievable-score estimate
//!
//! Both are pure reads of the game; `check_end` and `update_max_score` are the
//! only places that write the results back.

use crate::game::Game;
use shared::{Card, EndCondition, Variant, MAX_RANK};

/// Highest score still reachable given the discard pile, or `None` when the
/// variant stacks in both directions and no estimate is made.
pub fn estimate_max_score(deck: &[Card], variant: &Variant) -> Option<usize> {
    if !variant.is_monotonic() {
        return None;
    }

    let total = (0..variant.num_suits())
        .map(|suit| {
            (1..=MAX_RANK)
                .take_while(|&rank| {
                    deck.iter()
                        .any(|c| c.suit == suit && c.rank == rank && !c.discarded)
                })
                .count()
        })
        .sum();
    Some(total)
}

/// Decides whether the game is over. Rules are checked in priority order and
/// the first match wins.
pub fn evaluate_end(game: &Game, max_strikes: usize) -> Option<EndCondition> {
    if game.strikes >= max_strikes {
        return Some(EndCondition::Strikeout);
    }

    if game.end_player == Some(game.active_player)
        && game.players.iter().all(|p| p.performed_final_turn)
    {
        return Some(EndCondition::Normal);
    }

    if game.score == game.max_score {
        return Some(EndCondition::Normal);
    }

    if game.variant().is_monotonic() && !any_playable_left(game) {
        return Some(EndCondition::Normal);
    }

    None
}

fn any_playable_left(game: &Game) -> bool {
    game.stacks.iter().enumerate().any(|(suit, &height)| {
        let next = height + 1;
        next <= MAX_RANK as usize
            && game
                .deck
                .iter()
                .any(|c| c.suit == suit && c.rank as usize == next && !c.discarded)
    })
}

/// Records the end condition if the game just ended. Returns true when the
/// game is over, whether now or earlier.
pub fn check_end(game: &mut Game, max_strikes: usize) -> bool {
    if game.end_condition.is_terminal() {
        return true;
    }
    match evaluate_end(game, max_strikes) {
        Some(condition) => {
            game.end_condition = condition;
            true
        }
        None => false,
    }
}

/// Refreshes `max_score` after a card left the game
pub fn update_max_score(game: &mut Game) {
    if let Some(max_score) = estimate_max_score(&game.deck, game.variant()) {
        game.max_score = max_score;
    }
    update_progress(game);
}

pub fn update_progress(game: &mut Game) {
    game.progress = if game.max_score == 0 {
        100
    } else {
        game.score * 100 / game.max_score
    };
}
