//! Turn timer and idle monitor
//!
//! Timers are never cancelled. Each one captures what it was armed for, sleeps
//! outside the lobby lock and, on waking, re-checks under the lock whether it
//! still matters before touching anything.

use crate::lobby::Lobby;
use crate::moves::ActionCommand;
use crate::notify::notify_boot;
use log::{debug, error, info};
use shared::{GameId, UserId};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerRequest {
    /// Fires when `user_id` has used up `budget` on turn `turn`
    Turn {
        game_id: GameId,
        turn: usize,
        user_id: UserId,
        budget: Duration,
    },
    /// Looks for inactivity after `wait`
    Idle { game_id: GameId, wait: Duration },
}

impl TimerRequest {
    pub fn delay(&self) -> Duration {
        match self {
            TimerRequest::Turn { budget, .. } => *budget,
            TimerRequest::Idle { wait, .. } => *wait,
        }
    }
}

impl Lobby {
    /// Runs a woken timer against the current state
    pub fn fire_timer(&mut self, request: &TimerRequest) {
        match *request {
            TimerRequest::Turn {
                game_id,
                turn,
                user_id,
                ..
            } => self.check_turn_timer(game_id, turn, user_id),
            TimerRequest::Idle { game_id, .. } => self.check_idle(game_id),
        }
    }

    /// Ends the turn of a player whose clock ran out, unless the game ended
    /// or moved on since the timer was armed
    pub fn check_turn_timer(&mut self, game_id: GameId, turn: usize, user_id: UserId) {
        let game = match self.games.get_mut(&game_id) {
            Some(game) => game,
            None => {
                debug!("Turn timer for game {} woke after the game was removed", game_id);
                return;
            }
        };

        if game.end_condition.is_terminal() {
            debug!("{}Turn timer woke after the game ended", game.log_name());
            return;
        }

        if game.turn != turn {
            debug!(
                "{}Turn timer for turn {} is stale",
                game.log_name(),
                turn
            );
            return;
        }

        let seat = match game.player_index(user_id) {
            Some(seat) => seat,
            None => {
                error!("{}Turn timer for unseated user {}", game.log_name(), user_id);
                return;
            }
        };
        game.players[seat].time = Duration::ZERO;
        info!(
            "{}Time ran out for \"{}\".",
            game.log_name(),
            game.players[seat].name
        );

        if let Err(e) = self.apply_action(game_id, user_id, ActionCommand::TimeLimitReached) {
            error!("Game {}: could not apply time limit: {}", game_id, e);
        }
    }

    /// Ends or tears down a table nobody has acted on for the idle threshold
    pub fn check_idle(&mut self, game_id: GameId) {
        let game = match self.games.get(&game_id) {
            Some(game) => game,
            None => return,
        };

        let idle_for = game.last_action.elapsed();
        if idle_for < self.config.idle_timeout {
            debug!(
                "{}Idle check superseded; last action {:?} ago",
                game.log_name(),
                idle_for
            );
            return;
        }

        info!("{}Idle timeout has elapsed; ending the game.", game.log_name());
        let shared_replay = game.shared_replay;
        let running = game.running;
        let owner = game.owner;

        if shared_replay {
            notify_boot(game, &self.sessions);
        }

        let spectators: Vec<_> = game.spectators.iter().map(|s| s.session).collect();
        for session_id in spectators {
            if let Err(e) = self.unattend(session_id) {
                error!("Game {}: could not evict spectator {}: {}", game_id, session_id, e);
            }
        }

        if shared_replay {
            // Evicting the last spectator already tore the replay down
            self.games.remove(&game_id);
            return;
        }

        if running {
            if let Err(e) = self.apply_action(game_id, owner, ActionCommand::IdleLimitReached) {
                error!("Game {}: could not end idle game: {}", game_id, e);
            }
        } else {
            self.remove_player(game_id, owner);
        }
    }
}
