//! Broadcast fan-out
//!
//! Every function here runs under the lobby lock and only queues events on
//! session channels, so the order a client observes always matches the order
//! the server emitted in. Seated players are skipped in shared replays because
//! everyone there is attached as a spectator.

use crate::game::Game;
use crate::scrub::{scrub, Viewer};
use crate::session::Sessions;
use crate::utils::note_format;
use log::error;
use shared::{ServerEvent, SessionId, TableMessage};

/// Sessions that hear table-wide events, players first
pub fn recipients(game: &Game) -> Vec<SessionId> {
    let mut list = Vec::with_capacity(game.players.len() + game.spectators.len());
    if !game.shared_replay {
        list.extend(
            game.players
                .iter()
                .filter(|p| p.present)
                .filter_map(|p| p.session),
        );
    }
    for spectator in &game.spectators {
        if !list.contains(&spectator.session) {
            list.push(spectator.session);
        }
    }
    list
}

fn broadcast(game: &Game, sessions: &Sessions, event: &ServerEvent) {
    for id in recipients(game) {
        sessions.emit(Some(id), event.clone());
    }
}

pub fn table_message(game: &Game) -> TableMessage {
    TableMessage {
        name: game.name.clone(),
        running: game.running,
        num_players: game.players.len(),
        options: game.options.clone(),
        password: !game.password.is_empty(),
        shared_replay: game.shared_replay,
    }
}

/// Redraws the seat list for everyone waiting at a table
pub fn notify_player_change(game: &Game, sessions: &Sessions) {
    if game.running {
        error!("{}Player change notified after the game started", game.log_name());
        return;
    }

    for player in game.players.iter().filter(|p| p.present) {
        sessions.emit(player.session, ServerEvent::Table(table_message(game)));
        for (index, other) in game.players.iter().enumerate() {
            sessions.emit(
                player.session,
                ServerEvent::GamePlayer {
                    index,
                    name: other.name.clone(),
                    you: other.user_id == player.user_id,
                    present: other.present,
                    stats: other.stats,
                },
            );
        }
    }
}

/// Enables or disables the owner's start button
pub fn notify_table_ready(game: &Game, sessions: &Sessions) {
    if game.running {
        error!("{}Table readiness notified after the game started", game.log_name());
        return;
    }

    if let Some(owner) = game
        .players
        .iter()
        .find(|p| p.user_id == game.owner && p.present)
    {
        sessions.emit(
            owner.session,
            ServerEvent::TableReady {
                ready: game.players.len() >= 2,
            },
        );
    }
}

/// Presence of every seat, in seat order
pub fn notify_connected(game: &Game, sessions: &Sessions) {
    if !game.running {
        error!("{}Presence notified before the game started", game.log_name());
        return;
    }

    let list = game.players.iter().map(|p| p.present).collect();
    broadcast(game, sessions, &ServerEvent::Connected { list });
}

/// Sends the most recent action
pub fn notify_action(game: &Game, sessions: &Sessions) {
    if let Some(last) = game.actions.len().checked_sub(1) {
        notify_actions_from(game, sessions, last);
    }
}

/// Sends every action appended at or after `start`, scrubbed per recipient
pub fn notify_actions_from(game: &Game, sessions: &Sessions, start: usize) {
    if !game.running {
        error!("{}Actions notified before the game started", game.log_name());
        return;
    }

    for action in game.actions.iter().skip(start) {
        if !game.shared_replay {
            for (seat, player) in game.players.iter().enumerate().filter(|(_, p)| p.present) {
                sessions.emit(
                    player.session,
                    ServerEvent::Notify {
                        action: scrub(action, Viewer::Seat(seat)),
                    },
                );
            }
        }
        for spectator in &game.spectators {
            let viewer = game
                .player_index(spectator.user_id)
                .map_or(Viewer::Spectator, Viewer::Seat);
            sessions.emit(
                Some(spectator.session),
                ServerEvent::Notify {
                    action: scrub(action, viewer),
                },
            );
        }
    }
}

/// Prompt for the seat whose turn it is
pub fn your_turn_event(game: &Game, max_clues: usize) -> ServerEvent {
    ServerEvent::YourTurn {
        can_clue: game.clues > 0,
        can_discard: game.clues < max_clues,
        can_deck_play: game.options.deck_plays && game.cards_left() == 1,
    }
}

pub fn notify_your_turn(game: &Game, sessions: &Sessions, max_clues: usize) {
    if let Some(player) = game.players.get(game.active_player) {
        sessions.emit(player.session, your_turn_event(game, max_clues));
    }
}

pub fn spectators_event(game: &Game) -> ServerEvent {
    ServerEvent::Spectators {
        names: game.spectators.iter().map(|s| s.name.clone()).collect(),
    }
}

pub fn notify_spectators(game: &Game, sessions: &Sessions) {
    broadcast(game, sessions, &spectators_event(game));
}

/// Clock state with the active seat adjusted for the turn in progress
pub fn clock_event(game: &Game) -> ServerEvent {
    let elapsed = game.turn_begin.elapsed();
    let active = game.is_live().then_some(game.active_player);
    let times = game
        .players
        .iter()
        .enumerate()
        .map(|(seat, p)| {
            let ms = p.time.as_millis() as i64;
            if Some(seat) != active {
                ms
            } else if game.options.timed {
                ms - elapsed.as_millis() as i64
            } else {
                ms + elapsed.as_millis() as i64
            }
        })
        .collect();
    ServerEvent::Clock { times, active }
}

pub fn notify_clock(game: &Game, sessions: &Sessions) {
    if !game.running {
        error!("{}Clock notified before the game started", game.log_name());
        return;
    }
    broadcast(game, sessions, &clock_event(game));
}

/// Turn cue for each seat, or the pending special sound if one is set
pub fn notify_sound(game: &Game, sessions: &Sessions) {
    let sound_for = |seat: Option<usize>| -> String {
        match &game.sound {
            Some(sound) => sound.clone(),
            None if seat == Some(game.active_player) => "turn_us".to_string(),
            None => "turn_other".to_string(),
        }
    };

    for (seat, player) in game.players.iter().enumerate().filter(|(_, p)| p.present) {
        sessions.emit(
            player.session,
            ServerEvent::Sound {
                file: sound_for(Some(seat)),
            },
        );
    }
    for spectator in &game.spectators {
        sessions.emit(
            Some(spectator.session),
            ServerEvent::Sound {
                file: sound_for(None),
            },
        );
    }
}

/// Sends everyone at the table back to the lobby screen
pub fn notify_boot(game: &Game, sessions: &Sessions) {
    broadcast(game, sessions, &ServerEvent::Boot);
}

/// Merged notes on one card, for spectators only
pub fn notify_spectators_note(game: &Game, sessions: &Sessions, order: usize) {
    let notes: String = game
        .players
        .iter()
        .map(|p| note_format(&p.name, p.notes.get(order).map(String::as_str).unwrap_or("")))
        .collect();

    for spectator in &game.spectators {
        sessions.emit(
            Some(spectator.session),
            ServerEvent::Note {
                order,
                notes: notes.clone(),
            },
        );
    }
}

pub fn replay_leader_event(game: &Game) -> ServerEvent {
    let name = game
        .spectators
        .iter()
        .find(|s| s.user_id == game.owner)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    ServerEvent::ReplayLeader { name }
}

pub fn notify_replay_leader(game: &Game, sessions: &Sessions) {
    broadcast(game, sessions, &replay_leader_event(game));
}

pub fn notify_replay_turn(game: &Game, sessions: &Sessions) {
    broadcast(
        game,
        sessions,
        &ServerEvent::ReplayTurn {
            turn: game.replay_turn,
        },
    );
}

pub fn notify_chat(game: &Game, sessions: &Sessions) {
    if let Some(message) = game.chat.last() {
        broadcast(game, sessions, &ServerEvent::Chat(message.clone()));
    }
}
