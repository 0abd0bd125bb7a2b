//! The "ready" handshake
//!
//! A client sends `Ready` once its table UI is loaded, after joining,
//! reconnecting or opening a replay. The reply rebuilds its whole view of the
//! game in one ordered burst:
//!
//! 1. the action history, scrubbed for this viewer, as one `NotifyList`
//! 2. `YourTurn` if a live game is waiting on this viewer
//! 3. `Advanced`
//! 4. replays get everyone's notes; live games get the clocks, then all notes
//!    for spectators or only their own for a seated player
//! 5. the spectator list, unless this is a solo replay
//! 6. the leader and shared turn for shared replays

use crate::error::{validation, CommandError};
use crate::lobby::Lobby;
use crate::notify::{clock_event, replay_leader_event, spectators_event, your_turn_event};
use crate::scrub::{scrub_all, Viewer};
use crate::store::deserialize_actions;
use crate::utils::merge_notes;
use shared::{ServerEvent, SessionId, SessionStatus};

impl Lobby {
    pub(crate) fn ready(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let game_id = caller
            .game_id
            .ok_or_else(|| validation("You are not in a game."))?;
        let replay = caller.status.is_replay();

        let game = if caller.status == SessionStatus::Replay {
            None
        } else {
            let game = self
                .games
                .get(&game_id)
                .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
            if !game.running {
                return Err(validation(format!("Game {} has not started yet.", game_id)));
            }
            Some(game)
        };

        let (actions, notes) = match game {
            Some(game) if !replay => (game.actions.clone(), game.player_notes()),
            _ => {
                let raw = self.store.get_actions(game_id)?;
                let actions = deserialize_actions(&raw)?;
                let notes = self.store.get_notes(game_id)?;
                (actions, notes)
            }
        };

        let seat = game.and_then(|g| g.player_index(caller.user_id));
        let live = game.map(|g| g.is_live()).unwrap_or(false);
        let viewer = Viewer::for_session(caller.status, seat, live);

        let mut events = vec![ServerEvent::NotifyList {
            actions: scrub_all(&actions, viewer),
        }];

        if let (Some(game), false) = (game, replay) {
            if live && seat == Some(game.active_player) {
                events.push(your_turn_event(game, self.config.max_clues));
            }
        }

        events.push(ServerEvent::Advanced);

        match game {
            Some(game) if !replay => {
                events.push(clock_event(game));
                match seat.and_then(|s| notes.get(s)) {
                    Some(own) if caller.status == SessionStatus::Playing => {
                        events.push(ServerEvent::Notes {
                            notes: own.notes.clone(),
                        });
                    }
                    _ => events.push(ServerEvent::AllNotes {
                        notes: merge_notes(&notes),
                    }),
                }
            }
            _ => events.push(ServerEvent::AllNotes {
                notes: merge_notes(&notes),
            }),
        }

        if let Some(game) = game {
            events.push(spectators_event(game));
            if caller.status == SessionStatus::SharedReplay {
                events.push(replay_leader_event(game));
                events.push(ServerEvent::ReplayTurn {
                    turn: game.replay_turn,
                });
            }
        }

        for event in events {
            self.sessions.emit(Some(session_id), event);
        }
        Ok(())
    }
}
