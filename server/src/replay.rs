//! Shared replays: a finished game reviewed together, driven by one leader

use crate::error::{validation, CommandError};
use crate::game::Game;
use crate::lobby::Lobby;
use crate::notify::{notify_replay_leader, notify_replay_turn};
use crate::store::deserialize_actions;
use log::info;
use shared::{GameId, SessionId, SessionStatus, UserId};
use std::collections::HashMap;

impl Lobby {
    /// Opens a shared replay of a stored game, or joins the one already open
    pub(crate) fn create_shared_replay(
        &mut self,
        session_id: SessionId,
        game_id: GameId,
    ) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        if !matches!(caller.status, SessionStatus::Lobby | SessionStatus::Replay) {
            return Err(validation("You are already at a table."));
        }

        if let Some(game) = self.games.get(&game_id) {
            if !game.shared_replay {
                return Err(validation(format!("Game {} is still in progress.", game_id)));
            }
            return self.spectate(session_id, game_id);
        }

        let notes = self.store.get_notes(game_id)?;
        let raw = self.store.get_actions(game_id)?;
        deserialize_actions(&raw)?;

        let game = Game::new_shared_replay(game_id, caller.user_id, notes);
        info!("{}Shared replay opened by {}", game.log_name(), caller.username);
        self.games.insert(game_id, game);

        if let Err(e) = self.spectate(session_id, game_id) {
            self.games.remove(&game_id);
            return Err(e);
        }
        if let Some(game) = self.games.get(&game_id) {
            notify_replay_leader(game, &self.sessions);
        }
        self.touch(game_id);
        Ok(())
    }

    /// Moves everyone in the replay to `turn`
    pub(crate) fn replay_turn(&mut self, session_id: SessionId, turn: usize) -> Result<(), CommandError> {
        let (user_id, game_id) = self.replay_caller(session_id)?;
        let game = leader_game(&mut self.games, game_id, user_id)?;
        game.replay_turn = turn;
        notify_replay_turn(game, &self.sessions);
        self.touch(game_id);
        Ok(())
    }

    /// Hands control of the replay to another spectator
    pub(crate) fn replay_leader(&mut self, session_id: SessionId, new_leader: UserId) -> Result<(), CommandError> {
        let (user_id, game_id) = self.replay_caller(session_id)?;
        let game = leader_game(&mut self.games, game_id, user_id)?;
        if !game.spectators.iter().any(|s| s.user_id == new_leader) {
            return Err(validation("That user is not in this replay."));
        }
        game.owner = new_leader;
        info!("{}Leadership passed to user {}", game.log_name(), new_leader);
        notify_replay_leader(game, &self.sessions);
        self.touch(game_id);
        Ok(())
    }

    fn replay_caller(&self, session_id: SessionId) -> Result<(UserId, GameId), CommandError> {
        let caller = self.caller(session_id)?;
        match (caller.status, caller.game_id) {
            (SessionStatus::SharedReplay, Some(game_id)) => Ok((caller.user_id, game_id)),
            _ => Err(validation("You are not in a shared replay.")),
        }
    }
}

fn leader_game(
    games: &mut HashMap<GameId, Game>,
    game_id: GameId,
    user_id: UserId,
) -> Result<&mut Game, CommandError> {
    let game = games
        .get_mut(&game_id)
        .filter(|g| g.shared_replay)
        .ok_or_else(|| validation(format!("Shared replay {} does not exist.", game_id)))?;
    if game.owner != user_id {
        return Err(validation("Only the replay leader can do that."));
    }
    Ok(game)
}
