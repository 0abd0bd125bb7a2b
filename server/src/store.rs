//! Durable storage of finished games
//!
//! The engine only reads histories back for replays and writes a record when
//! a game ends. Calls are synchronous because they run inside the lobby's
//! critical section.

use log::debug;
use shared::{Action, EndCondition, GameId, Options, PlayerNote, Stats, UserId};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("game {0} not found")]
    NotFound(GameId),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Everything persisted about a finished game
#[derive(Debug, Clone)]
pub struct FinishedGame {
    pub id: GameId,
    pub name: String,
    pub seed: String,
    pub options: Options,
    pub score: usize,
    pub end_condition: EndCondition,
    pub player_ids: Vec<UserId>,
    /// JSON-serialized actions in log order
    pub actions: Vec<String>,
    pub notes: Vec<PlayerNote>,
    pub datetime_finished: u64,
}

pub trait ActionStore: Send + Sync {
    fn get_actions(&self, game_id: GameId) -> Result<Vec<String>, StoreError>;
    fn get_notes(&self, game_id: GameId) -> Result<Vec<PlayerNote>, StoreError>;
    fn save_game(&self, game: FinishedGame) -> Result<(), StoreError>;
    fn user_stats(&self, user_id: UserId) -> Result<Stats, StoreError>;
}

/// Serializes a log for storage
pub fn serialize_actions(actions: &[Action]) -> Result<Vec<String>, StoreError> {
    actions
        .iter()
        .map(|a| serde_json::to_string(a).map_err(StoreError::from))
        .collect()
}

/// Rebuilds a log from its stored form
pub fn deserialize_actions(raw: &[String]) -> Result<Vec<Action>, StoreError> {
    raw.iter()
        .map(|s| serde_json::from_str(s).map_err(StoreError::from))
        .collect()
}

/// Store that keeps finished games in process memory
#[derive(Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<GameId, FinishedGame>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_games<R>(
        &self,
        f: impl FnOnce(&mut HashMap<GameId, FinishedGame>) -> R,
    ) -> Result<R, StoreError> {
        let mut games = self
            .games
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(f(&mut games))
    }

    pub fn len(&self) -> usize {
        self.with_games(|games| games.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActionStore for MemoryStore {
    fn get_actions(&self, game_id: GameId) -> Result<Vec<String>, StoreError> {
        self.with_games(|games| games.get(&game_id).map(|g| g.actions.clone()))?
            .ok_or(StoreError::NotFound(game_id))
    }

    fn get_notes(&self, game_id: GameId) -> Result<Vec<PlayerNote>, StoreError> {
        self.with_games(|games| games.get(&game_id).map(|g| g.notes.clone()))?
            .ok_or(StoreError::NotFound(game_id))
    }

    fn save_game(&self, game: FinishedGame) -> Result<(), StoreError> {
        debug!("Storing game {} ({} actions)", game.id, game.actions.len());
        self.with_games(|games| {
            games.insert(game.id, game);
        })
    }

    fn user_stats(&self, user_id: UserId) -> Result<Stats, StoreError> {
        self.with_games(|games| {
            games
                .values()
                .filter(|g| g.player_ids.contains(&user_id))
                .fold(Stats::default(), |stats, g| Stats {
                    num_games: stats.num_games + 1,
                    best_score: stats.best_score.max(g.score),
                })
        })
    }
}
