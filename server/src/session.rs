//! Connected clients as seen by the engine
//!
//! A session is owned by the lobby's session table for as long as its
//! connection lives. Games never own sessions: players and spectators keep a
//! [`SessionId`] that may point at nothing after a disconnect, and every
//! delivery helper here tolerates that.

use log::debug;
use shared::{GameId, ServerEvent, SessionId, SessionStatus, UserId};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Outbound half of a session's FIFO delivery channel
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub username: String,
    pub status: SessionStatus,
    pub current_game: Option<GameId>,
    sender: EventSender,
}

impl Session {
    pub fn new(id: SessionId, user_id: UserId, username: String, sender: EventSender) -> Self {
        Self {
            id,
            user_id,
            username,
            status: SessionStatus::Lobby,
            current_game: None,
            sender,
        }
    }

    /// Queues an event for this client. Fire-and-forget.
    pub fn emit(&self, event: ServerEvent) {
        if self.sender.send(event).is_err() {
            debug!("Session {} outbound channel is closed", self.id);
        }
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(ServerEvent::Warning {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ServerEvent::Error {
            message: message.into(),
        });
    }

    /// Moves the session to a new status and tells the client
    pub fn set_status(&mut self, status: SessionStatus, game_id: Option<GameId>) {
        self.status = status;
        self.current_game = game_id;
        self.emit(ServerEvent::SessionStatus { status, game_id });
    }
}

/// Every live session, keyed by id
#[derive(Debug, Default)]
pub struct Sessions {
    map: HashMap<SessionId, Session>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        self.map.insert(session.id, session);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.map.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.map.get_mut(&id)
    }

    pub fn find_by_user(&self, user_id: UserId) -> Option<SessionId> {
        self.map
            .values()
            .find(|s| s.user_id == user_id)
            .map(|s| s.id)
    }

    /// Delivers to a session handle that may be absent
    pub fn emit(&self, id: Option<SessionId>, event: ServerEvent) {
        if let Some(session) = id.and_then(|id| self.map.get(&id)) {
            session.emit(event);
        }
    }

    /// Updates status on a session handle that may be absent
    pub fn set_status(&mut self, id: Option<SessionId>, status: SessionStatus, game_id: Option<GameId>) {
        if let Some(session) = id.and_then(|id| self.map.get_mut(&id)) {
            session.set_status(status, game_id);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
