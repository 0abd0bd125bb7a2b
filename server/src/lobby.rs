//! Registry of live games and connected sessions
//!
//! A single [`Lobby`] owns every table and every session in the process. It
//! is never shared directly: the [`Coordinator`](crate::coordinator::Coordinator)
//! wraps it in one mutex, so every command, timer wake-up and connection event
//! runs to completion against a consistent view of all tables. Handlers never
//! await while holding it.

use crate::config::ServerConfig;
use crate::error::{validation, CommandError, GENERIC_FAILURE};
use crate::game::Game;
use crate::notify::{notify_connected, notify_player_change, notify_table_ready};
use crate::session::{EventSender, Session, Sessions};
use crate::store::ActionStore;
use crate::timers::TimerRequest;
use log::{debug, error, info, warn};
use shared::{Command, GameId, ServerEvent, SessionId, SessionStatus, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Identity of the session issuing a command, copied out so the session
/// table is free to be borrowed again
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub user_id: UserId,
    pub username: String,
    pub status: SessionStatus,
    pub game_id: Option<GameId>,
}

pub struct Lobby {
    pub(crate) games: HashMap<GameId, Game>,
    pub(crate) sessions: Sessions,
    pub(crate) store: Arc<dyn ActionStore>,
    pub(crate) config: ServerConfig,
    next_game_id: GameId,
    next_session_id: SessionId,
    /// Timers requested by the last critical section, spawned once the lock is released
    timers: Vec<TimerRequest>,
}

impl Lobby {
    pub fn new(config: ServerConfig, store: Arc<dyn ActionStore>) -> Self {
        Self {
            games: HashMap::new(),
            sessions: Sessions::new(),
            store,
            config,
            next_game_id: 1,
            next_session_id: 1,
            timers: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn game(&self, game_id: GameId) -> Option<&Game> {
        self.games.get(&game_id)
    }

    pub fn game_mut(&mut self, game_id: GameId) -> Option<&mut Game> {
        self.games.get_mut(&game_id)
    }

    pub fn games_len(&self) -> usize {
        self.games.len()
    }

    pub fn session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn sessions_len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn allocate_game_id(&mut self) -> GameId {
        while self.games.contains_key(&self.next_game_id) {
            self.next_game_id += 1;
        }
        let id = self.next_game_id;
        self.next_game_id += 1;
        id
    }

    /// Live game in which `user_id` holds a seat, if any
    pub(crate) fn seated_live_game(&self, user_id: UserId) -> Option<GameId> {
        self.games
            .values()
            .find(|g| g.is_live() && g.player_index(user_id).is_some())
            .map(|g| g.id)
    }

    pub(crate) fn caller(&self, session_id: SessionId) -> Result<Caller, CommandError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| validation(format!("Session {} is not connected.", session_id)))?;
        Ok(Caller {
            user_id: session.user_id,
            username: session.username.clone(),
            status: session.status,
            game_id: session.current_game,
        })
    }

    /// Drains the timers requested since the last call
    pub(crate) fn take_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }

    pub(crate) fn schedule(&mut self, request: TimerRequest) {
        self.timers.push(request);
    }

    /// Records activity on a table and arms a fresh idle check. Older idle
    /// checks stay armed and find the newer timestamp when they wake.
    pub(crate) fn touch(&mut self, game_id: GameId) {
        if let Some(game) = self.games.get_mut(&game_id) {
            game.last_action = Instant::now();
            debug!("{}Activity recorded", game.log_name());
            let wait = self.config.idle_timeout + self.config.idle_grace;
            self.timers.push(TimerRequest::Idle { game_id, wait });
        }
    }

    /// Registers a new session. A user connecting a second time replaces
    /// their previous session.
    pub fn connect(&mut self, user_id: UserId, username: String, sender: EventSender) -> SessionId {
        if let Some(previous) = self.sessions.find_by_user(user_id) {
            if let Some(session) = self.sessions.get(previous) {
                session.error("You have logged on from somewhere else, so you have been disconnected here.");
            }
            info!("User {} logged on again; dropping session {}", user_id, previous);
            self.disconnect(previous);
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let session = Session::new(session_id, user_id, username.clone(), sender);
        session.emit(ServerEvent::Welcome {
            session_id,
            user_id,
        });
        self.sessions.insert(session);
        info!("User {} ({}) connected as session {}", user_id, username, session_id);

        self.reattach(session_id, user_id);
        session_id
    }

    /// Puts a returning user back into the table they dropped out of
    fn reattach(&mut self, session_id: SessionId, user_id: UserId) {
        let seated = self
            .games
            .values()
            .find(|g| !g.shared_replay && g.player_index(user_id).is_some())
            .map(|g| g.id);

        if let Some(game_id) = seated {
            if let Some(game) = self.games.get_mut(&game_id) {
                if let Some(seat) = game.player_index(user_id) {
                    game.players[seat].session = Some(session_id);
                    game.players[seat].present = true;
                }
                info!("{}User {} reconnected", game.log_name(), user_id);

                if game.running {
                    self.sessions
                        .set_status(Some(session_id), SessionStatus::Playing, Some(game_id));
                    self.sessions.emit(
                        Some(session_id),
                        ServerEvent::GameStart {
                            game_id,
                            replay: false,
                        },
                    );
                    notify_connected(game, &self.sessions);
                } else {
                    self.sessions
                        .set_status(Some(session_id), SessionStatus::PreGame, Some(game_id));
                    notify_player_change(game, &self.sessions);
                    notify_table_ready(game, &self.sessions);
                }
            }
            return;
        }

        let spectated = self
            .games
            .values()
            .find(|g| g.discon_spectators.contains(&user_id))
            .map(|g| g.id);

        if let Some(game_id) = spectated {
            if let Some(game) = self.games.get_mut(&game_id) {
                game.discon_spectators.remove(&user_id);
            }
            if let Err(e) = self.spectate(session_id, game_id) {
                warn!("Could not re-attach spectator {} to game {}: {}", user_id, game_id, e);
            }
        }
    }

    /// Detaches a session from whatever table it sits at and forgets it
    pub fn disconnect(&mut self, session_id: SessionId) {
        let caller = match self.caller(session_id) {
            Ok(caller) => caller,
            Err(_) => return,
        };

        match (caller.status, caller.game_id) {
            (SessionStatus::Playing | SessionStatus::PreGame, Some(game_id)) => {
                if let Some(game) = self.games.get_mut(&game_id) {
                    if let Some(seat) = game.player_index(caller.user_id) {
                        game.players[seat].present = false;
                        game.players[seat].session = None;
                        info!("{}{} disconnected", game.log_name(), caller.username);
                        if game.running {
                            notify_connected(game, &self.sessions);
                        } else {
                            notify_player_change(game, &self.sessions);
                            notify_table_ready(game, &self.sessions);
                        }
                    }
                }
            }
            (SessionStatus::Spectating | SessionStatus::SharedReplay, Some(game_id)) => {
                self.remove_spectator(session_id, game_id, true);
            }
            _ => {}
        }

        self.sessions.remove(session_id);
        info!("Session {} (user {}) disconnected", session_id, caller.user_id);
    }

    /// Entry point for every client command
    pub fn dispatch(&mut self, session_id: SessionId, command: Command) {
        debug!("Session {} sent {:?}", session_id, command);
        let result = match command {
            Command::CreateTable {
                name,
                password,
                options,
            } => self.create_table(session_id, name, password, options),
            Command::JoinTable { game_id, password } => {
                self.join_table(session_id, game_id, password)
            }
            Command::LeaveTable => self.leave_table(session_id),
            Command::StartGame => self.start_game(session_id),
            Command::Spectate { game_id } => self.spectate(session_id, game_id),
            Command::Unattend => self.unattend(session_id),
            Command::Ready => self.ready(session_id),
            Command::Action(mv) => self.command_action(session_id, mv),
            Command::Note { order, note } => self.note(session_id, order, note),
            Command::Chat { msg } => self.chat(session_id, msg),
            Command::CreateSharedReplay { game_id } => {
                self.create_shared_replay(session_id, game_id)
            }
            Command::ReplayTurn { turn } => self.replay_turn(session_id, turn),
            Command::ReplayLeader { user_id } => self.replay_leader(session_id, user_id),
        };

        if let Err(err) = result {
            self.report(session_id, err);
        }
    }

    fn report(&self, session_id: SessionId, err: CommandError) {
        match err {
            CommandError::Validation(message) => {
                debug!("Session {} command rejected: {}", session_id, message);
                self.sessions.emit(Some(session_id), ServerEvent::Warning { message });
            }
            CommandError::Store(e) => {
                error!("Session {} command failed in the store: {}", session_id, e);
                self.sessions.emit(
                    Some(session_id),
                    ServerEvent::Error {
                        message: GENERIC_FAILURE.to_string(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;

    /// Lobby over an in-memory store, with helpers to connect users and read
    /// what they were sent
    pub(crate) struct TestLobby {
        pub lobby: Lobby,
        pub store: Arc<MemoryStore>,
        receivers: HashMap<SessionId, mpsc::UnboundedReceiver<ServerEvent>>,
    }

    impl TestLobby {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                lobby: Lobby::new(ServerConfig::default(), store.clone()),
                store,
                receivers: HashMap::new(),
            }
        }

        pub fn connect(&mut self, user_id: UserId) -> SessionId {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = self.lobby.connect(user_id, format!("user{}", user_id), tx);
            self.receivers.insert(id, rx);
            id
        }

        pub fn drain(&mut self, session_id: SessionId) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            if let Some(rx) = self.receivers.get_mut(&session_id) {
                while let Ok(event) = rx.try_recv() {
                    events.push(event);
                }
            }
            events
        }

        pub fn status(&self, session_id: SessionId) -> Option<SessionStatus> {
            self.lobby.session(session_id).map(|s| s.status)
        }
    }

    #[test]
    fn test_connect_sends_welcome() {
        let mut t = TestLobby::new();
        let session = t.connect(7);
        assert_eq!(
            t.drain(session),
            vec![ServerEvent::Welcome {
                session_id: session,
                user_id: 7
            }]
        );
        assert_eq!(t.status(session), Some(SessionStatus::Lobby));
    }

    #[test]
    fn test_second_login_replaces_session() {
        let mut t = TestLobby::new();
        let first = t.connect(7);
        t.drain(first);

        let second = t.connect(7);
        assert_ne!(first, second);
        assert!(t.lobby.session(first).is_none());
        assert!(t.lobby.session(second).is_some());
        assert_eq!(t.lobby.sessions_len(), 1);
        assert!(matches!(t.drain(first).as_slice(), [ServerEvent::Error { .. }]));
    }

    #[test]
    fn test_validation_error_becomes_warning() {
        let mut t = TestLobby::new();
        let session = t.connect(1);
        t.drain(session);

        t.lobby.dispatch(session, Command::StartGame);

        assert!(matches!(
            t.drain(session).as_slice(),
            [ServerEvent::Warning { .. }]
        ));
    }

    #[test]
    fn test_store_error_becomes_generic_error() {
        let mut t = TestLobby::new();
        let session = t.connect(1);
        t.drain(session);

        t.lobby
            .dispatch(session, Command::CreateSharedReplay { game_id: 99 });

        assert_eq!(
            t.drain(session),
            vec![ServerEvent::Error {
                message: GENERIC_FAILURE.to_string()
            }]
        );
        assert_eq!(t.lobby.games_len(), 0);
    }

    #[test]
    fn test_unknown_session_is_ignored() {
        let mut t = TestLobby::new();
        t.lobby.disconnect(42);
        t.lobby.dispatch(42, Command::Ready);
        assert_eq!(t.lobby.sessions_len(), 0);
    }

    #[test]
    fn test_game_ids_skip_live_tables() {
        let mut t = TestLobby::new();
        t.lobby.games.insert(
            1,
            Game::new(1, "x".to_string(), 1, String::new(), Default::default()),
        );
        assert_eq!(t.lobby.allocate_game_id(), 2);
        assert_eq!(t.lobby.allocate_game_id(), 3);
    }
}
