//! Table lifecycle: creating, joining, leaving, starting and watching

use crate::deck::new_seed;
use crate::error::{validation, CommandError};
use crate::game::{Game, Player, Spectator};
use crate::lobby::Lobby;
use crate::notify::{
    notify_chat, notify_connected, notify_player_change, notify_replay_leader,
    notify_spectators, notify_spectators_note, notify_table_ready,
};
use crate::utils::get_timestamp;
use log::info;
use shared::{
    variant, ChatMessage, GameId, Options, ServerEvent, SessionId, SessionStatus, UserId,
};

impl Lobby {
    pub(crate) fn create_table(
        &mut self,
        session_id: SessionId,
        name: String,
        password: String,
        options: Options,
    ) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        if !matches!(caller.status, SessionStatus::Lobby | SessionStatus::Replay) {
            return Err(validation("You are already at a table."));
        }
        if let Some(seated) = self.seated_live_game(caller.user_id) {
            return Err(validation(format!("You are still playing in game {}.", seated)));
        }
        if variant(options.variant).is_none() {
            return Err(validation(format!("Variant {} does not exist.", options.variant)));
        }
        if options.timed && options.time_base_secs == 0 {
            return Err(validation("Timed games need a starting time."));
        }

        let stats = self.store.user_stats(caller.user_id)?;
        let name = match name.trim() {
            "" => format!("{}'s game", caller.username),
            trimmed => trimmed.to_string(),
        };

        let game_id = self.allocate_game_id();
        let mut game = Game::new(game_id, name, caller.user_id, password, options);
        game.players.push(Player::new(
            caller.user_id,
            caller.username,
            Some(session_id),
            stats,
        ));
        info!("{}Created by user {}", game.log_name(), caller.user_id);

        self.sessions
            .set_status(Some(session_id), SessionStatus::PreGame, Some(game_id));
        notify_player_change(&game, &self.sessions);
        notify_table_ready(&game, &self.sessions);
        self.games.insert(game_id, game);
        self.touch(game_id);
        Ok(())
    }

    /// Takes a seat at a table that has not started. A user already seated at
    /// a running game gets their seat back instead.
    pub(crate) fn join_table(
        &mut self,
        session_id: SessionId,
        game_id: GameId,
        password: String,
    ) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        if !matches!(caller.status, SessionStatus::Lobby | SessionStatus::Replay) {
            return Err(validation("You are already at a table."));
        }

        let game = self
            .games
            .get(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
        if game.shared_replay {
            return Err(validation("You can only spectate a shared replay."));
        }
        if game.running {
            if game.player_index(caller.user_id).is_some() {
                return self.resume_seat(session_id, game_id, caller.user_id);
            }
            return Err(validation(format!("Game {} has already started.", game_id)));
        }
        if game.player_index(caller.user_id).is_some() {
            return Err(validation("You are already seated at that table."));
        }
        if let Some(seated) = self.seated_live_game(caller.user_id) {
            return Err(validation(format!("You are still playing in game {}.", seated)));
        }
        if game.players.len() >= self.config.max_players {
            return Err(validation(format!("Game {} is full.", game_id)));
        }
        if !game.password.is_empty() && game.password != password {
            return Err(validation("That is not the correct password for this game."));
        }

        let stats = self.store.user_stats(caller.user_id)?;
        if let Some(game) = self.games.get_mut(&game_id) {
            game.players.push(Player::new(
                caller.user_id,
                caller.username.clone(),
                Some(session_id),
                stats,
            ));
            info!("{}{} joined", game.log_name(), caller.username);
            self.sessions
                .set_status(Some(session_id), SessionStatus::PreGame, Some(game_id));
            notify_player_change(game, &self.sessions);
            notify_table_ready(game, &self.sessions);
        }
        self.touch(game_id);
        Ok(())
    }

    fn resume_seat(
        &mut self,
        session_id: SessionId,
        game_id: GameId,
        user_id: UserId,
    ) -> Result<(), CommandError> {
        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
        let seat = game
            .player_index(user_id)
            .ok_or_else(|| validation("You are not playing in this game."))?;
        game.players[seat].session = Some(session_id);
        game.players[seat].present = true;

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
        Ok(())
    }

    pub(crate) fn leave_table(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let game_id = match (caller.status, caller.game_id) {
            (SessionStatus::PreGame, Some(game_id)) => game_id,
            _ => return Err(validation("You are not waiting at a table.")),
        };
        if !self.games.contains_key(&game_id) {
            return Err(validation(format!("Game {} does not exist.", game_id)));
        }
        self.remove_player(game_id, caller.user_id);
        self.touch(game_id);
        Ok(())
    }

    /// Removes a seat from a table that has not started. The owner leaving
    /// sends everyone else back to the lobby and deletes the table.
    pub(crate) fn remove_player(&mut self, game_id: GameId, user_id: UserId) {
        let game = match self.games.get_mut(&game_id) {
            Some(game) if !game.running => game,
            _ => return,
        };
        let seat = match game.player_index(user_id) {
            Some(seat) => seat,
            None => return,
        };

        let player = game.players.remove(seat);
        self.sessions
            .set_status(player.session, SessionStatus::Lobby, None);
        info!("{}{} left", game.log_name(), player.name);

        if user_id == game.owner || game.players.is_empty() {
            for other in game.players.drain(..) {
                self.sessions
                    .set_status(other.session, SessionStatus::Lobby, None);
            }
            info!("{}Table closed", game.log_name());
            self.games.remove(&game_id);
            return;
        }

        notify_player_change(game, &self.sessions);
        notify_table_ready(game, &self.sessions);
    }

    pub(crate) fn start_game(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let game_id = match (caller.status, caller.game_id) {
            (SessionStatus::PreGame, Some(game_id)) => game_id,
            _ => return Err(validation("You are not waiting at a table.")),
        };
        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
        if game.owner != caller.user_id {
            return Err(validation("Only the owner can start the game."));
        }
        if game.running {
            return Err(validation(format!("Game {} has already started.", game_id)));
        }
        if game.players.len() < 2 {
            return Err(validation("You need at least two players to start."));
        }

        let seed = new_seed(game.players.len(), game.options.variant);
        game.start(seed, &self.config);

        for player in &game.players {
            self.sessions
                .set_status(player.session, SessionStatus::Playing, Some(game_id));
            self.sessions.emit(
                player.session,
                ServerEvent::GameStart {
                    game_id,
                    replay: false,
                },
            );
        }

        if let Some(request) = game.turn_timer_request() {
            self.schedule(request);
        }
        self.touch(game_id);
        Ok(())
    }

    /// Attaches a session to a running table or shared replay as a spectator.
    /// A player asking to watch their own live game gets their seat back.
    pub(crate) fn spectate(&mut self, session_id: SessionId, game_id: GameId) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        if !matches!(caller.status, SessionStatus::Lobby | SessionStatus::Replay) {
            return Err(validation("You are already at a table."));
        }
        if let Some(seated) = self.seated_live_game(caller.user_id) {
            if seated == game_id {
                return self.resume_seat(session_id, game_id, caller.user_id);
            }
            return Err(validation(format!("You are still playing in game {}.", seated)));
        }

        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
        if !game.running {
            return Err(validation(format!("Game {} has not started yet.", game_id)));
        }
        if game.spectators.iter().any(|s| s.session == session_id) {
            return Err(validation("You are already spectating that game."));
        }

        game.spectators.push(Spectator {
            session: session_id,
            user_id: caller.user_id,
            name: caller.username.clone(),
        });
        game.discon_spectators.remove(&caller.user_id);
        info!("{}{} started spectating", game.log_name(), caller.username);

        let status = if game.shared_replay {
            SessionStatus::SharedReplay
        } else {
            SessionStatus::Spectating
        };
        self.sessions.set_status(Some(session_id), status, Some(game_id));
        self.sessions.emit(
            Some(session_id),
            ServerEvent::GameStart {
                game_id,
                replay: game.shared_replay,
            },
        );
        notify_spectators(game, &self.sessions);
        Ok(())
    }

    /// Leaves whatever game or replay the session is looking at
    pub(crate) fn unattend(&mut self, session_id: SessionId) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        match (caller.status, caller.game_id) {
            (SessionStatus::Spectating | SessionStatus::SharedReplay, Some(game_id)) => {
                self.remove_spectator(session_id, game_id, false);
            }
            (SessionStatus::Playing, Some(game_id)) => {
                if let Some(game) = self.games.get_mut(&game_id) {
                    if let Some(seat) = game.player_index(caller.user_id) {
                        game.players[seat].present = false;
                        game.players[seat].session = None;
                        notify_connected(game, &self.sessions);
                    }
                }
            }
            (SessionStatus::Replay, _) => {}
            _ => return Err(validation("You are not in a game.")),
        }
        self.sessions
            .set_status(Some(session_id), SessionStatus::Lobby, None);
        Ok(())
    }

    /// Detaches a spectator. An emptied shared replay is torn down.
    pub(crate) fn remove_spectator(&mut self, session_id: SessionId, game_id: GameId, remember: bool) {
        let game = match self.games.get_mut(&game_id) {
            Some(game) => game,
            None => return,
        };

        let mut leader_left = false;
        if let Some(index) = game.spectators.iter().position(|s| s.session == session_id) {
            let spectator = game.spectators.remove(index);
            if remember && !game.shared_replay {
                game.discon_spectators.insert(spectator.user_id);
            }
            leader_left = game.shared_replay && spectator.user_id == game.owner;
            info!("{}{} stopped spectating", game.log_name(), spectator.name);
        }

        if game.shared_replay && game.spectators.is_empty() {
            info!("{}Shared replay ended because everyone left", game.log_name());
            self.games.remove(&game_id);
            return;
        }

        if leader_left {
            if let Some(next) = game.spectators.first() {
                game.owner = next.user_id;
                info!("{}Leadership passed to user {}", game.log_name(), next.user_id);
            }
            notify_replay_leader(game, &self.sessions);
        }
        notify_spectators(game, &self.sessions);
    }

    pub(crate) fn note(&mut self, session_id: SessionId, order: usize, note: String) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let game_id = match (caller.status, caller.game_id) {
            (SessionStatus::Playing, Some(game_id)) => game_id,
            _ => return Err(validation("You are not playing in a game.")),
        };
        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;
        let seat = game
            .player_index(caller.user_id)
            .ok_or_else(|| validation("You are not playing in this game."))?;
        let slot = game.players[seat]
            .notes
            .get_mut(order)
            .ok_or_else(|| validation(format!("Card {} does not exist.", order)))?;

        *slot = note;
        notify_spectators_note(game, &self.sessions, order);
        Ok(())
    }

    pub(crate) fn chat(&mut self, session_id: SessionId, msg: String) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let msg = msg.trim().to_string();
        if msg.is_empty() {
            return Err(validation("You cannot send an empty message."));
        }
        let game_id = caller
            .game_id
            .ok_or_else(|| validation("You are not at a table."))?;
        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;

        game.chat.push(ChatMessage {
            user_id: caller.user_id,
            username: caller.username,
            msg,
            datetime_sent: get_timestamp(),
        });
        if game.running {
            notify_chat(game, &self.sessions);
        } else {
            for player in game.players.iter().filter(|p| p.present) {
                if let Some(message) = game.chat.last() {
                    self.sessions
                        .emit(player.session, ServerEvent::Chat(message.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::lobby::tests::TestLobby;
    use shared::{Action, Command, Options, ServerEvent, SessionStatus};

    fn create(t: &mut TestLobby, session: u32, password: &str) -> u32 {
        t.lobby.dispatch(
            session,
            Command::CreateTable {
                name: "table".to_string(),
                password: password.to_string(),
                options: Options::default(),
            },
        );
        t.lobby
            .session(session)
            .and_then(|s| s.current_game)
            .expect("table created")
    }

    fn join(t: &mut TestLobby, session: u32, game_id: u32, password: &str) {
        t.lobby.dispatch(
            session,
            Command::JoinTable {
                game_id,
                password: password.to_string(),
            },
        );
    }

    /// Two seated players at a started table
    fn started(t: &mut TestLobby) -> (u32, u32, u32) {
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(t, a, "");
        join(t, b, game_id, "");
        t.lobby.dispatch(a, Command::StartGame);
        t.drain(a);
        t.drain(b);
        (game_id, a, b)
    }

    #[test]
    fn test_create_seats_owner() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let game_id = create(&mut t, a, "");

        assert_eq!(t.status(a), Some(SessionStatus::PreGame));
        let game = t.lobby.game(game_id).unwrap();
        assert_eq!(game.owner, 1);
        assert_eq!(game.players.len(), 1);
        assert!(t
            .drain(a)
            .contains(&ServerEvent::TableReady { ready: false }));
    }

    #[test]
    fn test_join_checks_password() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(&mut t, a, "secret");
        t.drain(b);

        join(&mut t, b, game_id, "wrong");
        assert!(matches!(t.drain(b).as_slice(), [ServerEvent::Warning { .. }]));
        assert_eq!(t.status(b), Some(SessionStatus::Lobby));

        join(&mut t, b, game_id, "secret");
        assert_eq!(t.status(b), Some(SessionStatus::PreGame));
        assert_eq!(t.lobby.game(game_id).unwrap().players.len(), 2);
    }

    #[test]
    fn test_owner_leaving_closes_table() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(&mut t, a, "");
        join(&mut t, b, game_id, "");

        t.lobby.dispatch(a, Command::LeaveTable);

        assert!(t.lobby.game(game_id).is_none());
        assert_eq!(t.status(a), Some(SessionStatus::Lobby));
        assert_eq!(t.status(b), Some(SessionStatus::Lobby));
    }

    #[test]
    fn test_guest_leaving_keeps_table() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(&mut t, a, "");
        join(&mut t, b, game_id, "");
        t.drain(a);

        t.lobby.dispatch(b, Command::LeaveTable);

        assert_eq!(t.lobby.game(game_id).unwrap().players.len(), 1);
        assert!(t
            .drain(a)
            .contains(&ServerEvent::TableReady { ready: false }));
    }

    #[test]
    fn test_start_requires_owner_and_two_players() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(&mut t, a, "");

        t.lobby.dispatch(a, Command::StartGame);
        assert!(!t.lobby.game(game_id).unwrap().running);

        join(&mut t, b, game_id, "");
        t.lobby.dispatch(b, Command::StartGame);
        assert!(!t.lobby.game(game_id).unwrap().running);

        t.drain(a);
        t.lobby.dispatch(a, Command::StartGame);
        let game = t.lobby.game(game_id).unwrap();
        assert!(game.running);
        assert_eq!(t.status(a), Some(SessionStatus::Playing));
        assert_eq!(t.status(b), Some(SessionStatus::Playing));
        assert!(t.drain(a).contains(&ServerEvent::GameStart {
            game_id,
            replay: false
        }));
    }

    #[test]
    fn test_spectate_and_unattend() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let c = t.connect(3);
        let game_id = create(&mut t, a, "");

        t.lobby.dispatch(c, Command::Spectate { game_id });
        assert_eq!(t.status(c), Some(SessionStatus::Lobby));

        join(&mut t, b, game_id, "");
        t.lobby.dispatch(a, Command::StartGame);
        t.lobby.dispatch(c, Command::Spectate { game_id });
        assert_eq!(t.status(c), Some(SessionStatus::Spectating));
        assert_eq!(t.lobby.game(game_id).unwrap().spectators.len(), 1);

        t.drain(a);
        t.lobby.dispatch(c, Command::Unattend);
        assert_eq!(t.status(c), Some(SessionStatus::Lobby));
        assert!(t.lobby.game(game_id).unwrap().spectators.is_empty());
        assert!(t.drain(a).contains(&ServerEvent::Spectators { names: vec![] }));
    }

    #[test]
    fn test_note_reaches_spectators_only() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let c = t.connect(3);
        let game_id = create(&mut t, a, "");
        join(&mut t, b, game_id, "");
        t.lobby.dispatch(a, Command::StartGame);
        t.lobby.dispatch(c, Command::Spectate { game_id });
        t.drain(b);
        t.drain(c);

        t.lobby.dispatch(
            a,
            Command::Note {
                order: 3,
                note: "five".to_string(),
            },
        );

        assert_eq!(t.lobby.game(game_id).unwrap().players[0].notes[3], "five");
        assert!(t.drain(b).is_empty());
        assert_eq!(
            t.drain(c),
            vec![ServerEvent::Note {
                order: 3,
                notes: "user1: five\n".to_string()
            }]
        );
    }

    #[test]
    fn test_chat_delivered_to_table() {
        let mut t = TestLobby::new();
        let a = t.connect(1);
        let b = t.connect(2);
        let game_id = create(&mut t, a, "");
        join(&mut t, b, game_id, "");
        t.drain(a);
        t.drain(b);

        t.lobby.dispatch(
            b,
            Command::Chat {
                msg: " hello ".to_string(),
            },
        );

        let events = t.drain(a);
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::Chat(message)] if message.msg == "hello" && message.user_id == 2
        ));
        assert_eq!(t.lobby.game(game_id).unwrap().chat.len(), 1);
    }

    #[test]
    fn test_player_cannot_watch_own_game_as_spectator() {
        let mut t = TestLobby::new();
        let (game_id, a, _) = started(&mut t);

        t.lobby.dispatch(a, Command::Unattend);
        assert_eq!(t.status(a), Some(SessionStatus::Lobby));
        t.lobby.dispatch(a, Command::Spectate { game_id });

        assert_eq!(t.status(a), Some(SessionStatus::Playing));
        let game = t.lobby.game(game_id).unwrap();
        assert!(game.spectators.is_empty());
        assert!(game.players[0].present);
        assert_eq!(game.players[0].session, Some(a));
        t.drain(a);

        t.lobby.dispatch(a, Command::Ready);
        let own_visible = match t.drain(a).first() {
            Some(ServerEvent::NotifyList { actions }) => actions
                .iter()
                .filter(|action| matches!(action, Action::Draw { who: 0, card: Some(_), .. }))
                .count(),
            other => panic!("Unexpected first event: {:?}", other),
        };
        assert_eq!(own_visible, 0);
    }

    #[test]
    fn test_seated_player_cannot_open_another_table() {
        let mut t = TestLobby::new();
        let (game_id, a, _) = started(&mut t);
        let c = t.connect(3);
        let other = create(&mut t, c, "");

        t.lobby.dispatch(a, Command::Unattend);
        t.drain(a);
        join(&mut t, a, other, "");
        assert!(matches!(t.drain(a).as_slice(), [ServerEvent::Warning { .. }]));
        t.lobby.dispatch(
            a,
            Command::CreateTable {
                name: "second".to_string(),
                password: String::new(),
                options: Options::default(),
            },
        );
        assert!(matches!(t.drain(a).as_slice(), [ServerEvent::Warning { .. }]));

        assert_eq!(t.lobby.games_len(), 2);
        assert_eq!(t.lobby.game(other).unwrap().players.len(), 1);
        assert_eq!(t.status(a), Some(SessionStatus::Lobby));

        t.lobby.dispatch(c, Command::LeaveTable);
        t.lobby.dispatch(a, Command::Spectate { game_id });
        assert_eq!(t.status(a), Some(SessionStatus::Playing));
    }

    #[test]
    fn test_disconnected_spectator_reattached() {
        let mut t = TestLobby::new();
        let (game_id, _, _) = started(&mut t);
        let c = t.connect(3);
        t.lobby.dispatch(c, Command::Spectate { game_id });

        t.lobby.disconnect(c);
        let game = t.lobby.game(game_id).unwrap();
        assert!(game.spectators.is_empty());
        assert!(game.discon_spectators.contains(&3));

        let again = t.connect(3);

        assert_eq!(t.status(again), Some(SessionStatus::Spectating));
        let game = t.lobby.game(game_id).unwrap();
        assert_eq!(game.spectators.len(), 1);
        assert_eq!(game.spectators[0].session, again);
        assert!(!game.discon_spectators.contains(&3));
        assert!(t.drain(again).contains(&ServerEvent::GameStart {
            game_id,
            replay: false
        }));
    }

    #[test]
    fn test_spectator_leaving_on_purpose_is_forgotten() {
        let mut t = TestLobby::new();
        let (game_id, _, _) = started(&mut t);
        let c = t.connect(3);
        t.lobby.dispatch(c, Command::Spectate { game_id });

        t.lobby.dispatch(c, Command::Unattend);
        t.lobby.disconnect(c);
        assert!(t.lobby.game(game_id).unwrap().discon_spectators.is_empty());

        let again = t.connect(3);
        assert_eq!(t.status(again), Some(SessionStatus::Lobby));
    }
}
