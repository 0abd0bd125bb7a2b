//! Messages exchanged between the server and its clients

use crate::action::{Action, Clue};
use serde::{Deserialize, Serialize};

pub type UserId = u32;
pub type GameId = u32;
pub type SessionId = u32;

/// Table settings chosen at creation time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub variant: usize,
    pub timed: bool,
    pub time_base_secs: u64,
    pub time_per_turn_secs: u64,
    pub deck_plays: bool,
    pub empty_clues: bool,
    pub character_assignments: bool,
}

/// Where a connected client currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Lobby,
    PreGame,
    Playing,
    Spectating,
    Replay,
    SharedReplay,
}

impl SessionStatus {
    /// Statuses whose history is read back from storage
    pub fn is_replay(self) -> bool {
        matches!(self, SessionStatus::Replay | SessionStatus::SharedReplay)
    }
}

/// A move a seated player can request on their turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    Clue { target: usize, clue: Clue },
    Play { order: usize },
    Discard { order: usize },
    /// Play the last card of the deck directly
    DeckPlay,
    /// End the game for everyone
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    CreateTable {
        name: String,
        password: String,
        options: Options,
    },
    JoinTable {
        game_id: GameId,
        password: String,
    },
    LeaveTable,
    StartGame,
    Spectate {
        game_id: GameId,
    },
    Unattend,
    Ready,
    Action(Move),
    Note {
        order: usize,
        note: String,
    },
    Chat {
        msg: String,
    },
    CreateSharedReplay {
        game_id: GameId,
    },
    ReplayTurn {
        turn: usize,
    },
    ReplayLeader {
        user_id: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientPacket {
    Hello { user_id: UserId, username: String },
    Heartbeat,
    Command(Command),
    Disconnect,
}

/// Aggregate statistics shown next to a player's name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub num_games: u32,
    pub best_score: usize,
}

/// Notes written by one player, detached from the live player record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerNote {
    pub id: UserId,
    pub name: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user_id: UserId,
    pub username: String,
    pub msg: String,
    pub datetime_sent: u64,
}

/// Pre-game table description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMessage {
    pub name: String,
    pub running: bool,
    pub num_players: usize,
    pub options: Options,
    pub password: bool,
    pub shared_replay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    Welcome {
        session_id: SessionId,
        user_id: UserId,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
    SessionStatus {
        status: SessionStatus,
        game_id: Option<GameId>,
    },
    Table(TableMessage),
    GamePlayer {
        index: usize,
        name: String,
        you: bool,
        present: bool,
        stats: Stats,
    },
    TableReady {
        ready: bool,
    },
    /// The client should load the table UI and then send `Ready`
    GameStart {
        game_id: GameId,
        replay: bool,
    },
    Connected {
        list: Vec<bool>,
    },
    Notify {
        action: Action,
    },
    NotifyList {
        actions: Vec<Action>,
    },
    YourTurn {
        can_clue: bool,
        can_discard: bool,
        can_deck_play: bool,
    },
    Advanced,
    /// Milliseconds per seat; the active seat is already adjusted for the running turn
    Clock {
        times: Vec<i64>,
        active: Option<usize>,
    },
    Notes {
        notes: Vec<String>,
    },
    AllNotes {
        notes: Vec<String>,
    },
    Note {
        order: usize,
        notes: String,
    },
    Spectators {
        names: Vec<String>,
    },
    ReplayLeader {
        name: String,
    },
    ReplayTurn {
        turn: usize,
    },
    Sound {
        file: String,
    },
    Boot,
    Chat(ChatMessage),
}

/// Encodes a packet for the wire
pub fn encode<T: Serialize>(value: &T) -> bincode::Result<Vec<u8>> {
    bincode::serialize(value)
}

/// Decodes a packet received from the wire
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> bincode::Result<T> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_packet_wire_format() {
        let packet = ClientPacket::Command(Command::Action(Move::Clue {
            target: 1,
            clue: Clue::Rank(3),
        }));
        let bytes = encode(&packet).unwrap();
        let decoded: ClientPacket = decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_server_event_wire_format() {
        let event = ServerEvent::Clock {
            times: vec![1_000, -250],
            active: Some(1),
        };
        let bytes = encode(&event).unwrap();
        match decode::<ServerEvent>(&bytes).unwrap() {
            ServerEvent::Clock { times, active } => {
                assert_eq!(times, vec![1_000, -250]);
                assert_eq!(active, Some(1));
            }
            other => panic!("Wrong event after decoding: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let bytes = encode(&ClientPacket::Hello {
            user_id: 7,
            username: "alice".to_string(),
        })
        .unwrap();
        let result: bincode::Result<ClientPacket> = decode(&bytes[..bytes.len() / 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_replay_statuses() {
        assert!(SessionStatus::Replay.is_replay());
        assert!(SessionStatus::SharedReplay.is_replay());
        assert!(!SessionStatus::Spectating.is_replay());
        assert_eq!(SessionStatus::default(), SessionStatus::Lobby);
    }
}
