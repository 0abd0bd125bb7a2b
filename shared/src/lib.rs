//! Data shared by the table server and its clients: cards and variants, the
//! action log entries, and the packets that travel over the wire.

pub mod action;
pub mod card;
pub mod protocol;

pub use action::{Action, Clue, EndCondition};
pub use card::{variant, Card, CardIdentity, StackDirection, Variant, MAX_RANK, VARIANTS};
pub use protocol::{
    decode, encode, ChatMessage, ClientPacket, Command, GameId, Move, Options, PlayerNote,
    ServerEvent, SessionId, SessionStatus, Stats, TableMessage, UserId,
};
