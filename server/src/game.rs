//! Authoritative in-memory state of a single table
//!
//! Every field here is only touched while the lobby lock is held.

use crate::config::ServerConfig;
use crate::deck::{hand_size, shuffled_deck};
use crate::timers::TimerRequest;
use crate::utils::get_timestamp;
use log::info;
use shared::{
    variant, Action, Card, ChatMessage, EndCondition, GameId, Options, PlayerNote, SessionId,
    StackDirection, Stats, UserId, Variant, VARIANTS,
};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// A card held in a player's hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandCard {
    pub order: usize,
    /// Touched by at least one clue
    pub clued: bool,
}

/// A seat at the table
#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: UserId,
    pub name: String,
    /// Non-owning handle; `None` while the user is disconnected
    pub session: Option<SessionId>,
    pub present: bool,
    /// Remaining budget in timed games, accumulated thinking time otherwise
    pub time: Duration,
    /// One note per deck position
    pub notes: Vec<String>,
    pub performed_final_turn: bool,
    pub stats: Stats,
    pub hand: Vec<HandCard>,
}

impl Player {
    pub fn new(user_id: UserId, name: String, session: Option<SessionId>, stats: Stats) -> Self {
        Self {
            user_id,
            name,
            present: session.is_some(),
            session,
            time: Duration::ZERO,
            notes: Vec::new(),
            performed_final_turn: false,
            stats,
            hand: Vec::new(),
        }
    }

    /// Hand slot holding the card with this deck order
    pub fn slot_of(&self, order: usize) -> Option<usize> {
        self.hand.iter().position(|c| c.order == order)
    }

    pub fn to_note(&self) -> PlayerNote {
        PlayerNote {
            id: self.user_id,
            name: self.name.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// A session watching the table without a seat
#[derive(Debug, Clone)]
pub struct Spectator {
    pub session: SessionId,
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    /// Creator, or the current leader of a shared replay
    pub owner: UserId,
    /// Opaque credential; empty means no password
    pub password: String,
    pub options: Options,
    pub players: Vec<Player>,
    pub spectators: Vec<Spectator>,
    /// Spectators that dropped without leaving, re-attached on reconnect
    pub discon_spectators: HashSet<UserId>,
    pub running: bool,
    pub shared_replay: bool,
    pub datetime_created: u64,
    pub datetime_started: Option<u64>,
    pub datetime_finished: Option<u64>,
    pub last_action: Instant,
    pub end_condition: EndCondition,

    pub seed: String,
    pub deck: Vec<Card>,
    pub deck_index: usize,
    pub stacks: Vec<usize>,
    pub stack_directions: Vec<StackDirection>,
    pub turn: usize,
    pub turns_inverted: bool,
    pub active_player: usize,
    pub clues: usize,
    pub score: usize,
    pub max_score: usize,
    /// Percentage of the achievable score reached so far
    pub progress: usize,
    pub strikes: usize,
    pub actions: Vec<Action>,
    pub sound: Option<String>,
    pub turn_begin: Instant,
    /// Seat that drew the last card of the deck
    pub end_player: Option<usize>,
    pub end_turn: Option<usize>,
    pub blind_plays: usize,
    pub chat: Vec<ChatMessage>,
    /// Turn a shared replay is currently showing
    pub replay_turn: usize,
}

impl Game {
    pub fn new(id: GameId, name: String, owner: UserId, password: String, options: Options) -> Self {
        let now = Instant::now();
        let variant = variant(options.variant).unwrap_or(&VARIANTS[0]);
        Self {
            id,
            name,
            owner,
            password,
            options,
            players: Vec::new(),
            spectators: Vec::new(),
            discon_spectators: HashSet::new(),
            running: false,
            shared_replay: false,
            datetime_created: get_timestamp(),
            datetime_started: None,
            datetime_finished: None,
            last_action: now,
            end_condition: EndCondition::InProgress,
            seed: String::new(),
            deck: Vec::new(),
            deck_index: 0,
            stacks: vec![0; variant.num_suits()],
            stack_directions: vec![variant.initial_direction(); variant.num_suits()],
            turn: 0,
            turns_inverted: false,
            active_player: 0,
            clues: 0,
            score: 0,
            max_score: variant.perfect_score(),
            progress: 0,
            strikes: 0,
            actions: Vec::new(),
            sound: None,
            turn_begin: now,
            end_player: None,
            end_turn: None,
            blind_plays: 0,
            chat: Vec::new(),
            replay_turn: 0,
        }
    }

    /// A table for jointly reviewing a finished game. Seats are rebuilt from
    /// the stored notes and never have a session attached.
    pub fn new_shared_replay(id: GameId, owner: UserId, notes: Vec<PlayerNote>) -> Self {
        let mut game = Self::new(
            id,
            format!("Shared replay of game #{}", id),
            owner,
            String::new(),
            Options::default(),
        );
        game.players = notes
            .into_iter()
            .map(|n| {
                let mut player = Player::new(n.id, n.name, None, Stats::default());
                player.notes = n.notes;
                player
            })
            .collect();
        game.running = true;
        game.shared_replay = true;
        game
    }

    /// Prefix for log lines about this table
    pub fn log_name(&self) -> String {
        format!("Game #{} ({}) - Turn {} - ", self.id, self.name, self.turn)
    }

    pub fn variant(&self) -> &'static Variant {
        variant(self.options.variant).unwrap_or(&VARIANTS[0])
    }

    pub fn player_index(&self, user_id: UserId) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn spectator_index(&self, user_id: UserId) -> Option<usize> {
        self.spectators.iter().position(|s| s.user_id == user_id)
    }

    /// Started, not a replay, and not yet over
    pub fn is_live(&self) -> bool {
        self.running && !self.shared_replay && !self.end_condition.is_terminal()
    }

    pub fn deck_exhausted(&self) -> bool {
        self.deck_index >= self.deck.len()
    }

    pub fn cards_left(&self) -> usize {
        self.deck.len().saturating_sub(self.deck_index)
    }

    pub fn next_player(&self) -> usize {
        let n = self.players.len().max(1);
        if self.turns_inverted {
            (self.active_player + n - 1) % n
        } else {
            (self.active_player + 1) % n
        }
    }

    pub fn player_notes(&self) -> Vec<PlayerNote> {
        self.players.iter().map(Player::to_note).collect()
    }

    /// Deals a fresh deck and opens the first turn. The deal is appended to
    /// the log without being broadcast; clients pick it up with `Ready`.
    pub fn start(&mut self, seed: String, config: &ServerConfig) {
        let variant = self.variant();
        self.seed = seed;
        self.deck = shuffled_deck(variant, &self.seed);
        self.deck_index = 0;
        self.stacks = vec![0; variant.num_suits()];
        self.stack_directions = vec![variant.initial_direction(); variant.num_suits()];
        self.clues = config.max_clues;
        self.max_score = variant.perfect_score();
        self.running = true;
        self.datetime_started = Some(get_timestamp());
        self.turn = 0;
        self.active_player = 0;

        let base = if self.options.timed {
            Duration::from_secs(self.options.time_base_secs)
        } else {
            Duration::ZERO
        };
        let deck_len = self.deck.len();
        for player in &mut self.players {
            player.time = base;
            player.notes = vec![String::new(); deck_len];
            player.hand.clear();
            player.performed_final_turn = false;
        }

        let per_hand = hand_size(self.players.len());
        for seat in 0..self.players.len() {
            for _ in 0..per_hand {
                if let Some(action) = self.draw_card(seat) {
                    self.actions.push(action);
                }
            }
        }
        self.actions.push(Action::Status {
            clues: self.clues,
            score: self.score,
            max_score: self.max_score,
        });
        if !variant.is_monotonic() {
            self.actions.push(Action::StackDirections {
                directions: self.stack_directions.clone(),
            });
        }
        self.actions.push(Action::Turn {
            num: self.turn,
            who: self.active_player,
        });
        self.turn_begin = Instant::now();

        info!(
            "{}Started with {} players (seed {}).",
            self.log_name(),
            self.players.len(),
            self.seed
        );
    }

    /// Moves the top card of the deck into a hand. Drawing the last card
    /// captures the end player.
    pub fn draw_card(&mut self, seat: usize) -> Option<Action> {
        let card = self.deck.get(self.deck_index)?.clone();
        self.deck_index += 1;
        self.players[seat].hand.push(HandCard {
            order: card.order,
            clued: false,
        });
        if self.deck_exhausted() && self.end_player.is_none() {
            self.end_player = Some(seat);
            self.end_turn = Some(self.turn + self.players.len());
        }
        Some(Action::Draw {
            who: seat,
            order: card.order,
            card: Some(card.identity()),
        })
    }

    /// Timer to arm for the turn that just began, if the table is timed
    pub fn turn_timer_request(&self) -> Option<TimerRequest> {
        if !self.options.timed || !self.is_live() {
            return None;
        }
        let player = self.players.get(self.active_player)?;
        Some(TimerRequest::Turn {
            game_id: self.id,
            turn: self.turn,
            user_id: player.user_id,
            budget: player.time,
        })
    }
}
