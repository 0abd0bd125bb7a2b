//! Turn moves and the end-of-game path
//!
//! [`Game::perform`] validates a move completely before it changes anything,
//! so a rejected move leaves the log and the table untouched. The lobby side
//! then broadcasts what was appended, arms the next turn timer or finishes the
//! game.

use crate::config::ServerConfig;
use crate::error::{validation, CommandError};
use crate::game::Game;
use crate::lobby::Lobby;
use crate::notify::{
    notify_action, notify_actions_from, notify_clock, notify_sound, notify_your_turn,
};
use crate::score::{check_end, update_max_score, update_progress};
use crate::store::{serialize_actions, FinishedGame};
use crate::utils::get_timestamp;
use log::{error, info};
use shared::{
    Action, Clue, EndCondition, GameId, Move, SessionId, SessionStatus, StackDirection, UserId,
    MAX_RANK,
};
use std::time::Duration;
use tokio::time::Instant;

/// Highest blind-play streak with its own sound cue
const MAX_BLIND_SOUND: usize = 6;

/// A move as the engine applies it. Only `Move` can come from a client; the
/// other two are injected by the timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCommand {
    Move(Move),
    TimeLimitReached,
    IdleLimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Continue,
    Ended,
}

impl Game {
    pub fn perform(
        &mut self,
        user_id: UserId,
        command: ActionCommand,
        config: &ServerConfig,
    ) -> Result<MoveOutcome, CommandError> {
        if !self.is_live() {
            return Err(validation(format!(
                "Game {} is not in progress.",
                self.id
            )));
        }
        let seat = self
            .player_index(user_id)
            .ok_or_else(|| validation("You are not playing in this game."))?;

        match command {
            ActionCommand::Move(Move::Terminate) => {
                let text = format!("{} terminated the game!", self.players[seat].name);
                Ok(self.finish(text, EndCondition::Terminated))
            }
            ActionCommand::TimeLimitReached => {
                let text = format!("{} ran out of time!", self.players[seat].name);
                Ok(self.finish(text, EndCondition::Timeout))
            }
            ActionCommand::IdleLimitReached => Ok(self.finish(
                "Players were idle for too long.".to_string(),
                EndCondition::IdleTimeout,
            )),
            ActionCommand::Move(mv) => self.perform_move(seat, mv, config),
        }
    }

    fn finish(&mut self, text: String, condition: EndCondition) -> MoveOutcome {
        self.actions.push(Action::Text { text });
        if !self.end_condition.is_terminal() {
            self.end_condition = condition;
        }
        MoveOutcome::Ended
    }

    fn perform_move(
        &mut self,
        seat: usize,
        mv: Move,
        config: &ServerConfig,
    ) -> Result<MoveOutcome, CommandError> {
        if seat != self.active_player {
            return Err(validation("It is not your turn."));
        }
        self.validate_move(seat, &mv, config)?;

        if self.charge_clock(seat) {
            let text = format!("{} ran out of time!", self.players[seat].name);
            return Ok(self.finish(text, EndCondition::Timeout));
        }

        let final_turn = self.deck_exhausted();
        self.sound = None;

        let blind = match mv {
            Move::Clue { target, clue } => {
                self.give_clue(seat, target, clue);
                false
            }
            Move::Play { order } => {
                let blind = self.play_card(seat, order, config.max_clues);
                self.replace_card(seat);
                blind
            }
            Move::Discard { order } => {
                self.discard_card(seat, order);
                self.replace_card(seat);
                false
            }
            Move::DeckPlay => {
                let order = self.deck_index;
                self.replace_card(seat);
                self.play_card(seat, order, config.max_clues)
            }
            Move::Terminate => false,
        };

        if final_turn {
            self.players[seat].performed_final_turn = true;
        }

        if blind {
            self.blind_plays += 1;
            self.sound = Some(format!("blind{}", self.blind_plays.min(MAX_BLIND_SOUND)));
        } else {
            self.blind_plays = 0;
        }

        self.actions.push(Action::Status {
            clues: self.clues,
            score: self.score,
            max_score: self.max_score,
        });

        if check_end(self, config.max_strikes) {
            info!(
                "{}Game over with condition {:?}",
                self.log_name(),
                self.end_condition
            );
            return Ok(MoveOutcome::Ended);
        }

        self.advance_turn();
        Ok(MoveOutcome::Continue)
    }

    fn validate_move(&self, seat: usize, mv: &Move, config: &ServerConfig) -> Result<(), CommandError> {
        let hand_has = |order: usize| self.players[seat].slot_of(order).is_some();
        match mv {
            Move::Clue { target, clue } => {
                if self.clues == 0 {
                    return Err(validation("You cannot give a clue with no clue tokens."));
                }
                if *target == seat || *target >= self.players.len() {
                    return Err(validation("That is not a valid clue target."));
                }
                let valid = match *clue {
                    Clue::Color(color) => color < self.variant().num_suits(),
                    Clue::Rank(rank) => (1..=MAX_RANK).contains(&rank),
                };
                if !valid {
                    return Err(validation("That clue does not exist in this variant."));
                }
                if !self.options.empty_clues && self.touched(*target, clue).is_empty() {
                    return Err(validation("Empty clues are not allowed at this table."));
                }
            }
            Move::Play { order } => {
                if !hand_has(*order) {
                    return Err(validation("That card is not in your hand."));
                }
            }
            Move::Discard { order } => {
                if !hand_has(*order) {
                    return Err(validation("That card is not in your hand."));
                }
                if self.clues >= config.max_clues {
                    return Err(validation("You cannot discard while at the maximum amount of clues."));
                }
            }
            Move::DeckPlay => {
                if !self.options.deck_plays {
                    return Err(validation("Deck plays are disabled at this table."));
                }
                if self.cards_left() != 1 {
                    return Err(validation("You can only play from the deck when one card is left."));
                }
            }
            Move::Terminate => {}
        }
        Ok(())
    }

    /// Deck orders in `target`'s hand that `clue` touches
    fn touched(&self, target: usize, clue: &Clue) -> Vec<usize> {
        self.players[target]
            .hand
            .iter()
            .filter(|hc| {
                self.deck
                    .get(hc.order)
                    .map(|card| clue.touches(&card.identity()))
                    .unwrap_or(false)
            })
            .map(|hc| hc.order)
            .collect()
    }

    /// Charges the turn's thinking time. Returns true when a timed player
    /// went over their budget.
    fn charge_clock(&mut self, seat: usize) -> bool {
        let elapsed = self.turn_begin.elapsed();
        let timed = self.options.timed;
        let bonus = Duration::from_secs(self.options.time_per_turn_secs);
        let player = &mut self.players[seat];

        if !timed {
            player.time += elapsed;
            return false;
        }
        if elapsed >= player.time {
            player.time = Duration::ZERO;
            return true;
        }
        player.time = player.time - elapsed + bonus;
        false
    }

    fn give_clue(&mut self, seat: usize, target: usize, clue: Clue) {
        let list = self.touched(target, &clue);
        for hand_card in self.players[target].hand.iter_mut() {
            if list.contains(&hand_card.order) {
                hand_card.clued = true;
            }
        }
        self.clues -= 1;
        self.actions.push(Action::Clue {
            giver: seat,
            target,
            clue,
            list,
            turn: self.turn,
        });
    }

    /// Returns true for a successful play of a card nobody had clued
    fn play_card(&mut self, seat: usize, order: usize, max_clues: usize) -> bool {
        let slot = match self.players[seat].slot_of(order) {
            Some(slot) => slot,
            None => return false,
        };
        let hand_card = self.players[seat].hand.remove(slot);
        let card = match self.deck.get(order) {
            Some(card) => card.identity(),
            None => return false,
        };

        let height = self.stacks[card.suit];
        let direction = self.stack_directions[card.suit];
        if !direction.next_ranks(height).contains(&card.rank) {
            self.deck[order].discarded = true;
            self.strikes += 1;
            self.actions.push(Action::Discard {
                who: seat,
                order,
                card,
                failed: true,
            });
            self.actions.push(Action::Strike {
                num: self.strikes,
                order,
                turn: self.turn,
            });
            update_max_score(self);
            return false;
        }

        self.stacks[card.suit] += 1;
        self.score += 1;
        self.actions.push(Action::Play {
            who: seat,
            order,
            card,
        });

        if !self.variant().is_monotonic() {
            let next = match direction {
                StackDirection::Undecided if card.rank == 1 => StackDirection::Up,
                StackDirection::Undecided => StackDirection::Down,
                other => other,
            };
            let next = if self.stacks[card.suit] == MAX_RANK as usize {
                StackDirection::Finished
            } else {
                next
            };
            if next != direction {
                self.stack_directions[card.suit] = next;
                self.actions.push(Action::StackDirections {
                    directions: self.stack_directions.clone(),
                });
            }
        }

        if self.stacks[card.suit] == MAX_RANK as usize && self.clues < max_clues {
            self.clues += 1;
        }
        update_progress(self);
        !hand_card.clued
    }

    fn discard_card(&mut self, seat: usize, order: usize) {
        if let Some(slot) = self.players[seat].slot_of(order) {
            self.players[seat].hand.remove(slot);
        }
        let card = match self.deck.get_mut(order) {
            Some(card) => {
                card.discarded = true;
                card.identity()
            }
            None => return,
        };
        self.clues += 1;
        self.actions.push(Action::Discard {
            who: seat,
            order,
            card,
            failed: false,
        });
        update_max_score(self);
    }

    fn replace_card(&mut self, seat: usize) {
        if let Some(action) = self.draw_card(seat) {
            self.actions.push(action);
        }
    }

    fn advance_turn(&mut self) {
        self.turn += 1;
        self.active_player = self.next_player();
        self.turn_begin = Instant::now();
        self.actions.push(Action::Turn {
            num: self.turn,
            who: self.active_player,
        });
    }
}

impl Lobby {
    pub(crate) fn command_action(&mut self, session_id: SessionId, mv: Move) -> Result<(), CommandError> {
        let caller = self.caller(session_id)?;
        let game_id = match (caller.status, caller.game_id) {
            (SessionStatus::Playing, Some(game_id)) => game_id,
            _ => return Err(validation("You are not playing in a game.")),
        };
        self.apply_action(game_id, caller.user_id, ActionCommand::Move(mv))
    }

    /// Shared mutation path for client moves and timer-injected ones
    pub fn apply_action(
        &mut self,
        game_id: GameId,
        user_id: UserId,
        command: ActionCommand,
    ) -> Result<(), CommandError> {
        let game = self
            .games
            .get_mut(&game_id)
            .ok_or_else(|| validation(format!("Game {} does not exist.", game_id)))?;

        let start = game.actions.len();
        let outcome = game.perform(user_id, command, &self.config)?;
        notify_actions_from(game, &self.sessions, start);

        match outcome {
            MoveOutcome::Continue => {
                notify_clock(game, &self.sessions);
                notify_sound(game, &self.sessions);
                notify_your_turn(game, &self.sessions, self.config.max_clues);
                if let Some(request) = game.turn_timer_request() {
                    self.schedule(request);
                }
                self.touch(game_id);
            }
            MoveOutcome::Ended => self.end_game(game_id),
        }
        Ok(())
    }

    /// Announces the result, persists the game, moves everyone at the table
    /// into a replay of it and unregisters it
    pub(crate) fn end_game(&mut self, game_id: GameId) {
        let game = match self.games.get_mut(&game_id) {
            Some(game) => game,
            None => return,
        };

        game.datetime_finished = Some(get_timestamp());
        let loss = game.end_condition.is_loss();
        game.actions.push(Action::GameOver {
            end_condition: game.end_condition,
            score: game.score,
            loss,
        });
        notify_action(game, &self.sessions);
        info!(
            "{}Ended with condition {:?} and a score of {}.",
            game.log_name(),
            game.end_condition,
            game.score
        );

        game.sound = Some(if loss { "finished_fail" } else { "finished_success" }.to_string());
        notify_sound(game, &self.sessions);

        match serialize_actions(&game.actions) {
            Ok(actions) => {
                let record = FinishedGame {
                    id: game.id,
                    name: game.name.clone(),
                    seed: game.seed.clone(),
                    options: game.options.clone(),
                    score: game.score,
                    end_condition: game.end_condition,
                    player_ids: game.players.iter().map(|p| p.user_id).collect(),
                    actions,
                    notes: game.player_notes(),
                    datetime_finished: game.datetime_finished.unwrap_or_default(),
                };
                if let Err(e) = self.store.save_game(record) {
                    error!("{}Failed to save the game: {}", game.log_name(), e);
                }
            }
            Err(e) => error!("{}Failed to serialize the actions: {}", game.log_name(), e),
        }

        for player in &game.players {
            self.sessions
                .set_status(player.session, SessionStatus::Replay, Some(game_id));
        }
        for spectator in &game.spectators {
            self.sessions
                .set_status(Some(spectator.session), SessionStatus::Replay, Some(game_id));
        }

        game.running = false;
        self.games.remove(&game_id);
    }
}
