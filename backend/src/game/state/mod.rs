//! The per-room game state machine.
//!
//! A [`Game`] is created with its seats already fixed (room join order), goes
//! `awaiting_start -> in_progress -> completed` and never skips a status.
//! Every mutation goes through [`Game::apply_action`], which validates first
//! and returns the [`GameEvent`]s the coordinator should broadcast.

mod actions;
mod phase;
mod resolution;
mod snapshot;

pub use resolution::{GameOutcome, PlayerResult, Refund};
pub use snapshot::{GameSnapshot, SeatView};

use super::{
    action::Action,
    constants::HOLE_CARDS,
    deck::{Card, Deck},
    error::{GameError, GameResult},
    player::Seat,
    room::BetLimits,
    rules::{ActionKind, GameType, Phase},
    validator,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    AwaitingStart,
    InProgress,
    Completed,
    Cancelled,
}

/// Something that happened inside a game, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    RoundStarted {
        round: u32,
        phase: Phase,
    },
    ActionApplied {
        player_id: String,
        kind: ActionKind,
        chips: i64,
    },
    PlayerTurn {
        player_id: String,
        legal_actions: Vec<ActionKind>,
        to_call: i64,
    },
    /// Seats, pot or board changed; clients should refresh their snapshot
    StateChanged,
    GameOver(GameOutcome),
}

#[derive(Debug, Clone)]
pub struct Game {
    pub id: String,
    pub room_id: String,
    pub game_type: GameType,
    pub limits: BetLimits,
    pub seats: Vec<Seat>,
    pub round: u32,
    pub phase: Phase,
    pub current_actor: Option<usize>,
    pub status: GameStatus,
    pub community_cards: Vec<Card>,
    pub spin_result: Option<u8>,
    pub outcome: Option<GameOutcome>,
    pub created_at: DateTime<Utc>,
    deck: Deck,
}

impl Game {
    /// `players` is `(participant id, last-known balance)` in seating order.
    pub fn new(
        id: String,
        room_id: String,
        game_type: GameType,
        limits: BetLimits,
        players: Vec<(String, i64)>,
    ) -> Self {
        Self::with_deck(id, room_id, game_type, limits, players, Deck::shuffled())
    }

    /// Deterministic shuffle, for tests and replays
    pub fn with_seed(
        id: String,
        room_id: String,
        game_type: GameType,
        limits: BetLimits,
        players: Vec<(String, i64)>,
        seed: u64,
    ) -> Self {
        Self::with_deck(id, room_id, game_type, limits, players, Deck::seeded(seed))
    }

    fn with_deck(
        id: String,
        room_id: String,
        game_type: GameType,
        limits: BetLimits,
        players: Vec<(String, i64)>,
        deck: Deck,
    ) -> Self {
        let seats = players
            .into_iter()
            .map(|(player_id, balance)| Seat::new(player_id, balance))
            .collect();
        Self {
            id,
            room_id,
            game_type,
            limits,
            seats,
            round: 0,
            phase: game_type.opening_phase(),
            current_actor: None,
            status: GameStatus::AwaitingStart,
            community_cards: Vec::new(),
            spin_result: None,
            outcome: None,
            created_at: Utc::now(),
            deck,
        }
    }

    /// Deals the opening phase and hands the turn to the first seat.
    pub fn start(&mut self) -> GameResult<Vec<GameEvent>> {
        if self.status != GameStatus::AwaitingStart {
            return Err(GameError::illegal("Game has already started"));
        }
        if self.seats.len() < self.game_type.min_players() {
            return Err(GameError::illegal(format!(
                "Need at least {} players to start",
                self.game_type.min_players()
            )));
        }

        self.status = GameStatus::InProgress;
        self.round = 1;
        self.phase = self.game_type.opening_phase();
        if self.game_type == GameType::Poker {
            for seat in &mut self.seats {
                seat.hole_cards = self.deck.deal_multiple(HOLE_CARDS);
            }
        }
        self.current_actor = self.first_actor();

        tracing::debug!(
            game_id = %self.id,
            game_type = %self.game_type,
            seats = self.seats.len(),
            "game started"
        );

        let mut events = vec![GameEvent::RoundStarted {
            round: self.round,
            phase: self.phase,
        }];
        events.push(GameEvent::StateChanged);
        self.push_turn_prompt(&mut events);
        Ok(events)
    }

    /// Validates and applies one action.
    ///
    /// Nothing is mutated when validation fails.
    pub fn apply_action(&mut self, action: &Action) -> GameResult<Vec<GameEvent>> {
        let legal = validator::is_legal(self, action)?;
        let idx = self
            .current_actor
            .ok_or_else(|| GameError::Internal("validated action without an actor".into()))?;

        self.perform(idx, action, legal.chips)?;

        let mut events = vec![GameEvent::ActionApplied {
            player_id: action.player_id.clone(),
            kind: action.kind,
            chips: legal.chips,
        }];
        self.advance(idx, &mut events);
        Ok(events)
    }

    /// Calls the game off. Nothing is settled; every seat keeps what it
    /// committed, listed here as refunds.
    pub fn cancel(&mut self) -> GameResult<Vec<Refund>> {
        if !self.is_in_progress() {
            return Err(GameError::GameNotInProgress);
        }
        self.status = GameStatus::Cancelled;
        self.current_actor = None;
        tracing::info!(game_id = %self.id, pot = self.pot(), "game cancelled");
        Ok(self
            .seats
            .iter()
            .filter(|seat| seat.committed > 0)
            .map(|seat| Refund {
                player_id: seat.player_id.clone(),
                amount: seat.committed,
            })
            .collect())
    }

    pub fn current_seat(&self) -> Option<&Seat> {
        self.current_actor.and_then(|idx| self.seats.get(idx))
    }

    pub fn current_actor_id(&self) -> Option<&str> {
        self.current_seat().map(|seat| seat.player_id.as_str())
    }

    pub fn seat_index(&self, player_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == GameStatus::InProgress
    }

    /// Seated and still holding a stake in the pot
    pub fn is_live_participant(&self, player_id: &str) -> bool {
        self.is_in_progress()
            && self
                .seat_index(player_id)
                .is_some_and(|idx| self.seats[idx].is_live())
    }

    pub fn pot(&self) -> i64 {
        self.seats.iter().map(|s| s.committed).sum()
    }

    pub fn highest_round_bet(&self) -> i64 {
        self.seats.iter().map(|s| s.round_bet).max().unwrap_or(0)
    }

    /// Flags a seat to be folded on its turn. Returns false if not seated.
    pub fn mark_away(&mut self, player_id: &str) -> bool {
        match self.seat_index(player_id) {
            Some(idx) => {
                self.seats[idx].away = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_present(&mut self, player_id: &str) {
        if let Some(idx) = self.seat_index(player_id) {
            self.seats[idx].away = false;
        }
    }

    /// A fold for the current actor when their seat is away, applied by the
    /// coordinator through [`Game::apply_action`] like any other action.
    pub fn pending_auto_action(&self) -> Option<Action> {
        let seat = self.current_seat().filter(|_| self.is_in_progress())?;
        seat.away
            .then(|| Action::new(self.id.clone(), seat.player_id.clone(), ActionKind::Fold))
    }

    /// What to submit for the current actor when their turn times out.
    pub fn timeout_action(&self) -> Option<Action> {
        if let Some(action) = self.pending_auto_action() {
            return Some(action);
        }
        let seat = self.current_seat().filter(|_| self.is_in_progress())?;
        let facing_bet = self.highest_round_bet() > seat.round_bet;
        let kind = self.game_type.timeout_action(self.phase, facing_bet);
        Some(Action::new(self.id.clone(), seat.player_id.clone(), kind))
    }

    fn first_actor(&self) -> Option<usize> {
        self.seats.iter().position(Seat::can_act)
    }

    /// Next seat after `idx` that can act, wrapping around the table.
    fn next_actor_after(&self, idx: usize) -> Option<usize> {
        let count = self.seats.len();
        (1..=count)
            .map(|offset| (idx + offset) % count)
            .find(|&i| self.seats[i].can_act())
    }

    fn live_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_live()).count()
    }

    fn push_turn_prompt(&self, events: &mut Vec<GameEvent>) {
        if let Some(seat) = self.current_seat() {
            events.push(GameEvent::PlayerTurn {
                player_id: seat.player_id.clone(),
                legal_actions: self.game_type.legal_actions(self.phase).to_vec(),
                to_call: (self.highest_round_bet() - seat.round_bet).max(0),
            });
        }
    }
}
