//! Rooms: membership, bet limits and the waiting / active / closed lifecycle.
//!
//! A room owns at most one game at a time. Members are kept in join order,
//! which is also the seating order of the next game.

use super::{
    constants::{MAX_ID_LEN, MAX_ROOM_NAME_LEN},
    error::{GameError, GameResult},
    rules::GameType,
    state::{Game, GameEvent, GameOutcome, GameSnapshot, GameStatus, Refund},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
    Closed,
}

/// Inclusive bet bounds. A room is fixed-bet when both ends are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub min_bet: i64,
    pub max_bet: i64,
}

impl BetLimits {
    pub fn new(min_bet: i64, max_bet: i64) -> Self {
        Self { min_bet, max_bet }
    }

    pub fn fixed(bet: i64) -> Self {
        Self::new(bet, bet)
    }

    pub fn is_fixed(&self) -> bool {
        self.min_bet == self.max_bet
    }

    pub fn contains(&self, amount: i64) -> bool {
        (self.min_bet..=self.max_bet).contains(&amount)
    }

    pub fn check(&self, amount: i64) -> GameResult<()> {
        if self.contains(amount) {
            Ok(())
        } else {
            Err(GameError::BetOutOfBounds {
                min: self.min_bet,
                max: self.max_bet,
                attempted: amount,
            })
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub host_id: String,
    pub game_type: GameType,
    pub limits: BetLimits,
    pub max_players: usize,
    pub members: Vec<String>,
    pub status: RoomStatus,
    /// Current game, or the last one once it has completed
    pub game: Option<Game>,
    pub last_outcome: Option<GameOutcome>,
    pub games_played: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Monotonic twin of `last_activity`, used for idle expiry
    last_active_at: Instant,
    cooldown_until: Option<Instant>,
}

impl Room {
    /// Validates the configuration and seats the host.
    pub fn new(
        id: String,
        host_id: String,
        game_type: GameType,
        bet_amount: i64,
        max_players: usize,
        max_bet: Option<i64>,
        name: Option<String>,
    ) -> GameResult<Self> {
        if bet_amount <= 0 {
            return Err(GameError::invalid_config("bet amount must be positive"));
        }
        let max_bet = max_bet.unwrap_or(bet_amount);
        if max_bet < bet_amount {
            return Err(GameError::invalid_config(format!(
                "max bet {} is below the minimum bet {}",
                max_bet, bet_amount
            )));
        }
        let capacity = game_type.capacity_range();
        if !capacity.contains(&max_players) {
            return Err(GameError::invalid_config(format!(
                "max players must be between {} and {}",
                capacity.start(),
                capacity.end()
            )));
        }
        if host_id.is_empty() || host_id.len() > MAX_ID_LEN {
            return Err(GameError::invalid_config("invalid host id"));
        }

        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if n.len() > MAX_ROOM_NAME_LEN => {
                return Err(GameError::invalid_config(format!(
                    "room name longer than {} characters",
                    MAX_ROOM_NAME_LEN
                )));
            }
            Some(n) if !n.is_empty() => n,
            _ => format!("{} room", game_type),
        };

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            members: vec![host_id.clone()],
            host_id,
            game_type,
            limits: BetLimits::new(bet_amount, max_bet),
            max_players,
            status: RoomStatus::Waiting,
            game: None,
            last_outcome: None,
            games_played: 0,
            created_at: now,
            last_activity: now,
            last_active_at: Instant::now(),
            cooldown_until: None,
        })
    }

    pub fn is_member(&self, participant_id: &str) -> bool {
        self.members.iter().any(|m| m == participant_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Room-local join checks, in the order clients see them.
    pub fn check_join(&self, participant_id: &str, bet_amount: Option<i64>) -> GameResult<()> {
        if self.status == RoomStatus::Closed {
            return Err(GameError::RoomClosed);
        }
        if self.is_member(participant_id) {
            return Err(GameError::AlreadyInRoom);
        }
        if self.is_full() {
            return Err(GameError::RoomFull);
        }
        if let Some(amount) = bet_amount {
            if self.limits.is_fixed() && amount != self.limits.min_bet {
                return Err(GameError::BetMismatch {
                    required: self.limits.min_bet,
                    attempted: amount,
                });
            }
            self.limits.check(amount)?;
        }
        Ok(())
    }

    pub fn add_member(&mut self, participant_id: &str, bet_amount: Option<i64>) -> GameResult<()> {
        self.check_join(participant_id, bet_amount)?;
        self.members.push(participant_id.to_string());
        self.touch();
        Ok(())
    }

    /// Returns false when the participant was not a member. The host role
    /// passes to the longest-seated remaining member.
    pub fn remove_member(&mut self, participant_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != participant_id);
        if self.members.len() == before {
            return false;
        }
        if self.host_id == participant_id {
            if let Some(next) = self.members.first() {
                self.host_id = next.clone();
            }
        }
        self.touch();
        true
    }

    pub fn current_game(&self) -> Option<&Game> {
        self.game.as_ref().filter(|g| g.is_in_progress())
    }

    pub fn current_game_mut(&mut self) -> Option<&mut Game> {
        self.game.as_mut().filter(|g| g.is_in_progress())
    }

    /// A waiting room with enough members for its game type and no
    /// post-game cooldown running.
    pub fn ready_to_start(&self) -> bool {
        self.status == RoomStatus::Waiting
            && self.members.len() >= self.game_type.min_players()
            && self.current_game().is_none()
            && self.cooldown_remaining().is_none()
    }

    /// Blocks the next game for `cooldown`. A zero cooldown is a no-op.
    pub fn start_cooldown(&mut self, cooldown: Duration) {
        if !cooldown.is_zero() {
            self.cooldown_until = Some(Instant::now() + cooldown);
        }
    }

    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Time since the last join, leave or game transition.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_active_at)
    }

    /// Waiting with nothing dealt and untouched for at least `timeout`.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.status == RoomStatus::Waiting
            && self.current_game().is_none()
            && self.idle_for() >= timeout
    }

    /// Seats every member in join order, starts the game and flips the room
    /// to active. `balances` are the members' last-known balances.
    pub fn start_game(
        &mut self,
        game_id: String,
        balances: &HashMap<String, i64>,
    ) -> GameResult<Vec<GameEvent>> {
        if let Some(left) = self.cooldown_remaining() {
            return Err(GameError::Cooldown {
                remaining_secs: left.as_secs_f64().ceil() as u64,
            });
        }
        if !self.ready_to_start() {
            return Err(GameError::illegal(format!(
                "Need at least {} players in a waiting room to start",
                self.game_type.min_players()
            )));
        }
        let players = self
            .members
            .iter()
            .map(|m| (m.clone(), balances.get(m).copied().unwrap_or(0)))
            .collect();
        let mut game = Game::new(game_id, self.id.clone(), self.game_type, self.limits, players);
        let events = game.start()?;
        self.game = Some(game);
        self.status = RoomStatus::Active;
        self.touch();
        Ok(events)
    }

    /// Records a completed game and returns the room to waiting. `None` if
    /// there is no completed game or it was already recorded.
    pub fn finish_game(&mut self) -> Option<GameOutcome> {
        let outcome = self
            .game
            .as_ref()
            .filter(|g| g.status == GameStatus::Completed)
            .and_then(|g| g.outcome.clone())?;
        if self
            .last_outcome
            .as_ref()
            .is_some_and(|last| last.game_id == outcome.game_id)
        {
            return None;
        }
        self.last_outcome = Some(outcome.clone());
        self.games_played += 1;
        if self.status == RoomStatus::Active {
            self.status = RoomStatus::Waiting;
        }
        self.touch();
        Some(outcome)
    }

    /// Calls off the current game and returns the room to waiting. Yields
    /// the cancelled game's id and what each seat had committed.
    pub fn cancel_game(&mut self) -> GameResult<(String, Vec<Refund>)> {
        let game = self.current_game_mut().ok_or(GameError::GameNotFound)?;
        let refunds = game.cancel()?;
        let game_id = game.id.clone();
        if self.status == RoomStatus::Active {
            self.status = RoomStatus::Waiting;
        }
        self.touch();
        Ok((game_id, refunds))
    }

    pub fn close(&mut self) {
        self.status = RoomStatus::Closed;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
        self.last_active_at = Instant::now();
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            game_type: self.game_type,
            min_bet: self.limits.min_bet,
            max_bet: self.limits.max_bet,
            max_players: self.max_players,
            player_count: self.members.len(),
            status: self.status,
            created_at: self.created_at,
        }
    }

    /// Full room view; the game part is rendered for `viewer`.
    pub fn details(&self, viewer: Option<&str>) -> RoomDetails {
        RoomDetails {
            summary: self.summary(),
            members: self.members.clone(),
            current_game_id: self.current_game().map(|g| g.id.clone()),
            game: self.game.as_ref().map(|g| g.snapshot(viewer)),
            games_played: self.games_played,
            last_outcome: self.last_outcome.clone(),
            last_activity: self.last_activity,
        }
    }
}

/// What a room listing shows per room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub name: String,
    pub host_id: String,
    pub game_type: GameType,
    pub min_bet: i64,
    pub max_bet: i64,
    pub max_players: usize,
    pub player_count: usize,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetails {
    #[serde(flatten)]
    pub summary: RoomSummary,
    pub members: Vec<String>,
    pub current_game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSnapshot>,
    pub games_played: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<GameOutcome>,
    pub last_activity: DateTime<Utc>,
}

/// Room listing filter. A bound is satisfied when the room's minimum bet
/// falls inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomFilter {
    pub game_type: Option<GameType>,
    pub min_bet: Option<i64>,
    pub max_bet: Option<i64>,
}

impl RoomFilter {
    pub fn matches(&self, room: &RoomSummary) -> bool {
        self.game_type.map_or(true, |t| t == room.game_type)
            && self.min_bet.map_or(true, |min| room.min_bet >= min)
            && self.max_bet.map_or(true, |max| room.min_bet <= max)
    }
}

/// Joinable rooms as of the moment the listing was taken. Filtering happens
/// while iterating; the listing can be walked any number of times.
#[derive(Debug, Clone)]
pub struct RoomListing {
    rooms: Vec<RoomSummary>,
    filter: RoomFilter,
}

impl RoomListing {
    pub fn new(rooms: Vec<RoomSummary>, filter: RoomFilter) -> Self {
        Self { rooms, filter }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomSummary> + '_ {
        self.rooms
            .iter()
            .filter(move |room| {
                room.status == RoomStatus::Waiting
                    && room.player_count < room.max_players
                    && self.filter.matches(room)
            })
    }

    pub fn to_vec(&self) -> Vec<RoomSummary> {
        self.iter().cloned().collect()
    }
}
