//! Rule tables for the supported game types.
//!
//! One state machine drives every game; what differs per game type (phase
//! order, which actions are legal in which phase, what happens when a turn
//! times out) lives here as plain data keyed by [`GameType`].

use crate::game::constants::{MAX_ROOM_CAPACITY, MIN_PLAYERS_TO_START, MIN_ROOM_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Poker,
    Blackjack,
    Roulette,
}

/// Sub-phase of an in-progress game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreFlop,
    Flop,
    Turn,
    River,
    Betting,
    Playing,
    Spinning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Bet,
    Raise,
    Call,
    Check,
    Fold,
    Hit,
    Stand,
    Double,
    Split,
    BetNumber,
    Spin,
}

impl GameType {
    pub fn id(&self) -> &'static str {
        match self {
            GameType::Poker => "poker",
            GameType::Blackjack => "blackjack",
            GameType::Roulette => "roulette",
        }
    }

    pub fn min_players(&self) -> usize {
        MIN_PLAYERS_TO_START
    }

    pub fn capacity_range(&self) -> RangeInclusive<usize> {
        MIN_ROOM_CAPACITY..=MAX_ROOM_CAPACITY
    }

    pub fn opening_phase(&self) -> Phase {
        match self {
            GameType::Poker => Phase::PreFlop,
            GameType::Blackjack | GameType::Roulette => Phase::Betting,
        }
    }

    /// Phase after `phase`, or `None` when the game resolves instead.
    pub fn next_phase(&self, phase: Phase) -> Option<Phase> {
        match (self, phase) {
            (GameType::Poker, Phase::PreFlop) => Some(Phase::Flop),
            (GameType::Poker, Phase::Flop) => Some(Phase::Turn),
            (GameType::Poker, Phase::Turn) => Some(Phase::River),
            (GameType::Blackjack, Phase::Betting) => Some(Phase::Playing),
            (GameType::Roulette, Phase::Betting) => Some(Phase::Spinning),
            _ => None,
        }
    }

    pub fn legal_actions(&self, phase: Phase) -> &'static [ActionKind] {
        use ActionKind::*;
        match (self, phase) {
            (GameType::Poker, Phase::PreFlop | Phase::Flop | Phase::Turn | Phase::River) => {
                &[Bet, Raise, Call, Check, Fold]
            }
            (GameType::Blackjack, Phase::Betting) => &[Bet, Fold],
            (GameType::Blackjack, Phase::Playing) => &[Hit, Stand, Double, Split, Fold],
            (GameType::Roulette, Phase::Betting) => &[BetNumber, Fold],
            (GameType::Roulette, Phase::Spinning) => &[Spin, Fold],
            _ => &[],
        }
    }

    pub fn is_legal(&self, phase: Phase, kind: ActionKind) -> bool {
        self.legal_actions(phase).contains(&kind)
    }

    /// Whether the acting seat keeps the turn after a successful action in
    /// this phase (blackjack players play out all of their hands in one go).
    pub fn actor_keeps_turn(&self, phase: Phase) -> bool {
        matches!((self, phase), (GameType::Blackjack, Phase::Playing))
    }

    /// Action submitted for a player whose turn timed out. `facing_bet` is
    /// true when checking is not possible.
    pub fn timeout_action(&self, phase: Phase, facing_bet: bool) -> ActionKind {
        match (self, phase) {
            (GameType::Poker, _) if !facing_bet => ActionKind::Check,
            (GameType::Blackjack, Phase::Playing) => ActionKind::Stand,
            (GameType::Roulette, Phase::Spinning) => ActionKind::Spin,
            _ => ActionKind::Fold,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poker" => Ok(GameType::Poker),
            "blackjack" => Ok(GameType::Blackjack),
            "roulette" => Ok(GameType::Roulette),
            other => Err(format!("Unknown game type: {}", other)),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PreFlop => "pre_flop",
            Phase::Flop => "flop",
            Phase::Turn => "turn",
            Phase::River => "river",
            Phase::Betting => "betting",
            Phase::Playing => "playing",
            Phase::Spinning => "spinning",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Bet => "bet",
            ActionKind::Raise => "raise",
            ActionKind::Call => "call",
            ActionKind::Check => "check",
            ActionKind::Fold => "fold",
            ActionKind::Hit => "hit",
            ActionKind::Stand => "stand",
            ActionKind::Double => "double",
            ActionKind::Split => "split",
            ActionKind::BetNumber => "bet_number",
            ActionKind::Spin => "spin",
        };
        f.write_str(name)
    }
}
