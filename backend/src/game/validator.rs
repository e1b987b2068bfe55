//! Action legality checks.
//!
//! Nothing in here mutates state; [`is_legal`] looks at a game and an action
//! and either says how many chips the action commits or why it is rejected.
//! Checks run in a fixed order: game status, turn ownership, action kind for
//! the phase, bet bounds, then balance.

use crate::game::action::Action;
use crate::game::constants::{MAX_SPLIT_HANDS, ROULETTE_POCKETS};
use crate::game::error::{GameError, GameResult};
use crate::game::rules::{ActionKind, GameType};
use crate::game::state::{Game, GameStatus};

/// An accepted action and the chips it moves from the player's stack into the pot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Legal {
    pub chips: i64,
}

pub fn is_legal(game: &Game, action: &Action) -> GameResult<Legal> {
    if action.game_id != game.id {
        return Err(GameError::GameNotFound);
    }
    if game.status != GameStatus::InProgress {
        return Err(GameError::GameNotInProgress);
    }

    let seat = game
        .current_seat()
        .filter(|seat| seat.player_id == action.player_id && seat.can_act())
        .ok_or(GameError::NotCurrentActor)?;

    if !game.game_type.is_legal(game.phase, action.kind) {
        return Err(GameError::illegal(format!(
            "{} is not allowed in {} during {}",
            action.kind, game.game_type, game.phase
        )));
    }

    let highest = game.highest_round_bet();
    let limits = game.limits;

    let chips = match action.kind {
        ActionKind::Fold | ActionKind::Spin | ActionKind::Stand => 0,
        ActionKind::Check => {
            if seat.round_bet < highest {
                return Err(GameError::illegal(format!(
                    "Cannot check, must call {} or fold",
                    highest - seat.round_bet
                )));
            }
            0
        }
        ActionKind::Call => {
            let to_call = highest - seat.round_bet;
            if to_call <= 0 {
                return Err(GameError::illegal("Nothing to call, check instead"));
            }
            to_call
        }
        ActionKind::Bet => {
            // Blackjack seats each place their own stake
            if game.game_type == GameType::Poker && highest > 0 {
                return Err(GameError::illegal("A bet is already open, call or raise"));
            }
            let amount = required_amount(action)?;
            limits.check(amount)?;
            amount - seat.round_bet
        }
        ActionKind::Raise => {
            if highest == 0 {
                return Err(GameError::illegal("Nothing to raise, bet instead"));
            }
            let amount = required_amount(action)?;
            if amount <= highest {
                return Err(GameError::BetOutOfBounds {
                    min: limits.min_bet.max(highest + 1),
                    max: limits.max_bet,
                    attempted: amount,
                });
            }
            limits.check(amount)?;
            amount - seat.round_bet
        }
        ActionKind::Hit => {
            seat.current_hand()
                .ok_or_else(|| GameError::illegal("No hand to play"))?;
            0
        }
        ActionKind::Double => {
            let hand = seat
                .current_hand()
                .ok_or_else(|| GameError::illegal("No hand to play"))?;
            if !hand.can_double() {
                return Err(GameError::illegal("Can only double on the first two cards"));
            }
            hand.bet
        }
        ActionKind::Split => {
            let hand = seat
                .current_hand()
                .ok_or_else(|| GameError::illegal("No hand to play"))?;
            if !hand.can_split() {
                return Err(GameError::illegal("Can only split a pair"));
            }
            if seat.hands.len() >= MAX_SPLIT_HANDS {
                return Err(GameError::illegal(format!(
                    "Cannot split into more than {} hands",
                    MAX_SPLIT_HANDS
                )));
            }
            hand.bet
        }
        ActionKind::BetNumber => {
            let number = action
                .number
                .ok_or_else(|| GameError::illegal("Pick a number to bet on"))?;
            if number >= ROULETTE_POCKETS {
                return Err(GameError::illegal(format!(
                    "Pick a number between 0 and {}",
                    ROULETTE_POCKETS - 1
                )));
            }
            let amount = required_amount(action)?;
            limits.check(amount)?;
            amount
        }
    };

    if chips > seat.stack() {
        return Err(GameError::InsufficientBalance {
            required: chips,
            available: seat.stack(),
        });
    }

    Ok(Legal { chips })
}

fn required_amount(action: &Action) -> GameResult<i64> {
    action
        .amount
        .ok_or_else(|| GameError::illegal(format!("An amount is required to {}", action.kind)))
}
