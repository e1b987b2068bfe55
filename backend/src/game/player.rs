use crate::game::deck::Card;
use crate::game::hand::BlackjackHand;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatState {
    Active,   // Still able to act
    Folded,   // Out of the game, stake stays in the pot
    Finished, // Done acting this phase (blackjack hands all played)
}

/// A roulette pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberBet {
    pub number: u8,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: String,
    /// Last-known ledger balance when the game started
    pub balance: i64,
    /// Total committed to the pot this game
    pub committed: i64,
    /// Committed during the current round only
    pub round_bet: i64,
    pub state: SeatState,
    pub has_acted: bool,
    /// Left or timed out of the grace period; folds as soon as it is their turn
    pub away: bool,
    pub hole_cards: Vec<Card>,
    pub hands: Vec<BlackjackHand>,
    pub active_hand: usize,
    pub number_bets: Vec<NumberBet>,
}

impl Seat {
    pub fn new(player_id: String, balance: i64) -> Self {
        Self {
            player_id,
            balance,
            committed: 0,
            round_bet: 0,
            state: SeatState::Active,
            has_acted: false,
            away: false,
            hole_cards: vec![],
            hands: vec![],
            active_hand: 0,
            number_bets: vec![],
        }
    }

    /// Chips still available to commit
    pub fn stack(&self) -> i64 {
        self.balance - self.committed
    }

    pub fn commit(&mut self, amount: i64) {
        self.committed += amount;
        self.round_bet += amount;
    }

    pub fn fold(&mut self) {
        self.state = SeatState::Folded;
    }

    pub fn can_act(&self) -> bool {
        self.state == SeatState::Active
    }

    pub fn is_live(&self) -> bool {
        self.state != SeatState::Folded
    }

    pub fn reset_for_new_round(&mut self) {
        self.round_bet = 0;
        self.has_acted = false;
    }

    pub fn current_hand(&self) -> Option<&BlackjackHand> {
        self.hands.get(self.active_hand)
    }

    pub fn current_hand_mut(&mut self) -> Option<&mut BlackjackHand> {
        self.hands.get_mut(self.active_hand)
    }

    /// Moves to the next unfinished blackjack hand; marks the seat finished
    /// once every hand has been played.
    pub fn advance_hand(&mut self) {
        while self
            .hands
            .get(self.active_hand)
            .is_some_and(|hand| hand.finished)
        {
            self.active_hand += 1;
        }
        if self.active_hand >= self.hands.len() {
            self.state = SeatState::Finished;
        }
    }

    /// Best non-bust blackjack total across all hands
    pub fn best_blackjack_total(&self) -> Option<u8> {
        self.hands
            .iter()
            .filter(|h| !h.is_bust())
            .map(BlackjackHand::total)
            .max()
    }
}
