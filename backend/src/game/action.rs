use crate::game::rules::ActionKind;
use serde::{Deserialize, Serialize};

/// A move submitted by one participant. Either applied to the game or
/// rejected; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub game_id: String,
    pub player_id: String,
    pub kind: ActionKind,
    /// Chips for bet / raise / bet_number. For poker this is the total the
    /// player will have committed in the round ("raise to").
    pub amount: Option<i64>,
    /// Roulette pocket for bet_number
    pub number: Option<u8>,
}

impl Action {
    pub fn new(game_id: impl Into<String>, player_id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            game_id: game_id.into(),
            player_id: player_id.into(),
            kind,
            amount: None,
            number: None,
        }
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_number(mut self, number: u8) -> Self {
        self.number = Some(number);
        self
    }
}
