use super::*;
use crate::game::hand::BlackjackHand;
use crate::game::player::{NumberBet, SeatState};

/// One seat as a particular viewer is allowed to see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub player_id: String,
    pub committed: i64,
    pub round_bet: i64,
    pub stack: i64,
    pub state: SeatState,
    pub away: bool,
    pub is_current: bool,
    /// Hidden from everyone but the owner until showdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<Card>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hands: Vec<BlackjackHand>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub number_bets: Vec<NumberBet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub room_id: String,
    pub game_type: GameType,
    pub status: GameStatus,
    pub phase: Phase,
    pub round: u32,
    pub pot: i64,
    pub highest_bet: i64,
    pub min_bet: i64,
    pub max_bet: i64,
    pub current_actor: Option<String>,
    pub community_cards: Vec<Card>,
    pub spin_result: Option<u8>,
    pub seats: Vec<SeatView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl Game {
    /// State as seen by `viewer`. `None` gives the spectator view.
    pub fn snapshot(&self, viewer: Option<&str>) -> GameSnapshot {
        let showdown = self.status == GameStatus::Completed;
        let seats = self
            .seats
            .iter()
            .enumerate()
            .map(|(idx, seat)| {
                let owner = viewer == Some(seat.player_id.as_str());
                let revealed = owner || (showdown && seat.is_live());
                SeatView {
                    player_id: seat.player_id.clone(),
                    committed: seat.committed,
                    round_bet: seat.round_bet,
                    stack: seat.stack(),
                    state: seat.state,
                    away: seat.away,
                    is_current: self.current_actor == Some(idx),
                    hole_cards: (revealed && !seat.hole_cards.is_empty())
                        .then(|| seat.hole_cards.clone()),
                    hands: seat.hands.clone(),
                    number_bets: seat.number_bets.clone(),
                }
            })
            .collect();

        GameSnapshot {
            game_id: self.id.clone(),
            room_id: self.room_id.clone(),
            game_type: self.game_type,
            status: self.status,
            phase: self.phase,
            round: self.round,
            pot: self.pot(),
            highest_bet: self.highest_round_bet(),
            min_bet: self.limits.min_bet,
            max_bet: self.limits.max_bet,
            current_actor: self.current_actor_id().map(str::to_string),
            community_cards: self.community_cards.clone(),
            spin_result: self.spin_result,
            seats,
            outcome: self.outcome.clone(),
        }
    }
}
