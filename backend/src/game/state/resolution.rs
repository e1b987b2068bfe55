use super::*;
use crate::game::hand::{evaluate_poker, PokerRank};

/// Final result of one player in a completed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: String,
    pub committed: i64,
    pub payout: i64,
    /// `payout - committed`; what the ledger applies
    pub net: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_description: Option<String>,
}

/// Everything the ledger and the clients need to know about a finished game.
/// Chips handed back to a seat when its game is cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub player_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub game_id: String,
    pub room_id: String,
    pub game_type: GameType,
    pub pot: i64,
    /// Empty when every stake was refunded
    pub winners: Vec<String>,
    pub results: Vec<PlayerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spin_result: Option<u8>,
    pub completed_at: DateTime<Utc>,
}

impl GameOutcome {
    pub fn result_for(&self, player_id: &str) -> Option<&PlayerResult> {
        self.results.iter().find(|r| r.player_id == player_id)
    }
}

/// Shares of a pot: `payouts[i]` goes to seat `i`.
struct Split {
    winners: Vec<usize>,
    payouts: Vec<i64>,
}

impl Game {
    pub(super) fn resolve(&mut self, events: &mut Vec<GameEvent>) {
        let pot = self.pot();
        let live: Vec<usize> = (0..self.seats.len())
            .filter(|&i| self.seats[i].is_live())
            .collect();

        let mut descriptions: Vec<Option<String>> = vec![None; self.seats.len()];
        let split = if live.len() == 1 {
            self.award(&[(live[0], 1)], pot)
        } else {
            match self.game_type {
                GameType::Poker => self.resolve_poker(&live, pot, &mut descriptions),
                GameType::Blackjack => self.resolve_blackjack(&live, pot, &mut descriptions),
                GameType::Roulette => self.resolve_roulette(&live, pot),
            }
        };

        let results = self
            .seats
            .iter()
            .zip(split.payouts.iter())
            .zip(descriptions)
            .map(|((seat, &payout), hand_description)| PlayerResult {
                player_id: seat.player_id.clone(),
                committed: seat.committed,
                payout,
                net: payout - seat.committed,
                hand_description,
            })
            .collect();

        let outcome = GameOutcome {
            game_id: self.id.clone(),
            room_id: self.room_id.clone(),
            game_type: self.game_type,
            pot,
            winners: split
                .winners
                .iter()
                .map(|&i| self.seats[i].player_id.clone())
                .collect(),
            results,
            spin_result: self.spin_result,
            completed_at: Utc::now(),
        };

        tracing::info!(
            game_id = %self.id,
            room_id = %self.room_id,
            pot,
            winners = ?outcome.winners,
            "game completed"
        );

        self.status = GameStatus::Completed;
        self.current_actor = None;
        self.outcome = Some(outcome.clone());
        events.push(GameEvent::StateChanged);
        events.push(GameEvent::GameOver(outcome));
    }

    fn resolve_poker(
        &self,
        live: &[usize],
        pot: i64,
        descriptions: &mut [Option<String>],
    ) -> Split {
        let ranked: Vec<(usize, PokerRank)> = live
            .iter()
            .filter_map(|&i| {
                evaluate_poker(&self.seats[i].hole_cards, &self.community_cards)
                    .map(|rank| (i, rank))
            })
            .collect();
        for (i, rank) in &ranked {
            descriptions[*i] = Some(rank.description.to_string());
        }

        let Some(best) = ranked.iter().map(|(_, rank)| rank).max() else {
            return self.refund(live, pot);
        };
        let weights: Vec<(usize, i64)> = ranked
            .iter()
            .filter(|(_, rank)| rank == best)
            .map(|(i, _)| (*i, 1))
            .collect();
        self.award(&weights, pot)
    }

    fn resolve_blackjack(
        &self,
        live: &[usize],
        pot: i64,
        descriptions: &mut [Option<String>],
    ) -> Split {
        let totals: Vec<(usize, u8)> = live
            .iter()
            .filter_map(|&i| self.seats[i].best_blackjack_total().map(|t| (i, t)))
            .collect();
        for &i in live {
            descriptions[i] = Some(match self.seats[i].best_blackjack_total() {
                Some(total) => total.to_string(),
                None => "Bust".to_string(),
            });
        }

        let Some(best) = totals.iter().map(|(_, t)| *t).max() else {
            return self.refund(live, pot);
        };
        let weights: Vec<(usize, i64)> = totals
            .iter()
            .filter(|(_, t)| *t == best)
            .map(|(i, _)| (*i, 1))
            .collect();
        self.award(&weights, pot)
    }

    fn resolve_roulette(&self, live: &[usize], pot: i64) -> Split {
        let Some(pocket) = self.spin_result else {
            return self.refund(live, pot);
        };
        let weights: Vec<(usize, i64)> = live
            .iter()
            .map(|&i| {
                let stake: i64 = self.seats[i]
                    .number_bets
                    .iter()
                    .filter(|b| b.number == pocket)
                    .map(|b| b.amount)
                    .sum();
                (i, stake)
            })
            .filter(|(_, stake)| *stake > 0)
            .collect();

        if weights.is_empty() {
            return self.refund(live, pot);
        }
        self.award(&weights, pot)
    }

    /// Pays `pot` out proportionally to `weights`. The integer remainder goes
    /// to the earliest winning seat.
    fn award(&self, weights: &[(usize, i64)], pot: i64) -> Split {
        let mut payouts = vec![0i64; self.seats.len()];
        distribute(&mut payouts, weights, pot);
        Split {
            winners: weights.iter().map(|(i, _)| *i).collect(),
            payouts,
        }
    }

    /// Nobody won: live seats get their own stake back and folded stakes are
    /// shared equally between them.
    fn refund(&self, live: &[usize], pot: i64) -> Split {
        let mut payouts = vec![0i64; self.seats.len()];
        for &i in live {
            payouts[i] = self.seats[i].committed;
        }
        let forfeited = pot - payouts.iter().sum::<i64>();
        let equal: Vec<(usize, i64)> = live.iter().map(|&i| (i, 1)).collect();
        distribute(&mut payouts, &equal, forfeited);
        Split {
            winners: Vec::new(),
            payouts,
        }
    }
}

fn distribute(payouts: &mut [i64], weights: &[(usize, i64)], amount: i64) {
    let total_weight: i64 = weights.iter().map(|(_, w)| *w).sum();
    if amount <= 0 || total_weight <= 0 {
        return;
    }
    let mut paid = 0;
    for &(i, weight) in weights {
        let share = (amount as i128 * weight as i128 / total_weight as i128) as i64;
        payouts[i] += share;
        paid += share;
    }
    if let Some(&(first, _)) = weights.iter().min_by_key(|(i, _)| *i) {
        payouts[first] += amount - paid;
    }
}
