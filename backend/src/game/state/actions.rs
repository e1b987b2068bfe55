use super::*;
use crate::game::constants::ROULETTE_POCKETS;
use crate::game::hand::BlackjackHand;
use crate::game::player::NumberBet;

impl Game {
    /// Applies an already validated action to seat `idx`.
    pub(super) fn perform(&mut self, idx: usize, action: &Action, chips: i64) -> GameResult<()> {
        match action.kind {
            ActionKind::Fold => {
                self.seats[idx].fold();
            }
            ActionKind::Check => {}
            ActionKind::Call | ActionKind::Bet | ActionKind::Raise => {
                self.seats[idx].commit(chips);
            }
            ActionKind::BetNumber => {
                let number = action
                    .number
                    .ok_or_else(|| GameError::Internal("bet_number without a number".into()))?;
                let seat = &mut self.seats[idx];
                seat.commit(chips);
                seat.number_bets.push(NumberBet {
                    number,
                    amount: chips,
                });
            }
            ActionKind::Spin => {
                let pocket = self.deck.spin(ROULETTE_POCKETS);
                tracing::debug!(game_id = %self.id, pocket, "wheel spun");
                self.spin_result = Some(pocket);
            }
            ActionKind::Hit => {
                let card = self.deck.deal();
                let seat = &mut self.seats[idx];
                if let Some(hand) = seat.current_hand_mut() {
                    hand.add_card(card);
                }
                seat.advance_hand();
            }
            ActionKind::Stand => {
                let seat = &mut self.seats[idx];
                if let Some(hand) = seat.current_hand_mut() {
                    hand.finished = true;
                }
                seat.advance_hand();
            }
            ActionKind::Double => {
                let card = self.deck.deal();
                let seat = &mut self.seats[idx];
                seat.commit(chips);
                if let Some(hand) = seat.current_hand_mut() {
                    hand.bet += chips;
                    hand.doubled = true;
                    hand.add_card(card);
                    hand.finished = true;
                }
                seat.advance_hand();
            }
            ActionKind::Split => {
                let first_draw = self.deck.deal();
                let second_draw = self.deck.deal();
                let seat = &mut self.seats[idx];
                seat.commit(chips);
                let active = seat.active_hand;
                let split_card = seat
                    .current_hand_mut()
                    .and_then(|hand| hand.cards.pop())
                    .ok_or_else(|| GameError::Internal("split without a hand".into()))?;
                if let Some(hand) = seat.current_hand_mut() {
                    hand.add_card(first_draw);
                }
                seat.hands
                    .insert(active + 1, BlackjackHand::new(vec![split_card, second_draw], chips));
                seat.advance_hand();
            }
        }
        self.seats[idx].has_acted = true;
        Ok(())
    }

    /// Moves the turn on after seat `idx` acted: finishes the game, opens the
    /// next phase, or prompts the next actor.
    pub(super) fn advance(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        if self.live_count() <= 1 {
            self.resolve(events);
            return;
        }

        if self.round_complete() {
            self.advance_phase(events);
            return;
        }

        let keeps_turn =
            self.game_type.actor_keeps_turn(self.phase) && self.seats[idx].can_act();
        if !keeps_turn {
            self.current_actor = self.next_actor_after(idx);
        }
        events.push(GameEvent::StateChanged);
        self.push_turn_prompt(events);
    }

    /// Whether every seat still in the phase has done what the phase asks.
    pub(super) fn round_complete(&self) -> bool {
        match (self.game_type, self.phase) {
            (_, Phase::Spinning) => self.spin_result.is_some(),
            (GameType::Blackjack, Phase::Playing) => !self.seats.iter().any(Seat::can_act),
            (GameType::Poker, _) => {
                let highest = self.highest_round_bet();
                self.seats
                    .iter()
                    .filter(|s| s.can_act())
                    .all(|s| s.has_acted && s.round_bet == highest)
            }
            _ => self
                .seats
                .iter()
                .filter(|s| s.can_act())
                .all(|s| s.has_acted),
        }
    }
}
