use super::*;
use crate::game::constants::{FLOP_CARDS, RIVER_CARDS, TURN_CARDS};
use crate::game::hand::BlackjackHand;

impl Game {
    /// Opens the next phase, or resolves the game after the last one. Phases
    /// in which nobody is left to act are skipped straight through.
    pub(super) fn advance_phase(&mut self, events: &mut Vec<GameEvent>) {
        loop {
            let Some(next) = self.game_type.next_phase(self.phase) else {
                self.resolve(events);
                return;
            };

            self.enter_phase(next);
            events.push(GameEvent::RoundStarted {
                round: self.round,
                phase: self.phase,
            });

            if self.current_actor.is_some() && !self.round_complete() {
                events.push(GameEvent::StateChanged);
                self.push_turn_prompt(events);
                return;
            }
        }
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.round += 1;
        self.phase = phase;
        for seat in &mut self.seats {
            seat.reset_for_new_round();
        }

        match phase {
            Phase::Flop => self.deal_community(FLOP_CARDS),
            Phase::Turn => self.deal_community(TURN_CARDS),
            Phase::River => self.deal_community(RIVER_CARDS),
            Phase::Playing => self.deal_blackjack_hands(),
            Phase::PreFlop | Phase::Betting | Phase::Spinning => {}
        }

        self.current_actor = self.first_actor();
        tracing::debug!(
            game_id = %self.id,
            round = self.round,
            phase = %self.phase,
            "phase advanced"
        );
    }

    fn deal_community(&mut self, count: usize) {
        let cards = self.deck.deal_multiple(count);
        self.community_cards.extend(cards);
    }

    fn deal_blackjack_hands(&mut self) {
        for seat in self.seats.iter_mut().filter(|s| s.can_act()) {
            let cards = self.deck.deal_multiple(2);
            seat.hands = vec![BlackjackHand::new(cards, seat.committed)];
            seat.active_hand = 0;
            seat.advance_hand();
        }
    }
}
