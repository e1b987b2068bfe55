use crate::game::constants::BLACKJACK;
use crate::game::deck::Card;
use rs_poker::core::{Hand, Rank as RsRank, Rankable};
use serde::{Deserialize, Serialize};

/// Strength of a five-card poker hand. Ordering is by category, then by
/// rs_poker's sub-rank inside the category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PokerRank {
    rank_value: u8,
    sub_rank: u32,
    pub description: &'static str,
}

impl PokerRank {
    fn from_hand(hand: &Hand) -> Self {
        let (rank_value, sub_rank, description) = match hand.rank() {
            RsRank::HighCard(v) => (0, v, "High Card"),
            RsRank::OnePair(v) => (1, v, "Pair"),
            RsRank::TwoPair(v) => (2, v, "Two Pair"),
            RsRank::ThreeOfAKind(v) => (3, v, "Three of a Kind"),
            RsRank::Straight(v) => (4, v, "Straight"),
            RsRank::Flush(v) => (5, v, "Flush"),
            RsRank::FullHouse(v) => (6, v, "Full House"),
            RsRank::FourOfAKind(v) => (7, v, "Four of a Kind"),
            RsRank::StraightFlush(v) => (8, v, "Straight Flush"),
        };
        Self {
            rank_value,
            sub_rank,
            description,
        }
    }
}

/// Best five-card hand out of hole and community cards.
/// `None` when fewer than five cards are available.
pub fn evaluate_poker(hole_cards: &[Card], community_cards: &[Card]) -> Option<PokerRank> {
    let all: Vec<Card> = hole_cards
        .iter()
        .chain(community_cards.iter())
        .copied()
        .collect();

    combinations(&all, 5)
        .into_iter()
        .map(|five| {
            let cards: Vec<rs_poker::core::Card> = five.iter().map(Card::to_rs_poker).collect();
            PokerRank::from_hand(&Hand::new_with_cards(cards))
        })
        .max()
}

fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k == 0 {
        return vec![vec![]];
    }
    if items.len() < k {
        return vec![];
    }
    let mut out = Vec::new();
    for (i, head) in items.iter().enumerate() {
        for mut tail in combinations(&items[i + 1..], k - 1) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

/// One blackjack hand. A seat holds several after splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackHand {
    pub cards: Vec<Card>,
    pub bet: i64,
    pub doubled: bool,
    pub finished: bool,
}

impl BlackjackHand {
    pub fn new(cards: Vec<Card>, bet: i64) -> Self {
        let mut hand = Self {
            cards,
            bet,
            doubled: false,
            finished: false,
        };
        hand.finish_if_done();
        hand
    }

    /// Best total, counting aces as 1 where 11 would bust.
    pub fn total(&self) -> u8 {
        let mut total: u16 = self.cards.iter().map(|c| c.blackjack_value() as u16).sum();
        let mut soft_aces = self.cards.iter().filter(|c| c.rank == 14).count();
        while total > BLACKJACK as u16 && soft_aces > 0 {
            total -= 10;
            soft_aces -= 1;
        }
        total.min(u8::MAX as u16) as u8
    }

    pub fn is_bust(&self) -> bool {
        self.total() > BLACKJACK
    }

    pub fn can_split(&self) -> bool {
        self.cards.len() == 2
            && !self.doubled
            && self.cards[0].blackjack_value() == self.cards[1].blackjack_value()
    }

    pub fn can_double(&self) -> bool {
        self.cards.len() == 2 && !self.doubled
    }

    pub fn add_card(&mut self, card: Card) {
        self.cards.push(card);
        self.finish_if_done();
    }

    fn finish_if_done(&mut self) {
        if self.total() >= BLACKJACK {
            self.finished = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_beats_high_card() {
        let board = [
            Card::new(2, 0),
            Card::new(7, 1),
            Card::new(9, 2),
            Card::new(11, 3),
            Card::new(4, 0),
        ];
        let pair = evaluate_poker(&[Card::new(9, 0), Card::new(3, 1)], &board).unwrap();
        let high = evaluate_poker(&[Card::new(14, 0), Card::new(13, 1)], &board).unwrap();
        assert_eq!(pair.description, "Pair");
        assert_eq!(high.description, "High Card");
        assert!(pair > high);
    }

    #[test]
    fn test_identical_strength_ties() {
        let board = [
            Card::new(10, 0),
            Card::new(11, 1),
            Card::new(12, 2),
            Card::new(13, 3),
            Card::new(14, 0),
        ];
        let a = evaluate_poker(&[Card::new(2, 1), Card::new(3, 2)], &board).unwrap();
        let b = evaluate_poker(&[Card::new(4, 3), Card::new(5, 1)], &board).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.description, "Straight");
    }

    #[test]
    fn test_too_few_cards() {
        assert!(evaluate_poker(&[Card::new(2, 0)], &[Card::new(3, 0)]).is_none());
    }

    #[test]
    fn test_soft_ace_total() {
        let hand = BlackjackHand::new(vec![Card::new(14, 0), Card::new(9, 1)], 10);
        assert_eq!(hand.total(), 20);
        let mut hand = hand;
        hand.add_card(Card::new(5, 2));
        assert_eq!(hand.total(), 15);
        assert!(!hand.is_bust());
    }

    #[test]
    fn test_twenty_one_finishes_hand() {
        let hand = BlackjackHand::new(vec![Card::new(14, 0), Card::new(13, 1)], 10);
        assert_eq!(hand.total(), 21);
        assert!(hand.finished);
    }

    #[test]
    fn test_bust_finishes_hand() {
        let mut hand = BlackjackHand::new(vec![Card::new(10, 0), Card::new(9, 1)], 10);
        hand.add_card(Card::new(5, 2));
        assert!(hand.is_bust());
        assert!(hand.finished);
    }

    #[test]
    fn test_split_requires_matching_values() {
        assert!(BlackjackHand::new(vec![Card::new(8, 0), Card::new(8, 1)], 10).can_split());
        assert!(BlackjackHand::new(vec![Card::new(13, 0), Card::new(10, 1)], 10).can_split());
        assert!(!BlackjackHand::new(vec![Card::new(8, 0), Card::new(9, 1)], 10).can_split());
    }
}
