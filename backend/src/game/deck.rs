use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

// Rank 2-14 (Jack=11, Queen=12, King=13, Ace=14), suit 0-3 (Clubs, Diamonds, Hearts, Spades)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: u8,
    pub suit: u8,
}

impl Card {
    pub fn new(rank: u8, suit: u8) -> Self {
        Self { rank, suit }
    }

    fn suit_char(suit: u8) -> char {
        match suit {
            0 => '♣',
            1 => '♦',
            2 => '♥',
            3 => '♠',
            _ => '?',
        }
    }

    /// Blackjack pip value; aces count 11 here and are softened by the hand total.
    pub fn blackjack_value(&self) -> u8 {
        match self.rank {
            14 => 11,
            11..=13 => 10,
            n => n,
        }
    }

    pub fn to_rs_poker(&self) -> rs_poker::core::Card {
        use rs_poker::core::{Suit, Value};

        let value = match self.rank {
            2 => Value::Two,
            3 => Value::Three,
            4 => Value::Four,
            5 => Value::Five,
            6 => Value::Six,
            7 => Value::Seven,
            8 => Value::Eight,
            9 => Value::Nine,
            10 => Value::Ten,
            11 => Value::Jack,
            12 => Value::Queen,
            13 => Value::King,
            _ => Value::Ace,
        };

        let suit = match self.suit {
            0 => Suit::Club,
            1 => Suit::Diamond,
            2 => Suit::Heart,
            _ => Suit::Spade,
        };

        rs_poker::core::Card { value, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self.rank {
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            14 => "A".to_string(),
            n => n.to_string(),
        };
        write!(f, "{}{}", rank, Self::suit_char(self.suit))
    }
}

/// A shuffled 52-card shoe plus the RNG that shuffled it.
///
/// The RNG is kept so the same stream also drives roulette spins, which lets
/// tests seed a whole game deterministically.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    rng: ChaCha20Rng,
}

impl Deck {
    /// Fresh deck shuffled from OS entropy
    pub fn shuffled() -> Self {
        Self::with_rng(ChaCha20Rng::from_entropy())
    }

    /// Deterministic deck for replays and tests
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: ChaCha20Rng) -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in 0..4 {
            for rank in 2..=14 {
                cards.push(Card::new(rank, suit));
            }
        }
        cards.shuffle(&mut rng);
        Self { cards, rng }
    }

    /// Deals a single card, reshuffling a fresh shoe if this one ran dry
    pub fn deal(&mut self) -> Card {
        loop {
            if let Some(card) = self.cards.pop() {
                return card;
            }
            let seed = self.rng.gen::<u64>();
            *self = Self::with_rng(ChaCha20Rng::seed_from_u64(seed));
        }
    }

    pub fn deal_multiple(&mut self, count: usize) -> Vec<Card> {
        (0..count).map(|_| self.deal()).collect()
    }

    /// Uniform draw in `0..pockets`
    pub fn spin(&mut self, pockets: u8) -> u8 {
        self.rng.gen_range(0..pockets)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    /// Deals `cards` in the order given, then falls back to seeded shoes
    #[cfg(test)]
    pub(crate) fn stacked(mut cards: Vec<Card>) -> Self {
        cards.reverse();
        Self {
            cards,
            rng: ChaCha20Rng::seed_from_u64(0),
        }
    }
}
