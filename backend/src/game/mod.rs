pub mod action;
pub mod constants;
pub mod deck;
pub mod error;
pub mod hand;
pub mod player;
pub mod room;
pub mod rules;
pub mod state;
pub mod validator;

// Re-export commonly used items
pub use action::Action;
pub use deck::Card;
pub use error::{ErrorCategory, GameError, GameResult};
pub use room::{BetLimits, Room, RoomDetails, RoomFilter, RoomListing, RoomStatus, RoomSummary};
pub use rules::{ActionKind, GameType, Phase};
pub use state::{Game, GameEvent, GameOutcome, GameSnapshot, GameStatus, PlayerResult, Refund};
pub use validator::{is_legal, Legal};
