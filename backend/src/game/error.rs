//! Game-related error types
//!
//! Every rejection a participant can see is a variant here, so the message
//! router can turn it into a single targeted `error` event.

use serde::Serialize;
use thiserror::Error;

/// Broad classes of failure, used for logging and for deciding who hears about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Protocol,
    ResourceExhaustion,
    ExternalDependency,
    Internal,
}

/// Errors that can occur during room and game operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    // Configuration errors
    #[error("Invalid room configuration: {reason}")]
    InvalidConfiguration { reason: String },
    #[error("This room requires a bet of exactly {required}, got {attempted}")]
    BetMismatch { required: i64, attempted: i64 },

    // Room errors
    #[error("Room not found")]
    RoomNotFound,
    #[error("Game not found")]
    GameNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Room is closed")]
    RoomClosed,
    #[error("You are not in this room")]
    NotInRoom,
    #[error("You are already in a room")]
    AlreadyInRoom,
    #[error("Only the room host can do that")]
    NotHost,
    #[error("Next game can start in {remaining_secs}s")]
    Cooldown { remaining_secs: u64 },

    // Connection errors
    #[error("Already connected from another session")]
    DuplicateConnection,
    #[error("Participant not connected: {participant_id}")]
    NotFound { participant_id: String },

    // Action errors
    #[error("Not your turn")]
    NotCurrentActor,
    #[error("Illegal action: {reason}")]
    IllegalAction { reason: String },
    #[error("Bet {attempted} out of bounds (min {min}, max {max})")]
    BetOutOfBounds { min: i64, max: i64, attempted: i64 },
    #[error("Insufficient balance. Required: {required}, Available: {available}")]
    InsufficientBalance { required: i64, available: i64 },
    #[error("Game is not in progress")]
    GameNotInProgress,

    // External collaborators
    #[error("Ledger unavailable: {0}")]
    Ledger(String),

    // Invariant violations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn illegal(reason: impl Into<String>) -> Self {
        GameError::IllegalAction {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        GameError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GameError::InvalidConfiguration { .. } | GameError::BetMismatch { .. } => {
                ErrorCategory::Configuration
            }
            GameError::RoomFull => ErrorCategory::ResourceExhaustion,
            GameError::Ledger(_) => ErrorCategory::ExternalDependency,
            GameError::Internal(_) => ErrorCategory::Internal,
            _ => ErrorCategory::Protocol,
        }
    }
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GameError::BetOutOfBounds {
            min: 10,
            max: 100,
            attempted: 5,
        };
        assert_eq!(err.to_string(), "Bet 5 out of bounds (min 10, max 100)");
        assert_eq!(GameError::NotCurrentActor.to_string(), "Not your turn");
        assert_eq!(GameError::RoomFull.to_string(), "Room is full");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            GameError::invalid_config("bad").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(GameError::RoomFull.category(), ErrorCategory::ResourceExhaustion);
        assert_eq!(GameError::NotCurrentActor.category(), ErrorCategory::Protocol);
        assert_eq!(
            GameError::Ledger("down".into()).category(),
            ErrorCategory::ExternalDependency
        );
    }
}
