//! Game-related constants and default configuration values
//!
//! Centralizing these values keeps the rule tables, the room manager and the
//! configuration defaults in agreement.

/// Minimum players required before a room turns into a game
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Supported room capacity range (inclusive)
pub const MIN_ROOM_CAPACITY: usize = 2;
pub const MAX_ROOM_CAPACITY: usize = 8;

/// Balance granted by the reference ledger to a participant it has never seen
pub const DEFAULT_STARTING_BALANCE: i64 = 10_000;

/// Timing defaults (seconds), overridable through the environment
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DISCONNECT_GRACE_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_CHECK_INTERVAL_MS: u64 = 250;
/// Messages a connection may have queued before it is dropped as too slow
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// Waiting rooms with no joins, leaves or games for this long are closed
pub const DEFAULT_ROOM_IDLE_TIMEOUT_SECS: u64 = 600;
/// Pause between one game ending and the next starting in the same room (0 = none)
pub const DEFAULT_GAME_COOLDOWN_SECS: u64 = 0;

/// Settlement retry defaults
pub const DEFAULT_SETTLEMENT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_SETTLEMENT_BACKOFF_MS: u64 = 200;
pub const DEFAULT_SETTLEMENT_MAX_BACKOFF_MS: u64 = 10_000;

/// Poker dealing
pub const HOLE_CARDS: usize = 2;
pub const FLOP_CARDS: usize = 3;
pub const TURN_CARDS: usize = 1;
pub const RIVER_CARDS: usize = 1;

/// Blackjack
pub const BLACKJACK: u8 = 21;
pub const MAX_SPLIT_HANDS: usize = 4;

/// Roulette wheel pockets (single zero)
pub const ROULETTE_POCKETS: u8 = 37;

/// Input limits for identifiers and room names
pub const MAX_ID_LEN: usize = 128;
pub const MAX_ROOM_NAME_LEN: usize = 64;
