//! Structured audit logging for security-relevant events.
//!
//! Game actions, room lifecycle changes, settlements and connection events
//! are logged under the `audit` target so they can be routed separately.

/// Log a game action (bet, fold, hit, spin, etc.)
pub fn log_game_action(game_id: &str, user_id: &str, action: &str, chips: i64, automatic: bool) {
    tracing::info!(
        target: "audit",
        event = "game_action",
        game_id = game_id,
        user_id = user_id,
        action = action,
        chips = chips,
        automatic = automatic,
        "Game action: {} by {} in game {}",
        action,
        user_id,
        game_id
    );
}

/// Log a room lifecycle event (created, joined, left, closed, game started)
pub fn log_room_event(room_id: &str, user_id: &str, event: &str) {
    tracing::info!(
        target: "audit",
        event = "room",
        room_id = room_id,
        user_id = user_id,
        room_event = event,
        "Room {}: {} by {}",
        room_id,
        event,
        user_id
    );
}

/// Log a settlement attempt result
pub fn log_settlement(game_id: &str, attempt: u32, success: bool, details: &str) {
    if success {
        tracing::info!(
            target: "audit",
            event = "settlement",
            game_id = game_id,
            attempt = attempt,
            success = success,
            "Settlement of {} succeeded on attempt {}",
            game_id,
            attempt
        );
    } else {
        tracing::warn!(
            target: "audit",
            event = "settlement",
            game_id = game_id,
            attempt = attempt,
            success = success,
            details = details,
            "Settlement of {} failed on attempt {}: {}",
            game_id,
            attempt,
            details
        );
    }
}

/// Log a balance change confirmed by the ledger
pub fn log_balance_change(game_id: &str, user_id: &str, delta: i64, new_balance: i64) {
    tracing::info!(
        target: "audit",
        event = "balance_change",
        game_id = game_id,
        user_id = user_id,
        delta = delta,
        new_balance = new_balance,
        "Balance change: {} for user {} from game {}",
        delta,
        user_id,
        game_id
    );
}

/// Log a security event (rate limiting, duplicate connection, expired token, etc.)
pub fn log_security_event(user_id: &str, event: &str, details: &str) {
    tracing::warn!(
        target: "audit",
        event = "security",
        user_id = user_id,
        security_event = event,
        details = details,
        "Security: {} - {} - {}",
        event,
        user_id,
        details
    );
}
