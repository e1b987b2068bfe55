use super::game_server::GameServer;
use crate::{
    audit,
    game::{Action, ActionKind, ErrorCategory, Room},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A seat held for a participant whose connection dropped mid-game.
#[derive(Debug, Clone)]
pub(super) struct DisconnectedPlayer {
    pub room_id: String,
    pub disconnected_at: Instant,
}

/// Whose turn it is in a room and when it started.
#[derive(Debug, Clone)]
pub(super) struct TurnClock {
    pub game_id: String,
    pub actor: String,
    pub since: Instant,
}

impl GameServer {
    pub(super) async fn mark_disconnected(&self, participant_id: &str, room_id: &str) {
        self.disconnected_players.write().await.insert(
            participant_id.to_string(),
            DisconnectedPlayer {
                room_id: room_id.to_string(),
                disconnected_at: Instant::now(),
            },
        );
        tracing::info!(
            participant_id,
            room_id,
            grace_secs = self.config.disconnect_grace.as_secs(),
            "Player disconnected, holding seat"
        );
    }

    pub(super) async fn clear_disconnected(&self, participant_id: &str) {
        self.disconnected_players.write().await.remove(participant_id);
    }

    pub(super) async fn take_disconnected(&self, participant_id: &str) -> Option<DisconnectedPlayer> {
        self.disconnected_players.write().await.remove(participant_id)
    }

    pub async fn is_held(&self, participant_id: &str) -> bool {
        self.disconnected_players
            .read()
            .await
            .contains_key(participant_id)
    }

    /// Restarts the room's turn clock for whoever is to act now, or stops it
    /// when nobody is. Caller holds the room lock.
    pub(super) async fn reset_turn_clock(&self, room: &Room) {
        let mut clocks = self.turn_clocks.lock().await;
        let actor = room
            .current_game()
            .and_then(|g| g.current_actor_id().map(|actor| (g.id.clone(), actor.to_string())));
        match actor {
            Some((game_id, actor)) => {
                clocks.insert(
                    room.id.clone(),
                    TurnClock {
                        game_id,
                        actor,
                        since: Instant::now(),
                    },
                );
            }
            None => {
                clocks.remove(&room.id);
            }
        }
    }

    /// Expires disconnect grace periods, idle turns and idle rooms. Called on
    /// an interval.
    ///
    /// Expired entries are collected first and the bookkeeping locks released
    /// before any room is locked.
    pub async fn check_timeouts(&self) {
        let now = Instant::now();

        let expired: Vec<(String, String)> = {
            let mut held = self.disconnected_players.write().await;
            let expired: Vec<(String, String)> = held
                .iter()
                .filter(|(_, info)| now.duration_since(info.disconnected_at) >= self.config.disconnect_grace)
                .map(|(pid, info)| (pid.clone(), info.room_id.clone()))
                .collect();
            for (pid, _) in &expired {
                held.remove(pid);
            }
            expired
        };
        for (participant_id, room_id) in expired {
            tracing::info!(
                participant_id = %participant_id,
                room_id = %room_id,
                "Disconnect grace period expired, releasing seat"
            );
            if let Err(e) = self.leave_room(&room_id, &participant_id).await {
                tracing::warn!(participant_id = %participant_id, error = %e, "Release after grace failed");
            }
        }

        let idle: Vec<(String, TurnClock)> = {
            let clocks = self.turn_clocks.lock().await;
            clocks
                .iter()
                .filter(|(_, clock)| now.duration_since(clock.since) >= self.config.turn_timeout)
                .map(|(room_id, clock)| (room_id.clone(), clock.clone()))
                .collect()
        };
        for (room_id, clock) in idle {
            self.expire_turn(&room_id, &clock).await;
        }

        self.close_idle_rooms().await;
    }

    /// Closes waiting rooms nobody has joined, left or played in for the
    /// configured idle timeout. A zero timeout keeps rooms open forever.
    async fn close_idle_rooms(&self) {
        let timeout = self.config.room_idle_timeout;
        if timeout.is_zero() {
            return;
        }
        let rooms: Vec<Arc<Mutex<Room>>> = self.rooms.read().await.values().cloned().collect();
        for room_arc in rooms {
            let mut room = room_arc.lock().await;
            if !room.is_idle(timeout) {
                continue;
            }
            tracing::info!(
                room_id = %room.id,
                idle_secs = room.idle_for().as_secs(),
                players = room.members.len(),
                "Room idle, closing"
            );
            self.close_room(&mut room, "Room closed for inactivity").await;
        }
    }

    async fn expire_turn(&self, room_id: &str, clock: &TurnClock) {
        let Ok(room_arc) = self.room(room_id).await else {
            self.turn_clocks.lock().await.remove(room_id);
            return;
        };
        let mut room = room_arc.lock().await;

        // The turn may have moved on between collecting and locking
        let action = room
            .current_game()
            .filter(|g| g.id == clock.game_id)
            .filter(|g| g.current_actor_id() == Some(clock.actor.as_str()))
            .and_then(|g| g.timeout_action());
        let Some(action) = action else {
            return;
        };

        tracing::info!(
            room_id,
            game_id = %action.game_id,
            player_id = %action.player_id,
            action = %action.kind,
            "Turn timed out"
        );
        audit::log_security_event(&action.player_id, "turn_timeout", &action.game_id);
        let Err(e) = self.apply_locked(&mut room, &action, true).await else {
            return;
        };
        if e.category() == ErrorCategory::Internal {
            return;
        }
        tracing::warn!(room_id, game_id = %action.game_id, error = %e, "Timeout action rejected, folding");
        let fold = Action::new(action.game_id.clone(), action.player_id.clone(), ActionKind::Fold);
        if action.kind == ActionKind::Fold || self.apply_locked(&mut room, &fold, true).await.is_err() {
            tracing::error!(room_id, game_id = %action.game_id, "Turn cannot be expired, closing room");
            self.close_room(&mut room, "Internal error").await;
        }
    }
}
