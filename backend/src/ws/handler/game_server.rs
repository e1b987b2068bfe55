use crate::{
    audit,
    auth::JwtManager,
    config::{CoordinatorConfig, SettlementConfig},
    game::{
        constants::MAX_ID_LEN, ErrorCategory, GameError, GameOutcome, GameResult, Room,
    },
    ledger::{FailedSettlement, Ledger, SettlementQueue},
    ws::{
        dispatcher::BroadcastDispatcher,
        messages::ServerMessage,
        registry::{ConnectionHandle, ConnectionRegistry},
    },
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

use super::timeouts::{DisconnectedPlayer, TurnClock};

/// Owns every room and routes participants' requests to them.
///
/// Each room sits behind its own mutex, which is the single writer for that
/// room and its game. Lock order is room first, then the registry or any of
/// the bookkeeping maps below; a room lock is never requested while one of
/// those is held.
pub struct GameServer {
    pub(super) jwt_manager: Arc<JwtManager>,
    pub(super) config: CoordinatorConfig,
    pub(super) registry: Arc<ConnectionRegistry>,
    pub(super) dispatcher: BroadcastDispatcher,
    pub(super) rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    // game id -> room id
    pub(super) game_rooms: RwLock<HashMap<String, String>>,
    pub(super) settlements: Arc<SettlementQueue>,
    // Seats held for players who dropped mid-game
    pub(super) disconnected_players: RwLock<HashMap<String, DisconnectedPlayer>>,
    // room id -> whose turn it is and since when
    pub(super) turn_clocks: Mutex<HashMap<String, TurnClock>>,
    // participant id -> game id, for players who left a game still being played
    pub(super) seat_holds: RwLock<HashMap<String, String>>,
}

impl GameServer {
    pub fn new(
        jwt_manager: Arc<JwtManager>,
        ledger: Arc<dyn Ledger>,
        config: CoordinatorConfig,
        settlement: SettlementConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            jwt_manager,
            config,
            dispatcher: BroadcastDispatcher::new(registry.clone()),
            registry,
            rooms: RwLock::new(HashMap::new()),
            game_rooms: RwLock::new(HashMap::new()),
            settlements: Arc::new(SettlementQueue::new(ledger, settlement)),
            disconnected_players: RwLock::new(HashMap::new()),
            turn_clocks: Mutex::new(HashMap::new()),
            seat_holds: RwLock::new(HashMap::new()),
        }
    }

    pub fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn ledger(&self) -> &Arc<dyn Ledger> {
        self.settlements.ledger()
    }

    /// Registers a connection and, if the participant dropped out of a game
    /// inside the grace period, puts them back in their seat.
    pub async fn connect(
        &self,
        participant_id: &str,
        username: &str,
        handle: ConnectionHandle,
    ) -> GameResult<()> {
        validate_id(participant_id, "participant")?;
        if let Err(e) = self.registry.register(participant_id, username, handle).await {
            audit::log_security_event(participant_id, "duplicate_connection", &e.to_string());
            return Err(e);
        }

        let balance = match self.ledger().balance(participant_id).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!(participant_id, error = %e, "Ledger read failed on connect");
                self.registry.unregister(participant_id).await;
                return Err(e.into());
            }
        };
        self.registry.cache_balance(participant_id, balance).await;
        self.dispatcher
            .notify_player(
                participant_id,
                ServerMessage::Connected {
                    participant_id: participant_id.to_string(),
                    username: username.to_string(),
                    balance,
                },
            )
            .await;

        if let Some(held) = self.take_disconnected(participant_id).await {
            self.restore_seat(participant_id, &held.room_id).await;
        }
        Ok(())
    }

    /// Connection gone. A seat in a running game is held for the grace
    /// period; anything else is an immediate leave.
    pub async fn disconnect(&self, participant_id: &str) {
        let Some(participant) = self.registry.unregister(participant_id).await else {
            return;
        };
        let Some(room_id) = participant.room_id else {
            return;
        };

        let held = match self.room(&room_id).await {
            Ok(room_arc) => {
                let room = room_arc.lock().await;
                let seated = room
                    .current_game()
                    .is_some_and(|g| g.is_live_participant(participant_id));
                if seated {
                    self.mark_disconnected(participant_id, &room_id).await;
                    self.dispatcher
                        .broadcast_to_room(
                            &room.members,
                            &ServerMessage::PlayerDisconnected {
                                room_id: room_id.clone(),
                                participant_id: participant_id.to_string(),
                                grace_secs: self.config.disconnect_grace.as_secs(),
                            },
                        )
                        .await;
                }
                seated
            }
            Err(_) => false,
        };

        if !held {
            if let Err(e) = self.leave_room(&room_id, participant_id).await {
                tracing::warn!(participant_id, room_id = %room_id, error = %e, "Leave on disconnect failed");
            }
        }
    }

    async fn restore_seat(&self, participant_id: &str, room_id: &str) {
        let Ok(room_arc) = self.room(room_id).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if !room.is_member(participant_id) {
            return;
        }
        if let Some(game) = room.current_game_mut() {
            game.mark_present(participant_id);
        }
        self.registry
            .set_room(participant_id, Some(room_id.to_string()))
            .await;

        let others: Vec<String> = room
            .members
            .iter()
            .filter(|m| m.as_str() != participant_id)
            .cloned()
            .collect();
        self.dispatcher
            .broadcast_to_room(
                &others,
                &ServerMessage::PlayerReconnected {
                    room_id: room_id.to_string(),
                    participant_id: participant_id.to_string(),
                },
            )
            .await;
        self.dispatcher
            .notify_player(
                participant_id,
                ServerMessage::RoomJoined {
                    room: room.details(Some(participant_id)),
                },
            )
            .await;
        if let Some(game) = room.current_game() {
            self.dispatcher
                .notify_player(
                    participant_id,
                    ServerMessage::GameStateUpdate {
                        state: game.snapshot(Some(participant_id)),
                    },
                )
                .await;
        }
        tracing::info!(participant_id, room_id, "Player reconnected, seat restored");
        audit::log_room_event(room_id, participant_id, "reconnected");
    }

    /// Fresh balance from the ledger, cached in the registry.
    pub async fn balance(&self, participant_id: &str) -> GameResult<i64> {
        let balance = self.ledger().balance(participant_id).await?;
        self.registry.cache_balance(participant_id, balance).await;
        Ok(balance)
    }

    /// Ledger balance less losses from games whose settlement is still
    /// outstanding. This is what a participant may stake in a new room.
    pub async fn available_balance(&self, participant_id: &str) -> GameResult<i64> {
        let balance = self.balance(participant_id).await?;
        let held = self.settlements.unsettled_losses(participant_id).await;
        Ok((balance - held).max(0))
    }

    /// Fails with `AlreadyInRoom` while the participant sits in a room or
    /// still has a seat in a game they walked away from.
    pub(super) async fn ensure_unseated(&self, participant_id: &str) -> GameResult<()> {
        if self.registry.room_of(participant_id).await.is_some()
            || self.seat_holds.read().await.contains_key(participant_id)
        {
            return Err(GameError::AlreadyInRoom);
        }
        Ok(())
    }

    pub(super) async fn hold_seat(&self, participant_id: &str, game_id: &str) {
        self.seat_holds
            .write()
            .await
            .insert(participant_id.to_string(), game_id.to_string());
    }

    /// Frees everyone still bound to `game_id`
    pub(super) async fn release_seat_holds(&self, game_id: &str) {
        self.seat_holds
            .write()
            .await
            .retain(|_, held_game| held_game != game_id);
    }

    pub(super) async fn room(&self, room_id: &str) -> GameResult<Arc<Mutex<Room>>> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or(GameError::RoomNotFound)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Hands an outcome to the ledger in the background. Confirmed balances
    /// are cached and pushed to their owners. Until then the outcome's losses
    /// are held back from [`GameServer::available_balance`].
    pub(super) async fn spawn_settlement(&self, outcome: GameOutcome) {
        let queue = self.settlements.clone();
        let registry = self.registry.clone();
        queue.track(&outcome).await;
        tokio::spawn(async move {
            let Ok(changes) = queue.settle_with_retry(&outcome).await else {
                return;
            };
            for change in changes {
                audit::log_balance_change(
                    &outcome.game_id,
                    &change.participant_id,
                    change.delta,
                    change.balance,
                );
                registry
                    .cache_balance(&change.participant_id, change.balance)
                    .await;
                registry
                    .send_to(
                        &change.participant_id,
                        ServerMessage::BalanceUpdate {
                            balance: change.balance,
                            delta: Some(change.delta),
                            game_id: Some(outcome.game_id.clone()),
                        },
                    )
                    .await;
            }
            queue.release(&outcome.game_id).await;
        });
    }

    pub async fn failed_settlements(&self) -> Vec<FailedSettlement> {
        self.settlements.failed_settlements().await
    }

    /// Resubmits every parked settlement. Returns how many were requeued.
    pub async fn retry_failed_settlements(&self) -> usize {
        let outcomes = self.settlements.take_failed().await;
        let count = outcomes.len();
        for outcome in outcomes {
            tracing::info!(game_id = %outcome.game_id, "Requeueing failed settlement");
            self.spawn_settlement(outcome).await;
        }
        count
    }

    /// Single error reply for a rejected request. A room still cooling down
    /// answers with how long is left instead of a plain error.
    pub(super) fn rejection(participant_id: &str, err: &GameError) -> ServerMessage {
        if let GameError::Cooldown { remaining_secs } = err {
            return ServerMessage::CooldownNotification {
                message: err.to_string(),
                remaining_seconds: *remaining_secs,
            };
        }
        match err.category() {
            ErrorCategory::Internal | ErrorCategory::ExternalDependency => {
                tracing::error!(participant_id, error = %err, "Request failed");
            }
            _ => {
                tracing::debug!(participant_id, error = %err, "Request rejected");
            }
        }
        ServerMessage::error(err.to_string())
    }
}

pub(super) fn validate_id(id: &str, what: &str) -> GameResult<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(GameError::illegal(format!("Invalid {} ID", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_rejection_reports_remaining_time() {
        let reply = GameServer::rejection("p1", &GameError::Cooldown { remaining_secs: 7 });
        match reply {
            ServerMessage::CooldownNotification {
                message,
                remaining_seconds,
            } => {
                assert_eq!(remaining_seconds, 7);
                assert_eq!(message, "Next game can start in 7s");
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        let reply = GameServer::rejection("p1", &GameError::NotHost);
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }
}
