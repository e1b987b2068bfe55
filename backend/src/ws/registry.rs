//! Live connections, one per authenticated participant.

use crate::game::constants::OUTBOUND_QUEUE_CAPACITY;
use crate::game::{GameError, GameResult};
use crate::ws::messages::ServerMessage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

/// Outbound side of one socket. Everything sent through it is written by the
/// connection's own task, in enqueue order. The queue is bounded; a client
/// that stops reading gets its connection closed instead of growing it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: String,
    tx: mpsc::Sender<ServerMessage>,
    overflow: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, mpsc::Receiver<ServerMessage>) {
        Self::with_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            connection_id: Uuid::new_v4().to_string(),
            tx,
            overflow: Arc::new(Notify::new()),
        };
        (handle, rx)
    }

    /// Never waits. False once the socket task has gone away, or when the
    /// queue is full, in which case the socket task is told to hang up.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    "Outbound queue full, closing slow connection"
                );
                self.overflow.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Fires once the outbound queue has overflowed
    pub fn overflow_signal(&self) -> Arc<Notify> {
        self.overflow.clone()
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub username: String,
    /// Last balance read from the ledger or confirmed by a settlement
    pub balance: Option<i64>,
    pub room_id: Option<String>,
    pub handle: ConnectionHandle,
    pub connected_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    participants: RwLock<HashMap<String, Participant>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a second live connection; the existing one is left alone.
    pub async fn register(
        &self,
        participant_id: &str,
        username: &str,
        handle: ConnectionHandle,
    ) -> GameResult<()> {
        let mut participants = self.participants.write().await;
        if participants.contains_key(participant_id) {
            return Err(GameError::DuplicateConnection);
        }
        participants.insert(
            participant_id.to_string(),
            Participant {
                id: participant_id.to_string(),
                username: username.to_string(),
                balance: None,
                room_id: None,
                handle,
                connected_at: Utc::now(),
            },
        );
        tracing::debug!(participant_id, "connection registered");
        Ok(())
    }

    pub async fn unregister(&self, participant_id: &str) -> Option<Participant> {
        let removed = self.participants.write().await.remove(participant_id);
        if removed.is_some() {
            tracing::debug!(participant_id, "connection unregistered");
        }
        removed
    }

    pub async fn lookup(&self, participant_id: &str) -> GameResult<ConnectionHandle> {
        self.participants
            .read()
            .await
            .get(participant_id)
            .map(|p| p.handle.clone())
            .ok_or_else(|| GameError::NotFound {
                participant_id: participant_id.to_string(),
            })
    }

    pub async fn participant(&self, participant_id: &str) -> Option<Participant> {
        self.participants.read().await.get(participant_id).cloned()
    }

    pub async fn is_connected(&self, participant_id: &str) -> bool {
        self.participants.read().await.contains_key(participant_id)
    }

    pub async fn set_room(&self, participant_id: &str, room_id: Option<String>) {
        if let Some(p) = self.participants.write().await.get_mut(participant_id) {
            p.room_id = room_id;
        }
    }

    pub async fn room_of(&self, participant_id: &str) -> Option<String> {
        self.participants
            .read()
            .await
            .get(participant_id)
            .and_then(|p| p.room_id.clone())
    }

    pub async fn cache_balance(&self, participant_id: &str, balance: i64) {
        if let Some(p) = self.participants.write().await.get_mut(participant_id) {
            p.balance = Some(balance);
        }
    }

    pub async fn cached_balance(&self, participant_id: &str) -> Option<i64> {
        self.participants
            .read()
            .await
            .get(participant_id)
            .and_then(|p| p.balance)
    }

    pub async fn username(&self, participant_id: &str) -> Option<String> {
        self.participants
            .read()
            .await
            .get(participant_id)
            .map(|p| p.username.clone())
    }

    /// Enqueues `msg` for one participant. False if they are not connected.
    pub async fn send_to(&self, participant_id: &str, msg: ServerMessage) -> bool {
        match self.participants.read().await.get(participant_id) {
            Some(p) => p.handle.send(msg),
            None => false,
        }
    }

    /// Enqueues one message per listed participant under a single read lock.
    pub async fn send_many<F>(&self, participant_ids: &[String], mut make: F) -> usize
    where
        F: FnMut(&str) -> ServerMessage,
    {
        let participants = self.participants.read().await;
        participant_ids
            .iter()
            .filter_map(|id| participants.get(id))
            .filter(|p| p.handle.send(make(&p.id)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_duplicate_connection_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_rx) = ConnectionHandle::new();
        let (second, _second_rx) = ConnectionHandle::new();

        registry.register("p1", "alice", first.clone()).await.unwrap();
        assert_eq!(
            registry.register("p1", "alice", second).await,
            Err(GameError::DuplicateConnection)
        );

        let handle = registry.lookup("p1").await.unwrap();
        assert_eq!(handle.connection_id, first.connection_id);
        assert!(registry.send_to("p1", ServerMessage::Pong).await);
        assert!(matches!(first_rx.recv().await, Some(ServerMessage::Pong)));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::new();
        registry.register("p1", "alice", handle).await.unwrap();

        assert!(registry.unregister("p1").await.is_some());
        assert!(registry.unregister("p1").await.is_none());
        assert!(matches!(
            registry.lookup("p1").await,
            Err(GameError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_full_queue_signals_overflow() {
        let (handle, mut rx) = ConnectionHandle::with_capacity(2);
        let overflow = handle.overflow_signal();

        assert!(handle.send(ServerMessage::Pong));
        assert!(handle.send(ServerMessage::Pong));
        assert!(!handle.send(ServerMessage::Pong));
        tokio::time::timeout(Duration::from_millis(50), overflow.notified())
            .await
            .expect("overflow should be signalled");

        assert!(matches!(rx.recv().await, Some(ServerMessage::Pong)));
        assert!(handle.send(ServerMessage::Pong));

        drop(rx);
        assert!(!handle.send(ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_room_and_balance_cache() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = ConnectionHandle::new();
        registry.register("p1", "alice", handle).await.unwrap();

        registry.set_room("p1", Some("r1".into())).await;
        registry.cache_balance("p1", 250).await;
        assert_eq!(registry.room_of("p1").await.as_deref(), Some("r1"));
        assert_eq!(registry.cached_balance("p1").await, Some(250));
        assert_eq!(registry.room_of("ghost").await, None);
    }
}
