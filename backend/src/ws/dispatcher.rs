use crate::ws::messages::ServerMessage;
use crate::ws::registry::ConnectionRegistry;
use std::sync::Arc;

/// Fans events out to room members through their connection queues.
///
/// Callers hold the room lock while dispatching, so members of one room see
/// that room's events in the order they were produced. Delivery is
/// best-effort: members without a live connection are skipped.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Same event to every member. Returns how many were enqueued.
    pub async fn broadcast_to_room(&self, members: &[String], msg: &ServerMessage) -> usize {
        let delivered = self
            .registry
            .send_many(members, |_| msg.clone())
            .await;
        tracing::trace!(recipients = delivered, "room broadcast");
        delivered
    }

    /// One event per member, built for that member (hidden cards and the like).
    pub async fn broadcast_each<F>(&self, members: &[String], make: F) -> usize
    where
        F: FnMut(&str) -> ServerMessage,
    {
        self.registry.send_many(members, make).await
    }

    pub async fn notify_player(&self, participant_id: &str, msg: ServerMessage) -> bool {
        let delivered = self.registry.send_to(participant_id, msg).await;
        if !delivered {
            tracing::debug!(participant_id, "notification dropped, not connected");
        }
        delivered
    }
}
