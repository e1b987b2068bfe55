use super::game_server::{validate_id, GameServer};
use crate::{
    audit,
    game::{
        GameError, GameResult, GameType, Room, RoomDetails, RoomFilter, RoomListing,
    },
    ws::messages::ServerMessage,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

impl GameServer {
    /// Creates a waiting room with the host seated first.
    pub async fn create_room(
        &self,
        host_id: &str,
        game_type: GameType,
        bet_amount: i64,
        max_players: usize,
        max_bet: Option<i64>,
        name: Option<String>,
    ) -> GameResult<String> {
        validate_id(host_id, "participant")?;
        self.ensure_unseated(host_id).await?;

        let room_id = Uuid::new_v4().to_string();
        let room = Room::new(
            room_id.clone(),
            host_id.to_string(),
            game_type,
            bet_amount,
            max_players,
            max_bet,
            name,
        )?;

        let balance = self.available_balance(host_id).await?;
        if balance < room.limits.min_bet {
            return Err(GameError::InsufficientBalance {
                required: room.limits.min_bet,
                available: balance,
            });
        }

        let details = room.details(Some(host_id));
        self.rooms
            .write()
            .await
            .insert(room_id.clone(), Arc::new(Mutex::new(room)));
        self.registry
            .set_room(host_id, Some(room_id.clone()))
            .await;

        tracing::info!(
            room_id = %room_id,
            host_id,
            game_type = %game_type,
            bet_amount,
            max_players,
            "Room created"
        );
        audit::log_room_event(&room_id, host_id, "created");
        self.dispatcher
            .notify_player(host_id, ServerMessage::RoomCreated { room: details })
            .await;
        Ok(room_id)
    }

    /// Adds a participant to a room. When that brings a waiting room up to
    /// its game type's minimum, the game starts under the same lock.
    pub async fn join_room(
        &self,
        room_id: &str,
        participant_id: &str,
        bet_amount: Option<i64>,
    ) -> GameResult<()> {
        validate_id(room_id, "room")?;
        self.ensure_unseated(participant_id).await?;
        // Ledger read happens before the room lock is taken
        let balance = self.available_balance(participant_id).await?;
        let username = self
            .registry
            .username(participant_id)
            .await
            .unwrap_or_else(|| participant_id.to_string());

        let room_arc = self.room(room_id).await?;
        let mut room = room_arc.lock().await;
        room.check_join(participant_id, bet_amount)?;
        if balance < room.limits.min_bet {
            return Err(GameError::InsufficientBalance {
                required: room.limits.min_bet,
                available: balance,
            });
        }

        // Existing members hear about the newcomer before the newcomer is added
        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::PlayerJoined {
                    room_id: room_id.to_string(),
                    participant_id: participant_id.to_string(),
                    username,
                    player_count: room.members.len() + 1,
                },
            )
            .await;
        room.add_member(participant_id, bet_amount)?;
        self.registry
            .set_room(participant_id, Some(room_id.to_string()))
            .await;

        tracing::info!(room_id, participant_id, players = room.members.len(), "Player joined room");
        audit::log_room_event(room_id, participant_id, "joined");
        self.dispatcher
            .notify_player(
                participant_id,
                ServerMessage::RoomJoined {
                    room: room.details(Some(participant_id)),
                },
            )
            .await;

        if room.ready_to_start() {
            if let Err(e) = self.begin_game(&mut room).await {
                tracing::error!(room_id, error = %e, "Failed to start game after join");
            }
        }
        Ok(())
    }

    /// Takes a participant out of a room. Calling it again is a no-op.
    ///
    /// A seat in a running game stays in the game marked away, so it folds
    /// through the normal action path when its turn comes up. Until that game
    /// ends the leaver cannot sit down anywhere else.
    pub async fn leave_room(&self, room_id: &str, participant_id: &str) -> GameResult<()> {
        let room_arc = match self.room(room_id).await {
            Ok(room_arc) => room_arc,
            Err(_) => {
                self.clear_room_ref(participant_id, room_id).await;
                return Ok(());
            }
        };
        let mut room = room_arc.lock().await;
        if !room.is_member(participant_id) {
            self.clear_room_ref(participant_id, room_id).await;
            return Ok(());
        }

        self.clear_disconnected(participant_id).await;
        let seated_in = room
            .current_game()
            .filter(|game| game.seat_index(participant_id).is_some())
            .map(|game| game.id.clone());
        if let Some(game_id) = &seated_in {
            self.hold_seat(participant_id, game_id).await;
        }
        room.remove_member(participant_id);
        self.clear_room_ref(participant_id, room_id).await;

        tracing::info!(room_id, participant_id, players = room.members.len(), "Player left room");
        audit::log_room_event(room_id, participant_id, "left");
        self.dispatcher
            .notify_player(
                participant_id,
                ServerMessage::RoomLeft {
                    room_id: room_id.to_string(),
                },
            )
            .await;
        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::PlayerLeft {
                    room_id: room_id.to_string(),
                    participant_id: participant_id.to_string(),
                    player_count: room.members.len(),
                },
            )
            .await;

        let marked = room
            .current_game_mut()
            .is_some_and(|game| game.is_live_participant(participant_id) && game.mark_away(participant_id));
        if marked {
            self.drive(&mut room, Vec::new()).await;
        }

        if room.is_empty() {
            self.close_room(&mut room, "Room is empty").await;
        }
        Ok(())
    }

    /// Joinable rooms right now, filtered as the listing is iterated.
    pub async fn list_available_rooms(&self, filter: RoomFilter) -> RoomListing {
        let rooms: Vec<Arc<Mutex<Room>>> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(room.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        RoomListing::new(summaries, filter)
    }

    pub async fn room_status(
        &self,
        room_id: &str,
        viewer: Option<&str>,
    ) -> GameResult<RoomDetails> {
        validate_id(room_id, "room")?;
        let room_arc = self.room(room_id).await?;
        let room = room_arc.lock().await;
        Ok(room.details(viewer))
    }

    /// Host-only: starts the next game once the previous one has finished.
    pub async fn start_game(&self, room_id: &str, participant_id: &str) -> GameResult<()> {
        validate_id(room_id, "room")?;
        let room_arc = self.room(room_id).await?;
        let mut room = room_arc.lock().await;
        if !room.is_member(participant_id) {
            return Err(GameError::NotInRoom);
        }
        if room.host_id != participant_id {
            return Err(GameError::NotHost);
        }
        if room.current_game().is_some() {
            return Err(GameError::illegal("A game is already in progress"));
        }
        self.begin_game(&mut room).await
    }

    /// Host-only: calls off the running game. Nothing is settled, so every
    /// seat keeps what it had committed.
    pub async fn cancel_game(&self, room_id: &str, participant_id: &str) -> GameResult<()> {
        validate_id(room_id, "room")?;
        let room_arc = self.room(room_id).await?;
        let mut room = room_arc.lock().await;
        if !room.is_member(participant_id) {
            return Err(GameError::NotInRoom);
        }
        if room.host_id != participant_id {
            return Err(GameError::NotHost);
        }
        let (game_id, refunds) = room.cancel_game()?;
        self.turn_clocks.lock().await.remove(room_id);
        self.release_seat_holds(&game_id).await;

        tracing::info!(room_id, game_id = %game_id, refunds = refunds.len(), "Game cancelled");
        audit::log_room_event(room_id, participant_id, "game_cancelled");
        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::GameCancelled {
                    room_id: room_id.to_string(),
                    game_id,
                    refunds,
                },
            )
            .await;
        Ok(())
    }

    /// Creates and starts a game for every current member, in join order.
    /// Caller holds the room lock.
    pub(super) async fn begin_game(&self, room: &mut Room) -> GameResult<()> {
        let mut balances = HashMap::with_capacity(room.members.len());
        for member in &room.members {
            let balance = match self.registry.cached_balance(member).await {
                Some(balance) => balance,
                None => self.balance(member).await?,
            };
            let held = self.settlements.unsettled_losses(member).await;
            balances.insert(member.clone(), (balance - held).max(0));
        }

        let previous_game = room.game.as_ref().map(|g| g.id.clone());
        let game_id = Uuid::new_v4().to_string();
        let events = room.start_game(game_id.clone(), &balances)?;

        {
            let mut index = self.game_rooms.write().await;
            if let Some(previous) = previous_game {
                index.remove(&previous);
            }
            index.insert(game_id.clone(), room.id.clone());
        }

        tracing::info!(
            room_id = %room.id,
            game_id = %game_id,
            game_type = %room.game_type,
            players = room.members.len(),
            "Game started"
        );
        audit::log_room_event(&room.id, &room.host_id, "game_started");

        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::RoomReady {
                    room_id: room.id.clone(),
                    game_id: game_id.clone(),
                },
            )
            .await;
        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::GameStarted {
                    room_id: room.id.clone(),
                    game_id,
                    game_type: room.game_type,
                    players: room.members.clone(),
                },
            )
            .await;

        self.drive(room, events).await;
        Ok(())
    }

    /// Closes a room, tells whoever is left and drops it from the index.
    pub(super) async fn close_room(&self, room: &mut Room, reason: &str) {
        room.close();
        self.dispatcher
            .broadcast_to_room(
                &room.members,
                &ServerMessage::RoomClosed {
                    room_id: room.id.clone(),
                    reason: reason.to_string(),
                },
            )
            .await;
        for member in &room.members {
            self.clear_room_ref(member, &room.id).await;
        }

        self.rooms.write().await.remove(&room.id);
        if let Some(game) = &room.game {
            self.game_rooms.write().await.remove(&game.id);
            self.release_seat_holds(&game.id).await;
        }
        self.turn_clocks.lock().await.remove(&room.id);

        tracing::info!(room_id = %room.id, reason, "Room closed");
        audit::log_room_event(&room.id, &room.host_id, "closed");
    }

    async fn clear_room_ref(&self, participant_id: &str, room_id: &str) {
        if self.registry.room_of(participant_id).await.as_deref() == Some(room_id) {
            self.registry.set_room(participant_id, None).await;
        }
    }
}
