use super::game_server::GameServer;
use crate::{
    audit,
    game::{
        Action, ErrorCategory, GameError, GameEvent, GameResult, GameSnapshot, GameStatus, Room,
    },
    ws::messages::ServerMessage,
};

impl GameServer {
    /// Routes an action to the game's room and applies it under the room lock.
    pub async fn apply_action(&self, action: Action) -> GameResult<()> {
        let room_id = self
            .game_rooms
            .read()
            .await
            .get(&action.game_id)
            .cloned()
            .ok_or(GameError::GameNotFound)?;
        let room_arc = self
            .room(&room_id)
            .await
            .map_err(|_| GameError::GameNotFound)?;
        let mut room = room_arc.lock().await;
        self.apply_locked(&mut room, &action, false).await
    }

    /// Caller holds the room lock. Rejections leave the game untouched.
    pub(super) async fn apply_locked(
        &self,
        room: &mut Room,
        action: &Action,
        automatic: bool,
    ) -> GameResult<()> {
        let game = room
            .game
            .as_mut()
            .filter(|g| g.id == action.game_id)
            .ok_or(GameError::GameNotFound)?;

        let events = match game.apply_action(action) {
            Ok(events) => events,
            Err(e) if e.category() == ErrorCategory::Internal => {
                self.close_room(room, "Internal error").await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let chips = events
            .iter()
            .find_map(|event| match event {
                GameEvent::ActionApplied { chips, .. } => Some(*chips),
                _ => None,
            })
            .unwrap_or(0);
        audit::log_game_action(
            &action.game_id,
            &action.player_id,
            &action.kind.to_string(),
            chips,
            automatic,
        );

        self.drive(room, events).await;
        Ok(())
    }

    /// Broadcasts `events`, then keeps applying folds for away seats until a
    /// present player is to act or the game is over.
    pub(super) async fn drive(&self, room: &mut Room, mut events: Vec<GameEvent>) {
        loop {
            self.dispatch_game_events(room, std::mem::take(&mut events))
                .await;

            let Some(game) = room.current_game_mut() else {
                break;
            };
            let Some(auto) = game.pending_auto_action() else {
                break;
            };
            match game.apply_action(&auto) {
                Ok(next) => {
                    audit::log_game_action(&auto.game_id, &auto.player_id, "fold", 0, true);
                    events = next;
                }
                Err(e) => {
                    tracing::error!(
                        room_id = %room.id,
                        game_id = %auto.game_id,
                        error = %e,
                        "Automatic fold rejected, closing room"
                    );
                    self.close_room(room, "Internal error").await;
                    return;
                }
            }
        }

        let completed = room
            .game
            .as_ref()
            .is_some_and(|g| g.status == GameStatus::Completed);
        if completed {
            self.complete_game(room).await;
        } else {
            self.reset_turn_clock(room).await;
        }
    }

    async fn dispatch_game_events(&self, room: &Room, events: Vec<GameEvent>) {
        let Some(game) = room.game.as_ref() else {
            return;
        };
        for event in events {
            match event {
                GameEvent::RoundStarted { round, phase } => {
                    self.dispatcher
                        .broadcast_to_room(
                            &room.members,
                            &ServerMessage::RoundStarted {
                                game_id: game.id.clone(),
                                round,
                                phase,
                            },
                        )
                        .await;
                }
                GameEvent::ActionApplied {
                    player_id,
                    kind,
                    chips,
                } => {
                    tracing::debug!(game_id = %game.id, player_id = %player_id, action = %kind, chips, "Action applied");
                }
                GameEvent::PlayerTurn {
                    player_id,
                    legal_actions,
                    to_call,
                } => {
                    self.dispatcher
                        .notify_player(
                            &player_id,
                            ServerMessage::PlayerTurn {
                                game_id: game.id.clone(),
                                player_id: player_id.clone(),
                                legal_actions,
                                to_call,
                                timeout_secs: self.config.turn_timeout.as_secs(),
                            },
                        )
                        .await;
                }
                GameEvent::StateChanged => {
                    self.dispatcher
                        .broadcast_each(&room.members, |member| ServerMessage::GameStateUpdate {
                            state: game.snapshot(Some(member)),
                        })
                        .await;
                }
                GameEvent::GameOver(outcome) => {
                    self.dispatcher
                        .broadcast_to_room(&room.members, &ServerMessage::GameOver { outcome })
                        .await;
                }
            }
        }
    }

    /// Records the outcome, releases seats held for players who never came
    /// back and queues the settlement. Starts the room's cooldown, if any.
    async fn complete_game(&self, room: &mut Room) {
        let Some(outcome) = room.finish_game() else {
            return;
        };
        room.start_cooldown(self.config.game_cooldown);
        self.turn_clocks.lock().await.remove(&room.id);

        let mut gone = Vec::new();
        for member in &room.members {
            if !self.registry.is_connected(member).await {
                gone.push(member.clone());
            }
        }
        for participant_id in gone {
            room.remove_member(&participant_id);
            self.clear_disconnected(&participant_id).await;
            self.dispatcher
                .broadcast_to_room(
                    &room.members,
                    &ServerMessage::PlayerLeft {
                        room_id: room.id.clone(),
                        participant_id,
                        player_count: room.members.len(),
                    },
                )
                .await;
        }

        // Losses are tracked as unsettled before leavers are let go
        let game_id = outcome.game_id.clone();
        self.spawn_settlement(outcome).await;
        self.release_seat_holds(&game_id).await;

        if room.is_empty() {
            self.close_room(room, "Room is empty").await;
        }
    }

    pub async fn game_state(&self, game_id: &str, viewer: Option<&str>) -> GameResult<GameSnapshot> {
        let room_id = self
            .game_rooms
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or(GameError::GameNotFound)?;
        let room_arc = self
            .room(&room_id)
            .await
            .map_err(|_| GameError::GameNotFound)?;
        let room = room_arc.lock().await;
        room.game
            .as_ref()
            .filter(|g| g.id == game_id)
            .map(|g| g.snapshot(viewer))
            .ok_or(GameError::GameNotFound)
    }
}
