use crate::game::{Action, GameResult, RoomFilter};
use crate::ws::messages::{ClientMessage, ServerMessage};

use super::game_server::{validate_id, GameServer};

/// Runs one client request as `participant_id`.
///
/// Returns the direct reply, if any. Successful room and game operations
/// answer through events queued on the participant's connection instead; a
/// rejection is always a single `error` to the submitter.
pub(super) async fn handle_client_message(
    msg: ClientMessage,
    participant_id: &str,
    game_server: &GameServer,
) -> Option<ServerMessage> {
    match route(msg, participant_id, game_server).await {
        Ok(reply) => reply,
        Err(e) => Some(GameServer::rejection(participant_id, &e)),
    }
}

async fn route(
    msg: ClientMessage,
    participant_id: &str,
    game_server: &GameServer,
) -> GameResult<Option<ServerMessage>> {
    match msg {
        ClientMessage::CreateRoom {
            game_type,
            bet_amount,
            max_players,
            max_bet,
            name,
        } => {
            game_server
                .create_room(participant_id, game_type, bet_amount, max_players, max_bet, name)
                .await?;
            Ok(None)
        }

        ClientMessage::JoinRoom {
            room_id,
            bet_amount,
        } => {
            game_server
                .join_room(&room_id, participant_id, bet_amount)
                .await?;
            Ok(None)
        }

        ClientMessage::LeaveRoom { room_id } => {
            validate_id(&room_id, "room")?;
            game_server.leave_room(&room_id, participant_id).await?;
            Ok(None)
        }

        ClientMessage::GetAvailableRooms {
            game_type,
            min_bet,
            max_bet,
        } => {
            let listing = game_server
                .list_available_rooms(RoomFilter {
                    game_type,
                    min_bet,
                    max_bet,
                })
                .await;
            Ok(Some(ServerMessage::AvailableRooms {
                rooms: listing.to_vec(),
            }))
        }

        ClientMessage::GetRoomStatus { room_id } => {
            let room = game_server
                .room_status(&room_id, Some(participant_id))
                .await?;
            Ok(Some(ServerMessage::RoomStatus { room }))
        }

        ClientMessage::StartGame { room_id } => {
            game_server.start_game(&room_id, participant_id).await?;
            Ok(None)
        }

        ClientMessage::CancelGame { room_id } => {
            game_server.cancel_game(&room_id, participant_id).await?;
            Ok(None)
        }

        ClientMessage::GetGameState { game_id } => {
            validate_id(&game_id, "game")?;
            let state = game_server
                .game_state(&game_id, Some(participant_id))
                .await?;
            Ok(Some(ServerMessage::GameStateUpdate { state }))
        }

        ClientMessage::GameAction {
            game_id,
            action,
            amount,
            number,
        } => {
            validate_id(&game_id, "game")?;
            // The actor is always the authenticated participant
            let mut submitted = Action::new(game_id, participant_id, action);
            submitted.amount = amount;
            submitted.number = number;
            game_server.apply_action(submitted).await?;
            Ok(None)
        }

        ClientMessage::GetBalance => {
            let balance = game_server.balance(participant_id).await?;
            Ok(Some(ServerMessage::BalanceUpdate {
                balance,
                delta: None,
                game_id: None,
            }))
        }

        ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),
    }
}
