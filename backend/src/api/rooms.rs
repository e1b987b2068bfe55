use crate::{
    error::{AppError, Result},
    game::{GameType, RoomDetails, RoomFilter, RoomSummary},
    ws::GameServer,
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct RoomsAppState {
    pub game_server: Arc<GameServer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomListQuery {
    pub game_type: Option<GameType>,
    pub min_bet: Option<i64>,
    pub max_bet: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

pub fn router() -> Router<Arc<RoomsAppState>> {
    Router::new()
        .route("/", get(list_rooms))
        .route("/:room_id", get(get_room))
}

async fn list_rooms(
    State(state): State<Arc<RoomsAppState>>,
    Query(query): Query<RoomListQuery>,
) -> Result<Json<RoomListResponse>> {
    if let (Some(min), Some(max)) = (query.min_bet, query.max_bet) {
        if min > max {
            return Err(AppError::BadRequest(
                "min_bet must not exceed max_bet".to_string(),
            ));
        }
    }

    let listing = state
        .game_server
        .list_available_rooms(RoomFilter {
            game_type: query.game_type,
            min_bet: query.min_bet,
            max_bet: query.max_bet,
        })
        .await;
    Ok(Json(RoomListResponse {
        rooms: listing.to_vec(),
    }))
}

/// Room details. With a bearer token, the caller's own cards are included.
async fn get_room(
    State(state): State<Arc<RoomsAppState>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RoomDetails>> {
    let viewer = match headers.get("authorization").and_then(|h| h.to_str().ok()) {
        Some(header) => {
            let token = header
                .strip_prefix("Bearer ")
                .ok_or(AppError::Unauthorized)?;
            Some(state.game_server.jwt_manager().verify_token(token)?.sub)
        }
        None => None,
    };

    let details = state
        .game_server
        .room_status(&room_id, viewer.as_deref())
        .await?;
    Ok(Json(details))
}
