mod game_ops;
mod game_server;
mod message_router;
mod room_ops;
mod timeouts;

pub use game_server::GameServer;

use crate::ws::{
    messages::{ClientMessage, ServerMessage},
    rate_limit::RateLimiter,
    registry::ConnectionHandle,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

use message_router::handle_client_message;

/// Largest inbound frame accepted
const MAX_MESSAGE_SIZE: usize = 8 * 1024;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(40);
const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(game_server): State<Arc<GameServer>>,
) -> Response {
    // Identity comes from the token only
    let claims = match game_server.jwt_manager().verify_token(&query.token) {
        Ok(claims) => claims,
        Err(e) => {
            crate::audit::log_security_event("anonymous", "ws_auth_failed", &e.to_string());
            return (axum::http::StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let token_expires_at = DateTime::from_timestamp(claims.exp as i64, 0)
        .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

    ws.max_message_size(MAX_MESSAGE_SIZE).on_upgrade(move |socket| {
        handle_socket(
            socket,
            claims.sub,
            claims.username,
            game_server,
            token_expires_at,
        )
    })
}

async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server message");
            true
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    participant_id: String,
    username: String,
    game_server: Arc<GameServer>,
    token_expires_at: DateTime<Utc>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::new();
    let overflow = handle.overflow_signal();

    if let Err(e) = game_server.connect(&participant_id, &username, handle).await {
        let _ = send_message(&mut sender, &ServerMessage::error(e.to_string())).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    }
    tracing::info!(participant_id = %participant_id, username = %username, "WebSocket connected");

    let mut rate_limiter = RateLimiter::default();
    let mut token_check_interval =
        tokio::time::interval_at(Instant::now() + TOKEN_CHECK_INTERVAL, TOKEN_CHECK_INTERVAL);
    let mut ping_interval = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            // Queued events go out before the next request is read, so
            // replies never overtake them
            biased;

            _ = overflow.notified() => {
                tracing::warn!(participant_id = %participant_id, "Client not keeping up, closing connection");
                break;
            }

            queued = outbound.recv() => {
                match queued {
                    Some(msg) => {
                        if !send_message(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !rate_limiter.allow() {
                            let err = ServerMessage::error("Rate limited: too many messages");
                            if !send_message(&mut sender, &err).await {
                                break;
                            }
                            continue;
                        }

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(client_msg, &participant_id, &game_server).await
                            }
                            Err(e) => {
                                tracing::debug!(participant_id = %participant_id, error = %e, "Malformed client message");
                                Some(ServerMessage::error("Malformed message"))
                            }
                        };
                        if let Some(reply) = reply {
                            if !send_message(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(participant_id = %participant_id, error = %e, "WebSocket read error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::warn!(participant_id = %participant_id, "No pong in 40s, closing connection");
                    break;
                }
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }

            _ = token_check_interval.tick() => {
                if Utc::now() >= token_expires_at {
                    let _ = send_message(&mut sender, &ServerMessage::error("Token expired, please reconnect")).await;
                    break;
                }
            }
        }
    }

    game_server.disconnect(&participant_id).await;
    tracing::info!(participant_id = %participant_id, "WebSocket disconnected");
}
