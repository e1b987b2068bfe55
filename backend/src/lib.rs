//! Game Session Coordinator Library
//!
//! Rooms, turn-based games and real-time fan-out over WebSockets. Exposed as
//! a library for the binary and for integration testing.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod game;
pub mod ledger;
pub mod ws;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Creates the application router with all endpoints.
///
/// An empty origin list, or one containing `*`, allows any origin.
pub fn create_app(game_server: Arc<ws::GameServer>, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let allow_origin = if origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let rooms_state = Arc::new(api::RoomsAppState {
        game_server: game_server.clone(),
    });

    Router::new()
        .route("/", get(|| async { "Game Session Coordinator" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api/rooms", api::rooms_router().with_state(rooms_state))
        .route("/ws", get(ws::ws_handler).with_state(game_server))
        .layer(cors)
}

/// Test helper to create an in-memory database and run migrations
pub async fn create_test_db() -> db::DbPool {
    let pool = db::create_pool("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Test helper: a coordinator over a fresh in-memory ledger
pub async fn create_test_server(
    coordinator: config::CoordinatorConfig,
    settlement: config::SettlementConfig,
) -> (Arc<ws::GameServer>, ledger::SqliteLedger) {
    let pool = create_test_db().await;
    let ledger = ledger::SqliteLedger::new(pool);
    let jwt_manager = Arc::new(auth::JwtManager::new("test_secret_key".to_string()));
    let game_server = Arc::new(ws::GameServer::new(
        jwt_manager,
        Arc::new(ledger.clone()),
        coordinator,
        settlement,
    ));
    (game_server, ledger)
}

/// Test helper to create a fully configured test app
pub async fn create_test_app() -> (Router, Arc<ws::GameServer>) {
    let (game_server, _) =
        create_test_server(Default::default(), Default::default()).await;
    let app = create_app(game_server.clone(), &[]);
    (app, game_server)
}
