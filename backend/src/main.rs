use game_coordinator::{auth, config, create_app, db, ledger, ws};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(addr = %config.server_addr(), "Starting game session coordinator");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");
    db::run_migrations(&pool).await?;

    let jwt_manager = Arc::new(auth::JwtManager::new(config.jwt_secret.clone()));
    let ledger = Arc::new(ledger::SqliteLedger::new(pool));
    let game_server = Arc::new(ws::GameServer::new(
        jwt_manager,
        ledger,
        config.coordinator.clone(),
        config.settlement.clone(),
    ));

    let app = create_app(game_server.clone(), &config.cors_allowed_origins);

    // Disconnect grace periods and idle turns
    let timeout_server = game_server.clone();
    let check_interval = config.coordinator.timeout_check_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        loop {
            interval.tick().await;
            timeout_server.check_timeouts().await;
        }
    });

    // Parked settlements get another chance once a minute
    let settlement_server = game_server.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let requeued = settlement_server.retry_failed_settlements().await;
            if requeued > 0 {
                tracing::warn!(requeued, "Requeued failed settlements");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!(addr = %config.server_addr(), "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
