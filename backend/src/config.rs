use crate::game::constants::{
    DEFAULT_DISCONNECT_GRACE_SECS, DEFAULT_GAME_COOLDOWN_SECS, DEFAULT_ROOM_IDLE_TIMEOUT_SECS,
    DEFAULT_SETTLEMENT_BACKOFF_MS, DEFAULT_SETTLEMENT_MAX_ATTEMPTS,
    DEFAULT_SETTLEMENT_MAX_BACKOFF_MS, DEFAULT_TIMEOUT_CHECK_INTERVAL_MS, DEFAULT_TURN_TIMEOUT_SECS,
};
use anyhow::{bail, Context};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub is_production: bool,
    pub coordinator: CoordinatorConfig,
    pub settlement: SettlementConfig,
}

/// Timing knobs for seats and turns
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// How long a disconnected player's seat is held
    pub disconnect_grace: Duration,
    /// How long the current actor may idle before the timeout action is applied
    pub turn_timeout: Duration,
    pub timeout_check_interval: Duration,
    /// Waiting rooms idle this long are closed
    pub room_idle_timeout: Duration,
    /// Minimum pause after a game before the room deals the next one
    pub game_cooldown: Duration,
}

#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            disconnect_grace: Duration::from_secs(DEFAULT_DISCONNECT_GRACE_SECS),
            turn_timeout: Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS),
            timeout_check_interval: Duration::from_millis(DEFAULT_TIMEOUT_CHECK_INTERVAL_MS),
            room_idle_timeout: Duration::from_secs(DEFAULT_ROOM_IDLE_TIMEOUT_SECS),
            game_cooldown: Duration::from_secs(DEFAULT_GAME_COOLDOWN_SECS),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SETTLEMENT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_SETTLEMENT_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_SETTLEMENT_MAX_BACKOFF_MS),
        }
    }
}

impl SettlementConfig {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let is_production = env::var("COORDINATOR_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => {
                if is_production && secret.len() < 32 {
                    bail!("JWT_SECRET must be at least 32 characters in production");
                }
                secret
            }
            Err(_) => {
                if is_production {
                    bail!("JWT_SECRET environment variable must be set in production");
                }
                tracing::warn!(
                    "WARNING: Using default JWT secret. Set JWT_SECRET in production!"
                );
                "development_secret_key_change_in_production".to_string()
            }
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        let coordinator = CoordinatorConfig {
            disconnect_grace: Duration::from_secs(env_or(
                "DISCONNECT_GRACE_SECS",
                DEFAULT_DISCONNECT_GRACE_SECS,
            )?),
            turn_timeout: Duration::from_secs(env_or(
                "TURN_TIMEOUT_SECS",
                DEFAULT_TURN_TIMEOUT_SECS,
            )?),
            timeout_check_interval: Duration::from_millis(env_or(
                "TIMEOUT_CHECK_INTERVAL_MS",
                DEFAULT_TIMEOUT_CHECK_INTERVAL_MS,
            )?),
            room_idle_timeout: Duration::from_secs(env_or(
                "ROOM_IDLE_TIMEOUT_SECS",
                DEFAULT_ROOM_IDLE_TIMEOUT_SECS,
            )?),
            game_cooldown: Duration::from_secs(env_or(
                "GAME_COOLDOWN_SECS",
                DEFAULT_GAME_COOLDOWN_SECS,
            )?),
        };
        if coordinator.timeout_check_interval.is_zero() {
            bail!("TIMEOUT_CHECK_INTERVAL_MS must be greater than zero");
        }

        let settlement = SettlementConfig {
            max_attempts: env_or("SETTLEMENT_MAX_ATTEMPTS", DEFAULT_SETTLEMENT_MAX_ATTEMPTS)?
                .max(1),
            initial_backoff: Duration::from_millis(env_or(
                "SETTLEMENT_BACKOFF_MS",
                DEFAULT_SETTLEMENT_BACKOFF_MS,
            )?),
            max_backoff: Duration::from_millis(env_or(
                "SETTLEMENT_MAX_BACKOFF_MS",
                DEFAULT_SETTLEMENT_MAX_BACKOFF_MS,
            )?),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:coordinator.db".to_string()),
            jwt_secret,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", 3000)?,
            cors_allowed_origins,
            is_production,
            coordinator,
            settlement,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
