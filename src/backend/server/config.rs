/**
 * Server Configuration
 *
 * Loads server settings from the environment (after `.env` has been read by
 * the binary) and opens the optional PostgreSQL pool.
 *
 * # Variables
 *
 * - `SERVER_PORT` - listen port, default 5000
 * - `DATABASE_URL` - project store; absent means the in-memory oracle
 * - `JWT_SECRET` - HS256 secret for handshake tokens
 * - `INTERNAL_API_TOKEN` - service token for the `/internal/` routes; absent disables it
 * - `ORACLE_TIMEOUT_MS` - upper bound on a membership lookup, default 5000
 *
 * # Error Handling
 *
 * A malformed value, including an unparseable `DATABASE_URL`, is a startup
 * error. The pool connects lazily: while the database is unreachable each
 * membership lookup fails closed, and lookups succeed again once it returns.
 */

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::backend::realtime::DEFAULT_ORACLE_TIMEOUT;
use crate::shared::ConfigError;

pub const DEFAULT_PORT: u16 = 5000;

/// Secret used when `JWT_SECRET` is unset in a debug build
const DEV_JWT_SECRET: &str = "projecthub-dev-secret-change-me";

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub internal_token: Option<String>,
    pub oracle_timeout: Duration,
}

impl ServerConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("SERVER_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "SERVER_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let oracle_timeout = match get("ORACLE_TIMEOUT_MS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ORACLE_TIMEOUT_MS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_ORACLE_TIMEOUT,
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                tracing::warn!("JWT_SECRET not set. Using the development secret.");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::MissingValue("JWT_SECRET")),
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            internal_token: get("INTERNAL_API_TOKEN"),
            oracle_timeout,
        })
    }
}

/// Open the project store pool
///
/// Returns `Ok(None)` when no URL is configured; the server then runs with
/// the in-memory oracle. Connections are opened on first use.
pub fn load_database(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set. Using the in-memory membership oracle.");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)?;
    tracing::info!("Database connection pool configured");
    Ok(Some(pool))
}

/// Log whether the project store answers. Lookups fail closed until it does.
pub async fn check_database(pool: &PgPool) {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => tracing::info!("Database reachable"),
        Err(e) => tracing::warn!(
            error = %e,
            "Database unreachable. Project joins are denied until it recovers."
        ),
    }
}
