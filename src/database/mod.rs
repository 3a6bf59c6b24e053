pub mod error;
pub mod reservation_repository;
pub mod wallet_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use self::error::DatabaseError;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Initializing database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(DatabaseError::from_sqlx)?;

    // Fail fast if the database is unreachable at startup.
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

    Ok(pool)
}
