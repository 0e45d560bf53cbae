/// Database access layer
///
/// Pool construction plus one repository module per table.
pub mod credential_repo;
pub mod key_repo;
pub mod log_repo;
pub mod snapshot_repo;

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

const CONNECT_VERIFY_TIMEOUT_SECS: u64 = 5;

/// Create the PostgreSQL connection pool and verify it with `SELECT 1`.
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.max_connections.min(5))
        // Timeout for acquiring a connection from the pool
        .acquire_timeout(Duration::from_secs(10))
        // Close connections idle for longer than this
        .idle_timeout(Duration::from_secs(600))
        // Maximum lifetime of a connection (to handle stale connections)
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    match tokio::time::timeout(
        Duration::from_secs(CONNECT_VERIFY_TIMEOUT_SECS),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!(
                max_connections = config.max_connections,
                "Database pool created and verified successfully"
            );
            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Database connection verification failed");
            Err(e)
        }
        Err(_) => {
            error!(
                timeout_secs = CONNECT_VERIFY_TIMEOUT_SECS,
                "Database connection verification timeout"
            );
            Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Database verification timeout",
            )))
        }
    }
}
