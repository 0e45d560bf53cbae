//! Janitor background jobs
//!
//! Two independent timers keep the durable state bounded: a cache sweep
//! (TTL expiry plus the size cap) and a request-log trim. Both are
//! best-effort; a failed pass is logged and retried on the next tick.

use crate::cache::ResponseCache;
use crate::db::log_repo;
use crate::metrics::proxy::REQUEST_LOG_TRIMMED_TOTAL;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const SWEEP_TIMEOUT: Duration = Duration::from_secs(30);

const TRIM_INTERVAL: Duration = Duration::from_secs(10);
const TRIM_TIMEOUT: Duration = Duration::from_secs(2);

/// Rows to keep in the request log
const LOG_KEEP_ROWS: i64 = 1000;

pub async fn start_cache_sweeper(cache: ResponseCache) {
    info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Starting cache sweeper job"
    );

    let mut ticker = interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let started = Instant::now();

        match timeout(SWEEP_TIMEOUT, cache.sweep()).await {
            Ok(Ok(stats)) => {
                if stats.expired_deleted > 0 || stats.size_cap_deleted > 0 {
                    info!(
                        expired = stats.expired_deleted,
                        size_cap = stats.size_cap_deleted,
                        table_bytes = stats.table_bytes,
                        duration_ms = started.elapsed().as_millis(),
                        "Cache sweep completed"
                    );
                } else {
                    debug!(
                        table_bytes = stats.table_bytes,
                        "Cache sweep completed, nothing to delete"
                    );
                }
            }
            Ok(Err(e)) => warn!(error = %e, "Cache sweep failed"),
            Err(_) => warn!(
                timeout_secs = SWEEP_TIMEOUT.as_secs(),
                "Cache sweep timed out"
            ),
        }
    }
}

pub async fn start_log_trimmer(db: PgPool) {
    info!(
        interval_secs = TRIM_INTERVAL.as_secs(),
        keep_rows = LOG_KEEP_ROWS,
        "Starting request-log trimmer job"
    );

    let mut ticker = interval(TRIM_INTERVAL);
    loop {
        ticker.tick().await;

        match timeout(TRIM_TIMEOUT, log_repo::trim_to_latest(&db, LOG_KEEP_ROWS)).await {
            Ok(Ok(deleted)) => {
                if deleted > 0 {
                    REQUEST_LOG_TRIMMED_TOTAL.inc_by(deleted);
                    debug!(deleted, "Trimmed request log");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "Request-log trim failed"),
            Err(_) => warn!(
                timeout_secs = TRIM_TIMEOUT.as_secs(),
                "Request-log trim timed out"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_janitor_cadence_constants() {
        assert_eq!(SWEEP_INTERVAL, Duration::from_secs(60));
        assert_eq!(SWEEP_TIMEOUT, Duration::from_secs(30));
        assert_eq!(TRIM_INTERVAL, Duration::from_secs(10));
        assert_eq!(TRIM_TIMEOUT, Duration::from_secs(2));
        assert_eq!(LOG_KEEP_ROWS, 1000);
    }
}
