use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::metrics::proxy::CACHE_SWEEP_DELETED_TOTAL;
use crate::models::CachedResponse;
use crate::services::fingerprint::Fingerprint;

/// Share of rows removed per sweep once the size cap is exceeded.
const SIZE_CAP_TRIM_DIVISOR: i64 = 10;

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub expired_deleted: u64,
    pub size_cap_deleted: u64,
    pub table_bytes: i64,
}

/// Postgres-backed cache of upstream responses.
///
/// Rows are append-only; `get` returns the newest non-expired row for a
/// fingerprint, which makes duplicate inserts from concurrent misses
/// harmless.
#[derive(Clone)]
pub struct ResponseCache {
    db: PgPool,
    ttl_secs: i64,
    max_size_mb: i64,
}

impl ResponseCache {
    pub fn new(db: PgPool, ttl_secs: i64, max_size_mb: i64) -> Self {
        Self {
            db,
            ttl_secs,
            max_size_mb,
        }
    }

    /// Most recently inserted non-expired row for this fingerprint.
    ///
    /// Store errors are downgraded to a miss so a database outage degrades
    /// to "every request goes upstream" instead of taking the proxy down.
    pub async fn get(&self, fp: &Fingerprint) -> Option<CachedResponse> {
        let result = sqlx::query_as::<_, CachedResponse>(
            r#"
            SELECT id, method, url, body_sha256, status, headers, body, created_at, expires_at
            FROM cached_responses
            WHERE method = $1 AND url = $2 AND body_sha256 = $3
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(&fp.method)
        .bind(&fp.url)
        .bind(&fp.body_sha256)
        .fetch_optional(&self.db)
        .await;

        match result {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, url = %fp.url, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Append a row. Expiry is `now + TTL`, or none when the TTL is zero.
    ///
    /// Write errors are logged and swallowed; the response has already been
    /// fetched and will be emitted regardless.
    pub async fn put(
        &self,
        fp: &Fingerprint,
        status: u16,
        headers: &[(String, String)],
        body: &[u8],
    ) {
        let expires_at = if self.ttl_secs > 0 {
            Some(Utc::now() + Duration::seconds(self.ttl_secs))
        } else {
            None
        };

        let headers_json = match serde_json::to_value(headers) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to serialize response headers, skipping cache write");
                return;
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO cached_responses (method, url, body_sha256, status, headers, body, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&fp.method)
        .bind(&fp.url)
        .bind(&fp.body_sha256)
        .bind(status as i32)
        .bind(headers_json)
        .bind(body)
        .bind(expires_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => debug!(url = %fp.url, status, "Cache WRITE"),
            Err(e) => warn!(error = %e, url = %fp.url, "Cache write failed"),
        }
    }

    /// Best-effort eviction pass.
    ///
    /// Expired rows are deleted first. If the table footprint still exceeds
    /// the configured cap, the oldest tenth of rows by insertion time is
    /// removed and the pass stops; the next sweep re-evaluates.
    pub async fn sweep(&self) -> Result<SweepStats, sqlx::Error> {
        let mut stats = SweepStats::default();

        stats.expired_deleted = sqlx::query(
            "DELETE FROM cached_responses WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
        )
        .execute(&self.db)
        .await?
        .rows_affected();

        if stats.expired_deleted > 0 {
            CACHE_SWEEP_DELETED_TOTAL
                .with_label_values(&["expired"])
                .inc_by(stats.expired_deleted);
        }

        stats.table_bytes =
            sqlx::query_scalar::<_, i64>("SELECT pg_total_relation_size('cached_responses')")
                .fetch_one(&self.db)
                .await?;

        if stats.table_bytes > self.max_size_mb * 1024 * 1024 {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_responses")
                .fetch_one(&self.db)
                .await?;
            let batch = (total / SIZE_CAP_TRIM_DIVISOR).max(1);

            stats.size_cap_deleted = sqlx::query(
                r#"
                DELETE FROM cached_responses
                WHERE id IN (
                    SELECT id FROM cached_responses
                    ORDER BY created_at ASC, id ASC
                    LIMIT $1
                )
                "#,
            )
            .bind(batch)
            .execute(&self.db)
            .await?
            .rows_affected();

            CACHE_SWEEP_DELETED_TOTAL
                .with_label_values(&["size_cap"])
                .inc_by(stats.size_cap_deleted);

            debug!(
                table_bytes = stats.table_bytes,
                deleted = stats.size_cap_deleted,
                "Cache size cap exceeded, trimmed oldest rows"
            );
        }

        Ok(stats)
    }
}
