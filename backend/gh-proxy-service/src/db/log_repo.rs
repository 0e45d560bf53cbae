use crate::models::RequestLogEntry;
use sqlx::PgPool;

/// Append one request log row. Failures here must never fail a request;
/// callers log and move on.
pub async fn append(
    pool: &PgPool,
    key_hash: &str,
    method: &str,
    path: &str,
    status: i32,
    cache_hit: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO request_logs (key_hash, method, path, status, cache_hit)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(key_hash)
    .bind(method)
    .bind(path)
    .bind(status)
    .bind(cache_hit)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent rows, newest first. Feeds the live dashboard's initial
/// "recent requests" view.
pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<RequestLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, RequestLogEntry>(
        r#"
        SELECT id, key_hash, method, path, status, cache_hit, created_at
        FROM request_logs
        ORDER BY id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Trim the table to the most recent `keep` rows.
///
/// The table is an observability aid, not the source of truth for metrics,
/// so id-based trimming is good enough.
pub async fn trim_to_latest(pool: &PgPool, keep: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM request_logs
        WHERE id <= (SELECT COALESCE(MAX(id), 0) FROM request_logs) - $1
        "#,
    )
    .bind(keep)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
