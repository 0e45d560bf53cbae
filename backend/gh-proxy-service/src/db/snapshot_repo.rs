use crate::models::{RateCategory, RateLimitSnapshot};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// One category window as reported by the upstream `rate_limit` endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotUpdate {
    pub category: RateCategory,
    pub limit_total: i32,
    pub remaining: i32,
    pub reset_at: DateTime<Utc>,
}

/// Snapshots for every credential in one category, keyed by credential id.
///
/// Credentials without a row simply have no entry; the selection policy
/// treats them as exhausted with an epoch reset.
pub async fn for_category(
    pool: &PgPool,
    category: RateCategory,
) -> Result<HashMap<Uuid, RateLimitSnapshot>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RateLimitSnapshot>(
        r#"
        SELECT credential_id, category, limit_total, remaining, reset_at, updated_at
        FROM rate_limit_snapshots
        WHERE category = $1
        "#,
    )
    .bind(category.as_str())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|s| (s.credential_id, s)).collect())
}

/// Atomically replace all four category rows for one credential.
pub async fn upsert_all(
    pool: &PgPool,
    credential_id: Uuid,
    updates: &[SnapshotUpdate],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for update in updates {
        sqlx::query(
            r#"
            INSERT INTO rate_limit_snapshots
                (credential_id, category, limit_total, remaining, reset_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (credential_id, category) DO UPDATE
                SET limit_total = EXCLUDED.limit_total,
                    remaining = EXCLUDED.remaining,
                    reset_at = EXCLUDED.reset_at,
                    updated_at = NOW()
            "#,
        )
        .bind(credential_id)
        .bind(update.category.as_str())
        .bind(update.limit_total)
        .bind(update.remaining)
        .bind(update.reset_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
