use crate::db::{credential_repo, snapshot_repo};
use crate::error::AppError;
use crate::models::{DonatedCredential, RateCategory, RateLimitSnapshot};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Choose the credential to use for one upstream call in `category`.
///
/// Policy: sort by snapshot `remaining` descending so capacity depletes
/// evenly across the pool, tiebreak by earlier `reset` so an exhausted
/// credential that recovers soonest is tried first. A credential without a
/// snapshot counts as exhausted with an epoch reset.
pub fn pick<'a>(
    credentials: &'a [DonatedCredential],
    snapshots: &HashMap<Uuid, RateLimitSnapshot>,
) -> Option<&'a DonatedCredential> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;

    let mut ranked: Vec<(&DonatedCredential, i32, DateTime<Utc>)> = credentials
        .iter()
        .map(|cred| match snapshots.get(&cred.id) {
            Some(snap) => (cred, snap.remaining, snap.reset_at),
            None => (cred, 0, epoch),
        })
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.first().map(|(cred, _, _)| *cred)
}

/// Load the non-revoked credentials and their snapshots for `category`,
/// then apply the selection policy.
pub async fn select_credential(
    db: &PgPool,
    category: RateCategory,
) -> Result<DonatedCredential, AppError> {
    let credentials = credential_repo::list_active(db).await?;
    if credentials.is_empty() {
        return Err(AppError::NoCredentials);
    }

    let snapshots = snapshot_repo::for_category(db, category).await?;
    let chosen = pick(&credentials, &snapshots).cloned().ok_or(AppError::NoCredentials)?;

    debug!(
        login = %chosen.github_login,
        category = category.as_str(),
        remaining = snapshots.get(&chosen.id).map(|s| s.remaining).unwrap_or(0),
        "Selected donated credential"
    );

    Ok(chosen)
}
