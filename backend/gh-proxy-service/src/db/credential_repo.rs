use crate::models::DonatedCredential;
use sqlx::PgPool;
use uuid::Uuid;

const CREDENTIAL_COLUMNS: &str =
    "id, github_login, access_token, scopes, revoked, created_at, last_ok_at";

/// All non-revoked credentials, oldest donation first.
pub async fn list_active(pool: &PgPool) -> Result<Vec<DonatedCredential>, sqlx::Error> {
    sqlx::query_as::<_, DonatedCredential>(&format!(
        "SELECT {CREDENTIAL_COLUMNS} FROM donated_credentials WHERE revoked = FALSE ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
}

/// Insert or refresh a donation.
///
/// One active row per GitHub login: a re-donation replaces the token and
/// clears `revoked` so the credential re-enters rotation.
pub async fn upsert_donation(
    pool: &PgPool,
    github_login: &str,
    access_token: &str,
    scopes: Option<&str>,
) -> Result<DonatedCredential, sqlx::Error> {
    sqlx::query_as::<_, DonatedCredential>(&format!(
        r#"
        INSERT INTO donated_credentials (github_login, access_token, scopes)
        VALUES ($1, $2, $3)
        ON CONFLICT (github_login) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                scopes = EXCLUDED.scopes,
                revoked = FALSE
        RETURNING {CREDENTIAL_COLUMNS}
        "#
    ))
    .bind(github_login)
    .bind(access_token)
    .bind(scopes)
    .fetch_one(pool)
    .await
}

/// Take a credential out of rotation after upstream rejected it.
pub async fn mark_revoked(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE donated_credentials SET revoked = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a successful upstream call with this credential.
pub async fn touch_last_ok(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE donated_credentials SET last_ok_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
