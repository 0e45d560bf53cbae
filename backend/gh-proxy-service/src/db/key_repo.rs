use crate::models::ApiKey;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

const KEY_PREFIX: &str = "ghpx_";
const KEY_RANDOM_LEN: usize = 40;
const KEY_HINT_LEN: usize = 8;

/// SHA-256 hex of a plaintext API key; the only form we ever persist or
/// look up by.
pub fn hash_api_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_plaintext_key() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", KEY_PREFIX, random)
}

/// Create a new API key.
///
/// Returns the stored row together with the plaintext key. The plaintext
/// is never persisted; this is the caller's only chance to show it.
pub async fn create(
    pool: &PgPool,
    name: &str,
    rate_limit_per_sec: i32,
) -> Result<(ApiKey, String), sqlx::Error> {
    let plaintext = generate_plaintext_key();
    let key_hash = hash_api_key(&plaintext);
    let key_hint = plaintext.chars().take(KEY_HINT_LEN).collect::<String>();

    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (key_hash, key_hint, name, rate_limit_per_sec)
        VALUES ($1, $2, $3, $4)
        RETURNING id, key_hash, key_hint, name, rate_limit_per_sec, disabled,
                  created_at, last_used_at
        "#,
    )
    .bind(&key_hash)
    .bind(&key_hint)
    .bind(name)
    .bind(rate_limit_per_sec)
    .fetch_one(pool)
    .await?;

    Ok((key, plaintext))
}

/// Look up a key by its hash.
pub async fn find_by_hash(pool: &PgPool, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, key_hash, key_hint, name, rate_limit_per_sec, disabled,
               created_at, last_used_at
        FROM api_keys
        WHERE key_hash = $1
        "#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await
}

/// Enable or disable a key. Keys are never deleted; disabling suffices.
pub async fn set_disabled(pool: &PgPool, id: Uuid, disabled: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE api_keys SET disabled = $1 WHERE id = $2")
        .bind(disabled)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record that a key was just used.
pub async fn touch_last_used(pool: &PgPool, key_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE key_hash = $1")
        .bind(key_hash)
        .execute(pool)
        .await?;

    Ok(())
}
