/// Data structures for gh-proxy-service
///
/// Row types for the five persisted tables plus the upstream rate-limit
/// category enum shared across the credential pool and upstream client.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A client API key issued by the proxy.
///
/// The plaintext key is shown exactly once at creation time; only its
/// SHA-256 hash is stored and all lookups go through the hash. `key_hint`
/// is a short non-secret prefix used in logs and admin views.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub key_hash: String,
    pub key_hint: String,
    pub name: String,
    pub rate_limit_per_sec: i32,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A donated GitHub credential used against the upstream API.
///
/// One active row per GitHub login; a re-donation updates the existing row
/// and clears `revoked`.
#[derive(Debug, Clone, FromRow)]
pub struct DonatedCredential {
    pub id: Uuid,
    pub github_login: String,
    pub access_token: String,
    pub scopes: Option<String>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub last_ok_at: Option<DateTime<Utc>>,
}

/// Per-credential rate-limit state for one upstream category.
#[derive(Debug, Clone, FromRow)]
pub struct RateLimitSnapshot {
    pub credential_id: Uuid,
    pub category: String,
    pub limit_total: i32,
    pub remaining: i32,
    pub reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memoized upstream response.
#[derive(Debug, Clone, FromRow)]
pub struct CachedResponse {
    pub id: i64,
    pub method: String,
    pub url: String,
    pub body_sha256: String,
    pub status: i32,
    pub headers: serde_json::Value,
    pub body: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedResponse {
    /// Decode the stored header blob back into name/value pairs.
    ///
    /// Rows are written by us, so a malformed blob is treated as "no
    /// headers" rather than an error.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        serde_json::from_value(self.headers.clone()).unwrap_or_default()
    }
}

/// One append-only request log row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestLogEntry {
    pub id: i64,
    pub key_hash: String,
    pub method: String,
    pub path: String,
    pub status: i32,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

/// Upstream rate-limit bucket a request is accounted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateCategory {
    Core,
    Search,
    CodeSearch,
    Graphql,
}

impl RateCategory {
    pub const ALL: [RateCategory; 4] = [
        RateCategory::Core,
        RateCategory::Search,
        RateCategory::CodeSearch,
        RateCategory::Graphql,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Core => "core",
            RateCategory::Search => "search",
            RateCategory::CodeSearch => "code_search",
            RateCategory::Graphql => "graphql",
        }
    }

    /// Classify an upstream URL into its rate-limit category.
    pub fn from_url(url: &str) -> Self {
        if url.contains("/graphql") {
            RateCategory::Graphql
        } else if url.contains("/search/code") {
            RateCategory::CodeSearch
        } else if url.contains("/search/") {
            RateCategory::Search
        } else {
            RateCategory::Core
        }
    }
}
