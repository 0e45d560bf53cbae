/// Upstream (GitHub API) client
///
/// Executes proxied calls with a selected donated credential, watches for
/// credential revocation, and keeps per-category rate-limit snapshots
/// fresh via fire-and-forget probes of the `rate_limit` endpoint.
use crate::config::UpstreamConfig;
use crate::db::{credential_repo, snapshot_repo};
use crate::error::AppError;
use crate::metrics::proxy::UPSTREAM_RESPONSES_TOTAL;
use crate::models::RateCategory;
use crate::services::credential_pool;
use chrono::{DateTime, Utc};
use reqwest::header;
use serde::Deserialize;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gh-proxy-service/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_IDLE_PER_HOST: usize = 8;

/// The credential a response was served with.
#[derive(Debug, Clone)]
pub struct DonorInfo {
    pub id: Uuid,
    pub login: String,
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub donor: Option<DonorInfo>,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    db: PgPool,
    base_url: String,
}

impl GithubClient {
    pub fn new(config: &UpstreamConfig, db: PgPool) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            db,
            base_url: config.base_url.clone(),
        })
    }

    /// Execute one call against the upstream with a freshly selected
    /// credential.
    ///
    /// A `401`, or a `403` carrying a "bad credentials" message, revokes
    /// the credential but still yields the upstream's status and body so
    /// the caller can forward the real error. Transport failures surface
    /// as [`AppError::Upstream`].
    pub async fn execute(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<UpstreamResponse, AppError> {
        let category = RateCategory::from_url(url);
        let credential = credential_pool::select_credential(&self.db, category).await?;

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| AppError::Internal(format!("invalid method: {method}")))?;

        let mut request = self
            .http
            .request(method, url)
            .header(header::ACCEPT, ACCEPT_GITHUB_JSON)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .bearer_auth(&credential.access_token);

        if let Some(ct) = content_type {
            request = request.header(header::CONTENT_TYPE, ct);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url, error = %e, "Upstream request failed");
            AppError::Upstream(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("failed to read upstream body: {e}")))?
            .to_vec();

        UPSTREAM_RESPONSES_TOTAL
            .with_label_values(&[category.as_str(), &status.to_string()])
            .inc();

        if is_bad_credentials(status, &body) {
            warn!(
                login = %credential.github_login,
                status,
                "Upstream rejected credential, marking revoked"
            );
            if let Err(e) = credential_repo::mark_revoked(&self.db, credential.id).await {
                warn!(error = %e, "Failed to mark credential revoked");
            }
        } else if (200..300).contains(&status) {
            if let Err(e) = credential_repo::touch_last_ok(&self.db, credential.id).await {
                debug!(error = %e, "Failed to update credential last_ok_at");
            }
        }

        self.spawn_snapshot_probe(credential.id, credential.access_token.clone());

        Ok(UpstreamResponse {
            status,
            headers,
            body,
            donor: Some(DonorInfo {
                id: credential.id,
                login: credential.github_login,
            }),
        })
    }

    /// Refresh the four category snapshots for a credential without
    /// blocking the response that triggered it.
    fn spawn_snapshot_probe(&self, credential_id: Uuid, token: String) {
        let http = self.http.clone();
        let db = self.db.clone();
        let url = format!("{}/rate_limit", self.base_url);

        tokio::spawn(async move {
            if let Err(e) = refresh_snapshots(&http, &db, &url, credential_id, &token).await {
                debug!(error = %e, "Rate-limit snapshot probe failed");
            }
        });
    }
}

/// Upstream auth failures that take a credential out of rotation: `401`
/// always, `403` only when the JSON body says the credentials are bad.
/// Any other `403` (quota, abuse detection) keeps the credential.
fn is_bad_credentials(status: u16, body: &[u8]) -> bool {
    match status {
        401 => true,
        403 => serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_lowercase().contains("bad credentials"))
            })
            .unwrap_or(false),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitPayload {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: Option<RateWindow>,
    search: Option<RateWindow>,
    code_search: Option<RateWindow>,
    graphql: Option<RateWindow>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RateWindow {
    limit: i32,
    remaining: i32,
    /// Unix seconds at which the window resets
    reset: i64,
}

impl RateLimitResources {
    fn updates(&self) -> Vec<snapshot_repo::SnapshotUpdate> {
        let pairs = [
            (RateCategory::Core, self.core),
            (RateCategory::Search, self.search),
            (RateCategory::CodeSearch, self.code_search),
            (RateCategory::Graphql, self.graphql),
        ];

        pairs
            .into_iter()
            .filter_map(|(category, window)| {
                window.map(|w| snapshot_repo::SnapshotUpdate {
                    category,
                    limit_total: w.limit,
                    remaining: w.remaining,
                    reset_at: DateTime::<Utc>::from_timestamp(w.reset, 0)
                        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                })
            })
            .collect()
    }
}

async fn refresh_snapshots(
    http: &reqwest::Client,
    db: &PgPool,
    url: &str,
    credential_id: Uuid,
    token: &str,
) -> Result<(), AppError> {
    let send = http
        .get(url)
        .header(header::ACCEPT, ACCEPT_GITHUB_JSON)
        .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
        .bearer_auth(token)
        .send();

    let response = tokio::time::timeout(PROBE_TIMEOUT, send)
        .await
        .map_err(|_| AppError::Upstream("rate_limit probe timed out".to_string()))?
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "rate_limit probe returned {}",
            response.status()
        )));
    }

    let payload: RateLimitPayload = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("rate_limit payload invalid: {e}")))?;

    let updates = payload.resources.updates();
    snapshot_repo::upsert_all(db, credential_id, &updates).await?;

    debug!(%credential_id, windows = updates.len(), "Refreshed rate-limit snapshots");
    Ok(())
}
