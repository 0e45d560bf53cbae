/// Request pipeline
///
/// The data path from an authenticated client call to a cached-or-proxied
/// response: auth, body bound, per-key admission, cache lookup, upstream
/// fetch, cache store, response emission, and post-actions (request log,
/// metrics, live events).
use actix_web::error::ResponseError;
use actix_web::http::{Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use std::time::Instant;
use tracing::{debug, error};

use crate::db::{key_repo, log_repo};
use crate::error::AppError;
use crate::events::{LiveEvent, RecentRequest};
use crate::metrics::proxy::{PROXY_REQUESTS_TOTAL, PROXY_REQUEST_DURATION_SECONDS};
use crate::models::{ApiKey, RateCategory};
use crate::services::{fingerprint, headers};
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

const CACHE_STATE_HEADER: &str = "x-gh-proxy-cache";
const CATEGORY_HEADER: &str = "x-gh-proxy-category";
const CLIENT_HEADER: &str = "x-gh-proxy-client";
const DONOR_HEADER: &str = "x-gh-proxy-donor";

/// What one pipeline run produced, in a shape that can be logged and
/// converted into the client response.
struct ProxyOutcome {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    /// `Some(true)` hit, `Some(false)` miss, `None` when the request never
    /// reached the proxy stage (413/429/502 and friends)
    cache_hit: Option<bool>,
    category: Option<RateCategory>,
    donor: Option<String>,
    /// Set when the body should be the standard JSON error rendering
    error: Option<AppError>,
}

impl ProxyOutcome {
    fn from_error(err: AppError) -> Self {
        Self {
            status: err.status_code().as_u16(),
            headers: Vec::new(),
            body: Vec::new(),
            cache_hit: None,
            category: None,
            donor: None,
            error: Some(err),
        }
    }

    fn metric_label(&self) -> &'static str {
        match self.cache_hit {
            Some(true) => "hit",
            Some(false) => "miss",
            None => match self.status {
                413 => "body_too_large",
                429 => "rate_limited",
                502 => "upstream_error",
                _ => "error",
            },
        }
    }

    fn into_response(self, key: &ApiKey) -> HttpResponse {
        if let Some(err) = self.error {
            return err.error_response();
        }

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut builder = HttpResponse::build(status);

        for (name, value) in &self.headers {
            builder.append_header((name.as_str(), value.as_str()));
        }

        if let Some(hit) = self.cache_hit {
            builder.insert_header((CACHE_STATE_HEADER, if hit { "hit" } else { "miss" }));
        }
        if let Some(category) = self.category {
            builder.insert_header((CATEGORY_HEADER, category.as_str()));
        }
        builder.insert_header((CLIENT_HEADER, key.key_hint.as_str()));
        if let Some(donor) = &self.donor {
            builder.insert_header((DONOR_HEADER, donor.as_str()));
        }

        builder.body(self.body)
    }
}

/// Serve one proxied request end to end.
pub async fn serve(state: &AppState, req: &HttpRequest, payload: web::Payload) -> HttpResponse {
    let started = Instant::now();

    // Step 1: authenticate. Everything before a key is known is answered
    // directly and never logged to the request log.
    let raw_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();

    if raw_key.is_empty() {
        PROXY_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
        return AppError::MissingApiKey.error_response();
    }

    let key_hash = key_repo::hash_api_key(raw_key);
    let key = match key_repo::find_by_hash(&state.db, &key_hash).await {
        Ok(Some(key)) if !key.disabled => key,
        Ok(_) => {
            PROXY_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            return AppError::KeyRejected.error_response();
        }
        Err(e) => {
            error!(error = %e, "API key lookup failed");
            PROXY_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            return AppError::Database(e).error_response();
        }
    };

    let outcome = match proxied(state, req, payload, &key).await {
        Ok(outcome) => outcome,
        Err(err) => ProxyOutcome::from_error(err),
    };

    post_actions(state, req, &key, &outcome, started).await;
    outcome.into_response(&key)
}

/// Steps 2-8 for an authenticated key.
async fn proxied(
    state: &AppState,
    req: &HttpRequest,
    mut payload: web::Payload,
    key: &ApiKey,
) -> Result<ProxyOutcome, AppError> {
    let max_body = state.config.proxy.max_body_bytes;

    // Step 2: bound the incoming body, first by declared length, then by
    // an enforced cap while reading.
    if let Some(declared) = content_length(req) {
        if declared > max_body as u64 {
            return Err(AppError::BodyTooLarge(max_body));
        }
    }

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk =
            chunk.map_err(|e| AppError::Internal(format!("failed to read request body: {e}")))?;
        if body.len() + chunk.len() > max_body {
            return Err(AppError::BodyTooLarge(max_body));
        }
        body.extend_from_slice(&chunk);
    }

    // Step 3: per-key admission.
    if !state.limiter.allow(&key.key_hash, key.rate_limit_per_sec) {
        debug!(key_hint = %key.key_hint, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    // Steps 4-5: canonical target URL and cache lookup for idempotent
    // methods. The tail comes from the raw URI so percent-encoded upstream
    // paths pass through byte for byte.
    let tail = req
        .uri()
        .path()
        .strip_prefix("/gh/")
        .or_else(|| req.uri().path().strip_prefix("/gh"))
        .unwrap_or("");
    let target = format!("{}/{}", state.config.upstream.base_url, tail);
    let url = fingerprint::canonical_url(&target, req.query_string());
    let category = RateCategory::from_url(&url);
    let cacheable = req.method() == Method::GET || req.method() == Method::HEAD;

    let fp = fingerprint::fingerprint(req.method().as_str(), &url, &body);

    if cacheable {
        if let Some(row) = state.cache.get(&fp).await {
            debug!(key_hint = %key.key_hint, url = %url, "Cache HIT");
            let stored = row.header_pairs();
            return Ok(ProxyOutcome {
                status: row.status as u16,
                headers: headers::filter_pairs(&stored),
                body: row.body,
                cache_hit: Some(true),
                category: Some(category),
                donor: None,
                error: None,
            });
        }
    }

    // Step 6: upstream fetch with a freshly selected credential.
    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request_body = if body.is_empty() {
        None
    } else {
        Some(body.to_vec())
    };

    let upstream = state
        .github
        .execute(req.method().as_str(), &url, request_body, content_type)
        .await?;

    // Step 7: memoize successful idempotent responses unless the upstream
    // opted out.
    let filtered = headers::filter_pairs(&upstream.headers);
    if cacheable && upstream.status == 200 && cache_control_allows_store(&upstream.headers) {
        state
            .cache
            .put(&fp, upstream.status, &filtered, &upstream.body)
            .await;
    }

    Ok(ProxyOutcome {
        status: upstream.status,
        headers: filtered,
        body: upstream.body,
        cache_hit: Some(false),
        category: Some(category),
        donor: upstream.donor.map(|d| d.login),
        error: None,
    })
}

/// Step 9: request log row, key last-used, metrics, live events. None of
/// these may fail the request.
async fn post_actions(
    state: &AppState,
    req: &HttpRequest,
    key: &ApiKey,
    outcome: &ProxyOutcome,
    started: Instant,
) {
    let cache_hit = outcome.cache_hit.unwrap_or(false);

    if let Err(e) = log_repo::append(
        &state.db,
        &key.key_hash,
        req.method().as_str(),
        req.path(),
        outcome.status as i32,
        cache_hit,
    )
    .await
    {
        debug!(error = %e, "Failed to append request log row");
    }

    if let Err(e) = key_repo::touch_last_used(&state.db, &key.key_hash).await {
        debug!(error = %e, "Failed to update key last_used_at");
    }

    let label = outcome.metric_label();
    PROXY_REQUESTS_TOTAL.with_label_values(&[label]).inc();
    PROXY_REQUEST_DURATION_SECONDS
        .with_label_values(&[label])
        .observe(started.elapsed().as_secs_f64());

    state.stats.record(outcome.cache_hit, outcome.status);
    state.events.publish(LiveEvent::Recent(RecentRequest {
        key_hint: key.key_hint.clone(),
        method: req.method().to_string(),
        path: req.path().to_string(),
        status: outcome.status,
        cache_hit,
        category: outcome.category,
        timestamp: Utc::now(),
    }));
    state
        .events
        .publish(LiveEvent::Stats(state.stats.snapshot()));
}

fn content_length(req: &HttpRequest) -> Option<u64> {
    req.headers()
        .get(actix_web::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// `Cache-Control: no-cache` / `no-store` from the upstream suppresses the
/// cache write, case-insensitively.
fn cache_control_allows_store(upstream_headers: &[(String, String)]) -> bool {
    for (name, value) in upstream_headers {
        if name.eq_ignore_ascii_case("cache-control") {
            let value = value.to_lowercase();
            if value.contains("no-cache") || value.contains("no-store") {
                return false;
            }
        }
    }
    true
}
