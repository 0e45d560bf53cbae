use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::Result;
use crate::events::{EventHub, ProxyStats};
use crate::services::{GithubClient, RateLimiter};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub cache: ResponseCache,
    pub limiter: Arc<RateLimiter>,
    pub github: GithubClient,
    pub events: EventHub,
    pub stats: Arc<ProxyStats>,
}

impl AppState {
    /// Assemble the pipeline components from configuration and an already
    /// verified pool. Spawns the event hub task.
    pub fn new(config: Arc<Config>, db: PgPool) -> Result<Self> {
        let cache = ResponseCache::new(
            db.clone(),
            config.cache.max_cache_time_secs,
            config.cache.max_cache_size_mb,
        );
        let github = GithubClient::new(&config.upstream, db.clone())?;

        Ok(Self {
            db,
            config,
            cache,
            limiter: Arc::new(RateLimiter::new()),
            github,
            events: EventHub::spawn(),
            stats: Arc::new(ProxyStats::default()),
        })
    }
}
