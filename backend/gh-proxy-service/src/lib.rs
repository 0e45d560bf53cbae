/// gh-proxy-service Library
///
/// A shared caching proxy in front of the GitHub REST and GraphQL APIs.
/// Client applications authenticate with proxy-issued API keys; calls are
/// multiplexed onto a pool of user-donated GitHub credentials, rotated to
/// stay under per-credential rate limits, and successful idempotent
/// responses are memoized in PostgreSQL.
///
/// # Modules
///
/// - `handlers`: HTTP surface (`/gh/*`, health, metrics)
/// - `services`: pipeline, fingerprinting, rate limiting, credential
///   selection, upstream client
/// - `cache`: durable response cache
/// - `db`: database access layer and repositories
/// - `events`: live-event hub feeding external subscribers
/// - `jobs`: janitor background loops
/// - `error`: error types and handling
/// - `config`: configuration management
/// - `metrics`: observability collectors
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
