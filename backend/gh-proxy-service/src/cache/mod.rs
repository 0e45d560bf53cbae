/// Durable response cache
///
/// Successful idempotent upstream responses are memoized in Postgres so
/// repeated identical queries do not consume upstream quota.
mod response_cache;

pub use response_cache::{ResponseCache, SweepStats};
