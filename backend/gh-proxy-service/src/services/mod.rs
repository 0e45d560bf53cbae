/// Business logic layer
///
/// - `fingerprint`: cache key derivation and URL canonicalization
/// - `headers`: trust-boundary header filtering
/// - `rate_limiter`: per-key token buckets
/// - `credential_pool`: donated-credential selection
/// - `upstream`: GitHub API client and snapshot probes
/// - `proxy`: the request pipeline tying it all together
pub mod credential_pool;
pub mod fingerprint;
pub mod headers;
pub mod proxy;
pub mod rate_limiter;
pub mod upstream;

pub use rate_limiter::RateLimiter;
pub use upstream::GithubClient;
