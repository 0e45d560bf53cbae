use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Instant;

const SHARD_COUNT: usize = 16;

/// Per-key token bucket state. Buckets are intentionally volatile: a
/// restart refills every bucket, which is an accepted trade-off.
#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

/// Node-local admission control, one token bucket per API-key hash.
///
/// The map is sharded by a stable hash of the key so concurrent requests
/// for different keys rarely contend on the same mutex; there is no global
/// lock across shards.
pub struct RateLimiter {
    shards: Vec<Mutex<HashMap<String, Bucket>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key_hash: &str) -> &Mutex<HashMap<String, Bucket>> {
        let mut hasher = DefaultHasher::new();
        key_hash.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Decide whether one request for this key is admitted right now.
    ///
    /// A non-positive limit always denies; disabled or unknown keys never
    /// get a bucket. A new bucket starts full, so a burst of up to
    /// `per_sec` requests is admitted before refill pacing takes over.
    pub fn allow(&self, key_hash: &str, per_sec: i32) -> bool {
        if per_sec <= 0 {
            return false;
        }

        let now = Instant::now();
        let capacity = per_sec as f64;
        let mut shard = match self.shard(key_hash).lock() {
            Ok(guard) => guard,
            // A poisoned shard only means another thread panicked mid-update;
            // the bucket data is still usable.
            Err(poisoned) => poisoned.into_inner(),
        };

        let bucket = shard.entry(key_hash.to_string()).or_insert_with(|| Bucket {
            capacity,
            tokens: capacity,
            last_refill: now,
        });

        // Admins can change a key's limit at runtime; resize in place.
        bucket.capacity = capacity;

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * capacity).min(bucket.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
