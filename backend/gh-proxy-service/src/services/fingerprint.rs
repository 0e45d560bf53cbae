use sha2::{Digest, Sha256};

/// Cache key for one proxied request.
///
/// Two requests share a fingerprint iff method, canonical URL, and body
/// bytes are pairwise equal; collisions on the body digest are taken to be
/// cryptographically negligible. Request headers are deliberately not part
/// of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub method: String,
    pub url: String,
    pub body_sha256: String,
}

/// Derive the fingerprint for `(method, canonical URL, body)`.
///
/// The URL must already be canonicalized by the pipeline; an absent body
/// hashes as the empty string.
pub fn fingerprint(method: &str, url: &str, body: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(body);

    Fingerprint {
        method: method.to_string(),
        url: url.to_string(),
        body_sha256: hex::encode(hasher.finalize()),
    }
}

/// Join the target URL with the raw incoming query string, verbatim.
pub fn canonical_url(target: &str, raw_query: &str) -> String {
    if raw_query.is_empty() {
        target.to_string()
    } else if target.contains('?') {
        format!("{}&{}", target, raw_query)
    } else {
        format!("{}?{}", target, raw_query)
    }
}
