/// Header filtering at the trust boundary.
///
/// Applied to every upstream-to-client copy and to cache reads, so neither
/// upstream session state nor transport-length claims leak through the
/// proxy.

/// Headers HTTP defines as hop-by-hop; they describe one connection and
/// must not propagate across an intermediary.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers that would carry upstream session or transport state across the
/// trust boundary.
const SECURITY_BOUNDARY: &[&str] = &[
    "set-cookie",
    "strict-transport-security",
    "public-key-pins",
    "content-length",
];

/// True when a header must not be forwarded to clients, case-insensitively.
pub fn is_stripped(name: &str) -> bool {
    HOP_BY_HOP
        .iter()
        .chain(SECURITY_BOUNDARY.iter())
        .any(|blocked| name.eq_ignore_ascii_case(blocked))
}

/// Retain only forwardable header pairs.
pub fn filter_pairs(pairs: &[(String, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter(|(name, _)| !is_stripped(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_blocked_name_is_stripped() {
        for name in HOP_BY_HOP.iter().chain(SECURITY_BOUNDARY.iter()) {
            assert!(is_stripped(name), "{name} should be stripped");
            assert!(is_stripped(&name.to_uppercase()), "{name} should strip case-insensitively");
        }
    }

    #[test]
    fn test_ordinary_headers_pass() {
        for name in ["content-type", "etag", "x-ratelimit-remaining", "link", "vary"] {
            assert!(!is_stripped(name), "{name} should be forwarded");
        }
    }

    #[test]
    fn test_filter_pairs() {
        let pairs = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Set-Cookie".to_string(), "session=abc".to_string()),
            ("ETag".to_string(), "\"deadbeef\"".to_string()),
            ("Transfer-Encoding".to_string(), "chunked".to_string()),
            ("Content-Length".to_string(), "42".to_string()),
        ];

        let kept = filter_pairs(&pairs);
        let names: Vec<&str> = kept.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Content-Type", "ETag"]);
    }
}
