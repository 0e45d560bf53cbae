//! Integration tests: response cache and janitor maintenance
//!
//! Runs against a real PostgreSQL database via testcontainers.

mod common;

use common::setup_test_db;
use gh_proxy_service::cache::ResponseCache;
use gh_proxy_service::db::log_repo;
use gh_proxy_service::services::fingerprint::fingerprint;

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

#[actix_web::test]
async fn test_put_get_round_trip_and_newest_wins() {
    let pool = setup_test_db().await.expect("db");
    let cache = ResponseCache::new(pool.clone(), 300, 100);

    let fp = fingerprint("GET", "https://api.github.com/repos/a/b", b"");
    assert!(cache.get(&fp).await.is_none(), "empty cache must miss");

    cache
        .put(&fp, 200, &[header("content-type", "application/json")], br#"{"v":1}"#)
        .await;

    let row = cache.get(&fp).await.expect("hit after put");
    assert_eq!(row.status, 200);
    assert_eq!(row.body, br#"{"v":1}"#.to_vec());
    assert_eq!(
        row.header_pairs(),
        vec![header("content-type", "application/json")]
    );
    assert!(row.expires_at.is_some(), "positive TTL must set an expiry");

    // A second insert for the same fingerprint shadows the first.
    cache.put(&fp, 200, &[], br#"{"v":2}"#).await;
    let row = cache.get(&fp).await.expect("hit");
    assert_eq!(row.body, br#"{"v":2}"#.to_vec());

    // Different fingerprints do not interfere.
    let other = fingerprint("GET", "https://api.github.com/repos/a/c", b"");
    assert!(cache.get(&other).await.is_none());
}

#[actix_web::test]
async fn test_zero_ttl_rows_never_expire() {
    let pool = setup_test_db().await.expect("db");
    let cache = ResponseCache::new(pool.clone(), 0, 100);

    let fp = fingerprint("GET", "https://api.github.com/user", b"");
    cache.put(&fp, 200, &[], b"forever").await;

    let row = cache.get(&fp).await.expect("hit");
    assert!(row.expires_at.is_none(), "TTL 0 must store no expiry");

    // Sweeping removes nothing.
    let stats = cache.sweep().await.expect("sweep");
    assert_eq!(stats.expired_deleted, 0);
    assert!(cache.get(&fp).await.is_some());
}

#[actix_web::test]
async fn test_expired_rows_are_invisible_and_swept() {
    let pool = setup_test_db().await.expect("db");
    let cache = ResponseCache::new(pool.clone(), 300, 100);

    let fp = fingerprint("GET", "https://api.github.com/orgs/hackclub", b"");

    // Insert a row whose expiry is already in the past.
    sqlx::query(
        r#"
        INSERT INTO cached_responses (method, url, body_sha256, status, headers, body, expires_at)
        VALUES ($1, $2, $3, 200, '[]'::jsonb, $4, NOW() - INTERVAL '1 minute')
        "#,
    )
    .bind(&fp.method)
    .bind(&fp.url)
    .bind(&fp.body_sha256)
    .bind(b"stale".as_slice())
    .execute(&pool)
    .await
    .expect("insert");

    assert!(
        cache.get(&fp).await.is_none(),
        "expired rows must never be returned"
    );

    let stats = cache.sweep().await.expect("sweep");
    assert_eq!(stats.expired_deleted, 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_responses")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
}

#[actix_web::test]
async fn test_size_cap_trims_oldest_tenth() {
    let pool = setup_test_db().await.expect("db");
    // A zero-MB cap forces the size branch on every sweep.
    let cache = ResponseCache::new(pool.clone(), 300, 0);

    for i in 0..20 {
        let fp = fingerprint("GET", &format!("https://api.github.com/repos/x/{i}"), b"");
        cache.put(&fp, 200, &[], b"payload").await;
    }

    let stats = cache.sweep().await.expect("sweep");
    assert_eq!(stats.expired_deleted, 0);
    assert_eq!(stats.size_cap_deleted, 2, "20 rows -> oldest tenth is 2");
    assert!(stats.table_bytes > 0);

    // The oldest rows went first.
    let oldest = fingerprint("GET", "https://api.github.com/repos/x/0", b"");
    let newest = fingerprint("GET", "https://api.github.com/repos/x/19", b"");
    assert!(cache.get(&oldest).await.is_none());
    assert!(cache.get(&newest).await.is_some());
}

#[actix_web::test]
async fn test_log_trim_keeps_most_recent_rows() {
    let pool = setup_test_db().await.expect("db");

    sqlx::query(
        r#"
        INSERT INTO request_logs (key_hash, method, path, status, cache_hit)
        SELECT 'hash', 'GET', '/gh/user', 200, FALSE
        FROM generate_series(1, 1010)
        "#,
    )
    .execute(&pool)
    .await
    .expect("seed rows");

    let deleted = log_repo::trim_to_latest(&pool, 1000).await.expect("trim");
    assert_eq!(deleted, 10);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM request_logs")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(remaining, 1000);

    // The survivors are the newest ids.
    let min_id: i64 = sqlx::query_scalar("SELECT MIN(id) FROM request_logs")
        .fetch_one(&pool)
        .await
        .expect("min id");
    assert_eq!(min_id, 11);

    // Trimming an already-trimmed table is a no-op.
    let deleted = log_repo::trim_to_latest(&pool, 1000).await.expect("trim");
    assert_eq!(deleted, 0);

    // Recent rows come back newest first.
    let rows = log_repo::recent(&pool, 5).await.expect("recent");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].id, 1010);
    assert_eq!(rows[4].id, 1006);
    assert!(rows.iter().all(|r| r.method == "GET" && !r.cache_hit));
}
