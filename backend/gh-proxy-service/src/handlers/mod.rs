/// HTTP handlers for gh-proxy-service
///
/// The proxy surface (`/gh/*`), health probes, and the metrics endpoint.
pub mod health;
pub mod proxy;

use actix_web::web;

/// Route table, shared between `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .route("/health", web::get().to(health::health_summary))
        .route("/health/live", web::get().to(health::liveness_check))
        .service(
            web::scope("/gh").route("/{tail:.*}", web::route().to(proxy::proxy_github)),
        );
}
