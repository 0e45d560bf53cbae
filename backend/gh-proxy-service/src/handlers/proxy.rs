use crate::services::proxy;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};

/// Catch-all handler for `/gh/*`: every method and path is handed to the
/// request pipeline, which owns status selection end to end.
pub async fn proxy_github(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> HttpResponse {
    proxy::serve(state.get_ref(), &req, payload).await
}
