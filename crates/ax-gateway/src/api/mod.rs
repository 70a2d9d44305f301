pub mod auth;
pub mod chat;
pub mod channel;
pub mod health;
pub mod models;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full HTTP router.
///
/// `/v1/health` is public (used by liveness probes). Everything else sits
/// behind the bearer-token middleware, which is a no-op when no token is
/// configured (dev mode).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        .route("/v1/models", get(models::list_providers))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/channel/ingest", post(channel::ingest_message))
        .route("/v1/channel/outbox", get(channel::drain_outbox))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
