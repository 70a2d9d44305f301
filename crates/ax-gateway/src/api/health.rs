//! `GET /v1/health` — liveness probe. No auth, no state touched beyond what's
//! cheap to read synchronously.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.list().len(),
        "queue_writer": state.config.sandbox.command.first().cloned(),
    }))
}
