//! `GET /v1/models` — lists the configured LLM providers the sandboxed
//! agent can reach via the `llm_call` IPC action.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn list_providers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.llm.list_providers() }))
}
