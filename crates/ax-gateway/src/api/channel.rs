//! `POST /v1/channel/ingest` — the HTTP entry point external connectors
//! (Discord bot, Slack app, a webhook relay) post normalized messages to.
//! `GET /v1/channel/outbox` — the matching poll endpoint the reference
//! [`crate::channels::http::HttpChannelProvider`] drains replies through.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::channels::{ingest, ChannelEnvelope, IngestOutcome};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn ingest_message(
    State(state): State<AppState>,
    Json(envelope): Json<ChannelEnvelope>,
) -> Result<impl IntoResponse, ApiError> {
    match ingest(&state, envelope).await? {
        IngestOutcome::Routed(routed) => Ok(Json(json!({
            "sessionId": routed.session.session_id,
            "queuedId": routed.queued_id,
        }))
        .into_response()),
        IngestOutcome::Deduped => Ok(Json(json!({ "deduped": true })).into_response()),
        IngestOutcome::Filtered => Ok(Json(json!({ "filtered": true })).into_response()),
        IngestOutcome::ThreadGated => Ok(Json(json!({ "threadGated": true })).into_response()),
        IngestOutcome::Bootstrapped => Ok(Json(json!({ "bootstrapped": true })).into_response()),
    }
}

#[derive(Debug, Deserialize)]
pub struct OutboxQuery {
    #[serde(default = "default_outbox_limit")]
    pub limit: usize,
}

fn default_outbox_limit() -> usize {
    50
}

/// Drain pending outbound deliveries for a polling relay. Only meaningful
/// when the gateway is running with the reference HTTP channel provider —
/// a provider backed by a real platform client delivers directly and never
/// populates this outbox.
pub async fn drain_outbox(
    State(state): State<AppState>,
    Query(query): Query<OutboxQuery>,
) -> impl IntoResponse {
    let deliveries = state.channel_provider.poll_outbox(query.limit);
    Json(json!({ "deliveries": deliveries }))
}
