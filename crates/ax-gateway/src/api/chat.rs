//! OpenAI-compatible `/v1/chat/completions`. Translates the request into a
//! channel-equivalent inbound message, routes it through the same trust
//! boundary every other caller goes through, and blocks for the sandboxed
//! agent's reply via [`crate::reply_waiter`].
//!
//! No streaming: the agent process is a black box until it closes stdout,
//! so there is nothing to stream deltas from.

use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use ax_domain::config::InboundMetadata;
use ax_domain::error::Error as DomainError;

use crate::error::ApiError;
use crate::reply_waiter::ReplyResult;
use crate::router::{process_inbound, InboundMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: &'static str,
    content: String,
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(body): Json<ChatCompletionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_message = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .ok_or_else(|| ApiError::BadRequest("no user message found in messages array".to_string()))?;

    let meta = InboundMetadata {
        channel: Some("openai-compat".to_string()),
        account_id: None,
        peer_id: Some(format!("openai-compat:{}", uuid::Uuid::new_v4())),
        group_id: None,
        channel_id: None,
        thread_id: None,
        is_direct: true,
    };
    let msg = InboundMessage {
        sender: "openai-compat".to_string(),
        content: user_message,
        meta,
    };

    let routed = match process_inbound(&state, msg).await {
        Ok(routed) => routed,
        // A message the input scanner blocked never reaches the sandbox at
        // all; an OpenAI-compatible caller reads that as a moderation
        // response, not a transport error, so it gets a 200 back.
        Err(DomainError::ScanBlocked(reason)) => {
            return Ok(completion_response(
                body.model,
                format!("Request blocked: {reason}"),
                "content_filter",
            )
            .into_response());
        }
        Err(e) => return Err(e.into()),
    };
    let rx = state.reply_waiter.register(routed.queued_id);

    let timeout = Duration::from_secs(state.config.sandbox.timeout_sec + 10);
    let outcome = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => {
            state.reply_waiter.cancel(routed.queued_id);
            return Err(ApiError::Internal(
                "reply channel closed before a result arrived".to_string(),
            ));
        }
        Err(_) => {
            state.reply_waiter.cancel(routed.queued_id);
            return Err(ApiError::Internal(
                "turn timed out waiting for the sandboxed agent".to_string(),
            ));
        }
    };

    let (content, finish_reason) = match outcome {
        ReplyResult::Delivered(text) => (text, "stop"),
        ReplyResult::Suppressed { reason } => (format!("Request blocked: {reason}"), "content_filter"),
        ReplyResult::Failed { diagnosis } => (format!("Agent processing failed: {diagnosis}"), "stop"),
    };

    Ok(completion_response(body.model, content, finish_reason).into_response())
}

fn completion_response(model: String, content: String, finish_reason: &'static str) -> Json<ChatCompletionResponse> {
    Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content,
            },
            finish_reason,
        }],
    })
}
