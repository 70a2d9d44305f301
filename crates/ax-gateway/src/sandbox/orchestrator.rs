//! The turn loop: dequeue → workspace → spawn → stdin payload → drain →
//! outbound → persist → cleanup.
//!
//! One call to [`run_turn`] handles exactly one queued message end to end. A
//! background task (wired in [`crate::bootstrap`]) calls it in a loop; the
//! queue's single-writer-per-session invariant plus [`crate::runtime::session_lock`]
//! together guarantee at most one agent process per session runs at a time.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;
use ax_queue::QueuedMessage;
use ax_sessions::conversation::Role;

use crate::reply_waiter::ReplyResult;
use crate::router::process_outbound;
use crate::sandbox::provider::{SandboxProvider, SpawnSpec};
use crate::sandbox::workspace;
use crate::state::AppState;

/// The JSON payload written to the agent process's stdin and closed.
#[derive(Debug, Serialize)]
struct TurnPayload {
    history: Vec<HistoryTurn>,
    message: String,
    taint_ratio: f64,
    taint_threshold: f64,
    profile: String,
    user_id: Option<String>,
    reply_optional: bool,
}

#[derive(Debug, Serialize)]
struct HistoryTurn {
    role: String,
    content: String,
}

pub enum TurnOutcome {
    Delivered { content: String },
    Suppressed { reason: String },
    Failed { diagnosis: String },
}

/// Pop one message off the queue (if any) and run it through the full
/// per-turn lifecycle. Returns `Ok(None)` when the queue is empty.
pub async fn run_next(state: &AppState) -> Result<Option<TurnOutcome>> {
    let Some(queued) = state.queue.dequeue()? else {
        return Ok(None);
    };
    Ok(Some(run_turn(state, queued).await))
}

async fn run_turn(state: &AppState, queued: QueuedMessage) -> TurnOutcome {
    let session_id = queued.session_id.clone();
    let permit = match state.session_locks.acquire(&session_id).await {
        Ok(p) => p,
        Err(e) => {
            let _ = state.queue.fail(queued.id);
            return TurnOutcome::Failed {
                diagnosis: e.to_string(),
            };
        }
    };

    let outcome = run_turn_locked(state, &queued).await;
    drop(permit);

    // P1: exactly one of complete/fail for every admitted message, whether
    // it succeeded, was suppressed (still a completed turn), or failed.
    let turn = match outcome {
        Ok(turn @ (TurnOutcome::Delivered { .. } | TurnOutcome::Suppressed { .. })) => {
            let _ = state.queue.complete(queued.id);
            turn
        }
        Ok(turn @ TurnOutcome::Failed { .. }) => {
            let _ = state.queue.fail(queued.id);
            turn
        }
        Err(e) => {
            let _ = state.queue.fail(queued.id);
            tracing::warn!(session_id = %session_id, error = %e, "turn failed");
            TurnOutcome::Failed {
                diagnosis: e.to_string(),
            }
        }
    };

    state.reply_waiter.notify(queued.id, reply_result_for(&turn));
    turn
}

fn reply_result_for(turn: &TurnOutcome) -> ReplyResult {
    match turn {
        TurnOutcome::Delivered { content } => ReplyResult::Delivered(content.clone()),
        TurnOutcome::Suppressed { reason } => ReplyResult::Suppressed {
            reason: reason.clone(),
        },
        TurnOutcome::Failed { diagnosis } => ReplyResult::Failed {
            diagnosis: diagnosis.clone(),
        },
    }
}

async fn run_turn_locked(state: &AppState, queued: &QueuedMessage) -> Result<TurnOutcome> {
    let (workspace_dir, ephemeral) =
        workspace::prepare(&state.config.sandbox.workspace_root, &queued.session_key)?;
    let skills_dir = workspace::refresh_skills(&state.config.sandbox.skills_root, &workspace_dir)?;

    let history = state
        .conversations
        .load(&queued.session_id, state.config.sessions.max_turns)?
        .into_iter()
        .map(|t| HistoryTurn {
            role: format!("{:?}", t.role).to_lowercase(),
            content: t.content,
        })
        .collect();

    let taint = state.taint.get_state(&queued.session_id);
    let payload = TurnPayload {
        history,
        message: queued.content.clone(),
        taint_ratio: taint.taint_ratio,
        taint_threshold: state.config.taint.active_threshold(),
        profile: format!("{:?}", state.config.taint.profile).to_lowercase(),
        user_id: None,
        reply_optional: false,
    };

    let ipc_socket = workspace_dir.join("ipc.sock");
    let result = spawn_and_drain(
        state,
        &queued.session_id,
        &workspace_dir,
        &skills_dir,
        &ipc_socket,
        &payload,
    )
    .await;

    workspace::cleanup(&workspace_dir, ephemeral);
    state.canaries.clear(&queued.session_id);

    let (exit_ok, stdout, diagnosis) = result?;
    if !exit_ok {
        return Ok(TurnOutcome::Failed {
            diagnosis: diagnosis.unwrap_or_else(|| "agent process exited with an error".to_string()),
        });
    }

    let content = String::from_utf8_lossy(&stdout).trim().to_string();
    if content.is_empty() {
        return Ok(TurnOutcome::Suppressed {
            reason: "agent abstained".to_string(),
        });
    }

    match process_outbound(state, &queued.session_id, &content)? {
        crate::router::OutboundOutcome::Deliver(text) => Ok(TurnOutcome::Delivered { content: text }),
        crate::router::OutboundOutcome::Suppressed { reason } => Ok(TurnOutcome::Suppressed { reason }),
    }
}

/// Spawn the agent process, write its stdin payload, drain stdout/stderr
/// **concurrently** (sequential reads can deadlock once one pipe's buffer
/// fills while the other is still being written to), and await its exit,
/// bounded by the configured timeout.
async fn spawn_and_drain(
    state: &AppState,
    session_id: &str,
    workspace_dir: &PathBuf,
    skills_dir: &PathBuf,
    ipc_socket: &PathBuf,
    payload: &TurnPayload,
) -> Result<(bool, Vec<u8>, Option<String>)> {
    let mut command = state.config.sandbox.command.clone();
    command.push("--ipc-socket".to_string());
    command.push(ipc_socket.display().to_string());
    command.push("--workspace".to_string());
    command.push(workspace_dir.display().to_string());

    let spec = SpawnSpec {
        command,
        workspace: workspace_dir.clone(),
        skills_dir: skills_dir.clone(),
        ipc_socket: ipc_socket.clone(),
        timeout_sec: state.config.sandbox.timeout_sec,
        memory_mb: state.config.sandbox.memory_limit_mb,
    };
    let timeout_sec = spec.timeout_sec;

    let mut handle = state.sandbox.spawn(spec).await?;

    let body = serde_json::to_vec(payload)?;
    handle
        .stdin
        .write_all(&body)
        .await
        .map_err(|e| Error::Sandbox(format!("failed writing stdin payload: {e}")))?;
    handle
        .stdin
        .shutdown()
        .await
        .map_err(|e| Error::Sandbox(format!("failed closing stdin: {e}")))?;

    TraceEvent::SandboxSpawned {
        session_id: session_id.to_string(),
        pid: handle.pid,
    }
    .emit();

    let started = std::time::Instant::now();
    let drain = async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (stdout_res, stderr_res) = tokio::join!(
            handle.stdout.read_to_end(&mut stdout_buf),
            handle.stderr.read_to_end(&mut stderr_buf),
        );
        stdout_res.map_err(|e| Error::Sandbox(format!("stdout read failed: {e}")))?;
        stderr_res.map_err(|e| Error::Sandbox(format!("stderr read failed: {e}")))?;
        let status = handle
            .wait()
            .await
            .map_err(|e| Error::Sandbox(format!("wait failed: {e}")))?;
        Ok::<_, Error>((status.success(), stdout_buf, stderr_buf))
    };

    let outcome = match timeout(Duration::from_secs(timeout_sec), drain).await {
        Ok(res) => res,
        Err(_) => {
            handle.kill().await;
            TraceEvent::SandboxExited {
                session_id: session_id.to_string(),
                exit_code: None,
                duration_ms: started.elapsed().as_millis() as u64,
            }
            .emit();
            return Ok((false, Vec::new(), Some(format!("agent process timed out after {timeout_sec}s"))));
        }
    };

    let (success, mut stdout_buf, mut stderr_buf) = outcome?;
    let cap = state.config.sandbox.max_output_bytes;
    stdout_buf.truncate(cap);
    stderr_buf.truncate(cap);
    TraceEvent::SandboxExited {
        session_id: session_id.to_string(),
        exit_code: if success { Some(0) } else { Some(1) },
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();

    if success {
        Ok((true, stdout_buf, None))
    } else {
        let diagnosis = String::from_utf8_lossy(&stderr_buf).trim().to_string();
        let diagnosis = if diagnosis.is_empty() {
            "agent process exited with a non-zero status".to_string()
        } else {
            diagnosis.lines().take(3).collect::<Vec<_>>().join(" / ")
        };
        Ok((false, Vec::new(), Some(diagnosis)))
    }
}
