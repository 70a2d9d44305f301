//! Unix domain socket listener implementing the length-prefixed IPC wire
//! protocol. One connection per sandboxed agent process; each connection can
//! carry many request/response round trips for the lifetime of the turn.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;

use ax_domain::error::{Error, Result};
use ax_domain::trace::TraceEvent;
use ax_protocol::{read_frame, write_frame, IpcRequest, IpcResponse};

use crate::ipc::handlers;
use crate::state::AppState;

/// Bind the IPC socket and serve connections until `shutdown` fires.
/// Removes any stale socket file left behind by a previous, uncleanly
/// terminated process before binding.
pub async fn serve(state: AppState, socket_path: &Path, shutdown: Arc<Notify>) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path).map_err(Error::Io)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }

    let listener = UnixListener::bind(socket_path).map_err(Error::Io)?;
    tracing::info!(path = %socket_path.display(), "IPC gateway listening");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!("IPC gateway shutting down, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                let (stream, _addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "IPC accept failed");
                        continue;
                    }
                };
                let conn_state = state.clone();
                let max_frame = conn_state.config.ipc.max_frame_bytes;
                tokio::spawn(async move {
                    handle_connection(conn_state, stream, max_frame).await;
                });
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

async fn handle_connection(state: AppState, mut stream: UnixStream, max_frame_bytes: u32) {
    loop {
        let body = match read_frame(&mut stream, max_frame_bytes).await {
            Ok(Some(body)) => body,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "IPC frame error, closing connection");
                return;
            }
        };

        let req: IpcRequest = match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                let _ = state.audit.record(
                    None,
                    "ipc_parse_error",
                    serde_json::json!({"error": e.to_string()}),
                );
                if send(&mut stream, &IpcResponse::err(format!("malformed request: {e}")))
                    .await
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        let action = req.action.clone();
        let session_id = req
            .payload
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        TraceEvent::IpcRequest {
            action: action.clone(),
            session_id: session_id.clone(),
        }
        .emit();

        let started = Instant::now();
        let resp = handlers::dispatch(&state, req).await;

        TraceEvent::IpcResponse {
            action,
            ok: matches!(resp, IpcResponse::Ok(_)),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        if send(&mut stream, &resp).await.is_err() {
            return;
        }
    }
}

async fn send(stream: &mut UnixStream, resp: &IpcResponse) -> Result<()> {
    let body = serde_json::to_vec(resp).map_err(Error::Json)?;
    write_frame(stream, &body).await
}
