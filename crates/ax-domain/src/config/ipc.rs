use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unix-socket IPC gateway config: framing limits and per-action timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "d_socket_path")]
    pub socket_path: PathBuf,
    /// Maximum declared frame length in bytes. Spec: 10 MiB; frames
    /// declaring a larger length terminate the connection without reading.
    #[serde(default = "d_max_frame_bytes")]
    pub max_frame_bytes: u32,
    /// Default per-action timeout in milliseconds.
    #[serde(default = "d_action_timeout_ms")]
    pub action_timeout_ms: u64,
    /// `llm_call` gets a longer timeout since model responses are slow.
    /// Overridden at runtime by `AX_LLM_TIMEOUT_MS`.
    #[serde(default = "d_llm_timeout_ms")]
    pub llm_timeout_ms: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: d_socket_path(),
            max_frame_bytes: d_max_frame_bytes(),
            action_timeout_ms: d_action_timeout_ms(),
            llm_timeout_ms: d_llm_timeout_ms(),
        }
    }
}

fn d_socket_path() -> PathBuf {
    PathBuf::from("data/ax.sock")
}
fn d_max_frame_bytes() -> u32 {
    10 * 1024 * 1024
}
fn d_action_timeout_ms() -> u64 {
    30_000
}
fn d_llm_timeout_ms() -> u64 {
    600_000
}

impl IpcConfig {
    /// Resolve the `llm_call` timeout, honoring `AX_LLM_TIMEOUT_MS` if set.
    pub fn llm_timeout_ms_resolved(&self) -> u64 {
        std::env::var("AX_LLM_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.llm_timeout_ms)
    }
}
