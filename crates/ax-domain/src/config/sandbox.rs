use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sandbox orchestrator config: the agent-process command template and
/// per-turn resource limits (spec §4.12).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Argv template for the agent process, e.g. `["node", "agent.js"]`.
    /// The orchestrator appends `--ipc-socket <path>` and `--workspace <path>`.
    #[serde(default = "d_command")]
    pub command: Vec<String>,
    #[serde(default = "d_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "d_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "d_workspace_root")]
    pub workspace_root: PathBuf,
    #[serde(default = "d_skills_root")]
    pub skills_root: PathBuf,
    /// Maximum captured bytes per stdout/stderr stream before truncation.
    #[serde(default = "d_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command: d_command(),
            timeout_sec: d_timeout_sec(),
            memory_limit_mb: d_memory_limit_mb(),
            workspace_root: d_workspace_root(),
            skills_root: d_skills_root(),
            max_output_bytes: d_max_output_bytes(),
        }
    }
}

fn d_command() -> Vec<String> {
    vec!["ax-agent".into()]
}
fn d_timeout_sec() -> u64 {
    1800
}
fn d_memory_limit_mb() -> u64 {
    1024
}
fn d_workspace_root() -> PathBuf {
    PathBuf::from("data/workspaces")
}
fn d_skills_root() -> PathBuf {
    PathBuf::from("skills")
}
fn d_max_output_bytes() -> usize {
    1_000_000
}
