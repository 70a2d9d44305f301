//! The sandbox provider contract. A provider is whatever actually isolates
//! and runs the untrusted agent process — a bare subprocess, a container, an
//! OS-level sandbox. The orchestrator only depends on this trait, so any of
//! those is a drop-in replacement for [`SubprocessSandbox`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use ax_domain::error::{Error, Result};

/// Everything the orchestrator knows about how to start one turn's agent
/// process.
pub struct SpawnSpec {
    pub command: Vec<String>,
    pub workspace: PathBuf,
    pub skills_dir: PathBuf,
    pub ipc_socket: PathBuf,
    pub timeout_sec: u64,
    pub memory_mb: u64,
}

/// A running (or just-exited) agent process. `stdin`/`stdout`/`stderr` are
/// taken out of the underlying child so the orchestrator can feed/drain them
/// concurrently; `child` remains for waiting and killing.
pub struct SandboxHandle {
    pub pid: Option<u32>,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    child: Child,
}

impl SandboxHandle {
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    pub async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn spawn(&self, spec: SpawnSpec) -> Result<SandboxHandle>;
}

/// Runs the agent as a plain child process on the host's own OS. No memory
/// limit enforcement — that's left to whatever container runtime or cgroup
/// wrapper actually deploys this binary; `memory_mb` is carried through so a
/// future provider can act on it, but this one only honors `timeout_sec` (via
/// the orchestrator's own timeout around `wait`).
pub struct SubprocessSandbox;

#[async_trait]
impl SandboxProvider for SubprocessSandbox {
    async fn spawn(&self, spec: SpawnSpec) -> Result<SandboxHandle> {
        let Some((program, args)) = spec.command.split_first() else {
            return Err(Error::Sandbox("empty command".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.workspace)
            .env("AX_IPC_SOCKET", &spec.ipc_socket)
            .env("AX_WORKSPACE", &spec.workspace)
            .env("AX_SKILLS_DIR", &spec.skills_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Sandbox(format!("failed to spawn agent process: {e}")))?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Sandbox("child stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Sandbox("child stdout not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Sandbox("child stderr not piped".to_string()))?;

        Ok(SandboxHandle {
            pid,
            stdin,
            stdout,
            stderr,
            child,
        })
    }
}
