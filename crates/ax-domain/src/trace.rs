use serde::Serialize;

/// Structured trace events emitted across the `ax` crates. Distinct from the
/// append-only audit log (`ax-gateway::audit`) — these are for operators
/// tailing logs, not for the durable security record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    IdentityResolved {
        raw_peer_id: String,
        canonical: String,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    ConversationAppend {
        session_id: String,
        turns: usize,
    },
    TaintUpdated {
        session_id: String,
        taint_in: u64,
        taint_out: u64,
        level: String,
    },
    ScanVerdict {
        session_id: String,
        direction: String,
        verdict: String,
        matched_rules: usize,
    },
    CanaryMinted {
        session_id: String,
    },
    CanaryTripped {
        session_id: String,
        surface: String,
    },
    IpcRequest {
        action: String,
        session_id: Option<String>,
    },
    IpcResponse {
        action: String,
        ok: bool,
        duration_ms: u64,
    },
    SandboxSpawned {
        session_id: String,
        pid: Option<u32>,
    },
    SandboxExited {
        session_id: String,
        exit_code: Option<i32>,
        duration_ms: u64,
    },
    SkillProposalDecided {
        skill_name: String,
        decision: String,
    },
    IdentityWriteDecided {
        agent_name: String,
        profile: String,
        decision: String,
    },
    ChannelMessageIngested {
        channel: String,
        session_id: String,
        deduped: bool,
    },
    DelegationStarted {
        parent_session_id: String,
        child_session_id: String,
        depth: u32,
    },
    DelegationFinished {
        child_session_id: String,
        duration_ms: u64,
    },
    MemoryWritten {
        scope: String,
        id: String,
    },
    MemoryDeleted {
        scope: String,
        id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ax_event");
    }
}
