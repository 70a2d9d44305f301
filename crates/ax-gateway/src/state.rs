use std::sync::Arc;

use ax_domain::config::Config;
use ax_memory::provider::MemoryProvider;
use ax_providers::ProviderRegistry;
use ax_queue::MessageQueue;
use ax_scanner::canary::CanaryStore;
use ax_scanner::composite::CompositeScanner;
use ax_sessions::{ConversationStore, IdentityResolver, LifecycleManager, SessionStore};
use ax_skills::store::SkillStore;
use ax_taint::TaintBudget;
use ax_tools::{BrowserProvider, WebProvider};

use crate::audit::AuditLog;
use crate::channels::{ChannelDedup, ChannelProvider};
use crate::identity::AgentRegistry;
use crate::reply_waiter::ReplyWaiter;
use crate::runtime::schedules::ScheduleStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::sandbox::SandboxProvider;

/// Shared application state, handed to every HTTP handler, IPC handler and
/// background task. One instance lives for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Session management ──────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub conversations: Arc<ConversationStore>,
    pub identity: Arc<IdentityResolver>,
    pub lifecycle: Arc<LifecycleManager>,
    pub session_locks: Arc<SessionLockMap>,

    // ── Trust boundary ───────────────────────────────────────────────
    pub taint: Arc<TaintBudget>,
    pub scanner: Arc<CompositeScanner>,
    pub canaries: Arc<CanaryStore>,

    // ── Durable message pipeline ──────────────────────────────────────
    pub queue: Arc<MessageQueue>,
    pub sandbox: Arc<dyn SandboxProvider>,

    // ── Capability surfaces the sandboxed agent can invoke ───────────
    pub skills: Arc<SkillStore>,
    pub memory: Arc<dyn MemoryProvider>,
    pub llm: Arc<ProviderRegistry>,
    pub web: Arc<dyn WebProvider>,
    pub browser: Option<Arc<dyn BrowserProvider>>,

    // ── Agent registry, identity policy, audit, scheduling ───────────
    pub agents: Arc<AgentRegistry>,
    pub audit: Arc<AuditLog>,
    pub schedules: Arc<ScheduleStore>,
    pub channel_dedup: Arc<ChannelDedup>,
    pub channel_provider: Arc<dyn ChannelProvider>,

    /// Correlates a durable queue id with the HTTP request awaiting its turn
    /// outcome (openai-compat chat completions, channel-ingestion replies).
    pub reply_waiter: Arc<ReplyWaiter>,

    // ── Security (computed once at startup) ──────────────────────────
    /// SHA-256 hash of the HTTP bearer token. `None` disables auth (dev mode).
    pub api_token_hash: Option<Vec<u8>>,

    /// Signaled once to begin graceful shutdown; background loops select on
    /// this alongside their normal timers and stop spawning new work once it
    /// fires.
    pub shutdown: Arc<tokio::sync::Notify>,
}
