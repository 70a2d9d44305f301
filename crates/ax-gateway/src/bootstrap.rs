//! AppState construction and background-task spawning, extracted from
//! `main.rs` so the HTTP entry point stays focused on wiring the listener.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};

use ax_domain::config::{Config, ConfigSeverity};
use ax_memory::FileMemoryProvider;
use ax_providers::ProviderRegistry;
use ax_queue::MessageQueue;
use ax_scanner::{CanaryStore, CompositeScanner};
use ax_sessions::{ConversationStore, IdentityResolver, LifecycleManager, SessionStore};
use ax_skills::SkillStore;
use ax_taint::TaintBudget;
use ax_tools::{HttpWebProvider, WebProvider};

use crate::audit::AuditLog;
use crate::channels::http::HttpChannelProvider;
use crate::channels::{ChannelDedup, ChannelProvider};
use crate::identity::AgentRegistry;
use crate::reply_waiter::ReplyWaiter;
use crate::router::InboundMessage;
use crate::runtime::schedules::ScheduleStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::sandbox::SubprocessSandbox;
use crate::state::AppState;

const DATA_ROOT: &str = "data";

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`]. Shared by `serve` and any future one-shot CLI command.
pub async fn build_app_state(
    config: Arc<Config>,
    shutdown: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let state_path = PathBuf::from(DATA_ROOT);
    std::fs::create_dir_all(&state_path).context("creating state directory")?;

    // ── Session management ───────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(&state_path).context("initializing session store")?);
    let conversations = Arc::new(
        ConversationStore::new(&sessions.conversations_dir()).context("initializing conversation store")?,
    );
    let identity = Arc::new(IdentityResolver::from_config(&config.sessions.identity_links));
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.lifecycle.clone()));
    let session_locks = Arc::new(SessionLockMap::new());
    tracing::info!(
        agent_id = %config.sessions.agent_id,
        dm_scope = ?config.sessions.dm_scope,
        identity_links = identity.len(),
        "session management ready"
    );

    // ── Trust boundary ───────────────────────────────────────────────
    let taint = Arc::new(TaintBudget::new(config.taint.clone()));
    let scanner = Arc::new(CompositeScanner::builtin());
    let canaries = Arc::new(CanaryStore::new());

    // ── Durable message pipeline ──────────────────────────────────────
    let queue = Arc::new(
        MessageQueue::open(&state_path.join("queue.redb")).context("opening durable message queue")?,
    );
    let sandbox: Arc<dyn crate::sandbox::SandboxProvider> = Arc::new(SubprocessSandbox);

    // ── Capability surfaces ───────────────────────────────────────────
    let skills = Arc::new(SkillStore::new(&config.sandbox.skills_root).context("loading skills")?);
    let memory: Arc<dyn ax_memory::MemoryProvider> = Arc::new(
        FileMemoryProvider::new(&state_path.join("memory")).context("initializing memory store")?,
    );
    let llm = Arc::new(ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?);
    if llm.is_empty() {
        tracing::warn!("no LLM providers initialized — /v1/models will be empty and llm_call will fail");
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }
    let web: Arc<dyn WebProvider> = Arc::new(HttpWebProvider::new().context("initializing web provider")?);
    // No browser-automation backend wired up; the "browser" feature on
    // ax-tools is off for this package (see its Cargo.toml).
    let browser: Option<Arc<dyn ax_tools::BrowserProvider>> = None;

    // ── Agent registry, audit, scheduling, channel dedup ──────────────
    let agents_root = PathBuf::from("agents");
    let agents = Arc::new(
        AgentRegistry::new(config.agents.clone(), &agents_root).context("initializing agent registry")?,
    );
    let audit = Arc::new(AuditLog::new(&config.audit.path).context("initializing audit log")?);
    let schedules = Arc::new(ScheduleStore::new(&state_path).context("initializing schedule store")?);
    let channel_dedup = Arc::new(ChannelDedup::new(
        Duration::from_secs(config.channels.dedup_ttl_secs),
        config.channels.dedup_cap,
    ));
    let channel_provider: Arc<dyn ChannelProvider> = Arc::new(HttpChannelProvider::new());
    channel_provider.connect().await.context("connecting channel provider")?;

    // ── API bearer token (read once, hash for constant-time comparison) ──
    let api_token_hash = match std::env::var("AX_API_TOKEN") {
        Ok(token) if !token.is_empty() => {
            tracing::info!("API bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!("API bearer-token auth DISABLED — set AX_API_TOKEN to enable");
            None
        }
    };

    Ok(AppState {
        config,
        sessions,
        conversations,
        identity,
        lifecycle,
        session_locks,
        taint,
        scanner,
        canaries,
        queue,
        sandbox,
        skills,
        memory,
        llm,
        web,
        browser,
        agents,
        audit,
        schedules,
        channel_dedup,
        channel_provider,
        reply_waiter: Arc::new(ReplyWaiter::new()),
        api_token_hash,
        shutdown,
    })
}

/// Spawn the long-running background tasks: session flush, the sandbox
/// orchestrator loop, scheduled-job dispatch, and workspace garbage
/// collection. Call after [`build_app_state`] when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic session flush ───────────────────────────────────────
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush() {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }

    // ── Sandbox orchestrator loop ─────────────────────────────────────
    // Polls the durable queue and runs one turn at a time per session; the
    // queue itself is the backpressure point, so a short idle poll is fine.
    {
        let state = state.clone();
        tokio::spawn(async move {
            loop {
                match crate::sandbox::run_next(&state).await {
                    Ok(Some(_outcome)) => continue,
                    Ok(None) => tokio::time::sleep(Duration::from_millis(250)).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "sandbox orchestrator iteration failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }

    // ── Scheduled-job dispatch ────────────────────────────────────────
    {
        let state = state.clone();
        let tick = Duration::from_secs(state.config.scheduler.tick_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                dispatch_due_schedules(&state).await;
            }
        });
    }

    // ── Session-lock + workspace garbage collection ──────────────────
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                state.session_locks.prune_idle();
                let max_age = Duration::from_secs(state.config.sessions.workspace_gc_age_days * 86_400);
                match crate::sandbox::workspace::prune_stale(&state.config.sandbox.workspace_root, max_age) {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(removed = n, "pruned stale session workspaces"),
                    Err(e) => tracing::warn!(error = %e, "workspace pruning failed"),
                }
            }
        });
    }

    tracing::info!("background tasks spawned");
}

/// Feed every schedule whose fire time has arrived through the same inbound
/// pipeline a channel message would use, resolved to the delivery target
/// the job was created with: an internal log entry, a specific channel
/// address, or the agent's most recently active session.
async fn dispatch_due_schedules(state: &AppState) {
    use crate::runtime::schedules::{Delivery, DeliveryTarget};

    let due = state.schedules.take_due(chrono::Utc::now());
    for job in due {
        let meta = match &job.delivery {
            Delivery::Log => {
                let _ = state.audit.record(
                    None,
                    "scheduled_job_logged",
                    serde_json::json!({"job_id": job.id, "agent_id": job.agent_id, "task": job.task}),
                );
                tracing::info!(job_id = %job.id, agent_id = %job.agent_id, task = %job.task, "scheduled job fired, log-only delivery");
                continue;
            }
            Delivery::Channel { target } if target.is_last() => {
                let Some(session_key) = state.sessions.get_last(&job.agent_id) else {
                    tracing::warn!(agent_id = %job.agent_id, job_id = %job.id, "no prior session to deliver scheduled job to, skipping");
                    continue;
                };
                let Some(session) = state.sessions.get(&session_key) else {
                    continue;
                };
                ax_domain::config::InboundMetadata {
                    channel: session.origin.channel.clone(),
                    account_id: session.origin.account.clone(),
                    peer_id: session.origin.peer.clone(),
                    group_id: session.origin.group.clone(),
                    channel_id: None,
                    thread_id: None,
                    is_direct: true,
                }
            }
            Delivery::Channel {
                target: DeliveryTarget::Address(addr),
            } => ax_domain::config::InboundMetadata {
                channel: Some(addr.provider.clone()),
                account_id: addr.identifiers.get("account").cloned(),
                peer_id: addr.identifiers.get("peer").cloned(),
                group_id: addr.identifiers.get("group").cloned(),
                channel_id: None,
                thread_id: addr.identifiers.get("thread").cloned(),
                is_direct: addr.scope == "dm",
            },
            Delivery::Channel { .. } => {
                tracing::warn!(job_id = %job.id, "scheduled job delivery target is neither 'last' nor an address, skipping");
                continue;
            }
        };

        let msg = InboundMessage {
            sender: format!("scheduler:{}", job.agent_id),
            content: job.task.clone(),
            meta,
        };

        match crate::router::process_inbound(state, msg).await {
            Ok(routed) => tracing::info!(job_id = %job.id, queued_id = routed.queued_id, "dispatched scheduled job"),
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "failed to dispatch scheduled job"),
        }
    }
}
