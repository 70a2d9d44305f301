use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session identity, lifecycle, and conversation-store tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_agent_id")]
    pub agent_id: String,
    #[serde(default)]
    pub dm_scope: DmScope,
    #[serde(default)]
    pub identity_links: Vec<IdentityLink>,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub send_policy: SendPolicyConfig,
    /// Conversation turns retained per session before `prune` trims the head.
    #[serde(default = "d_max_turns")]
    pub max_turns: usize,
    /// Parent-channel turns to prepend when assembling thread-scope history.
    #[serde(default = "d_thread_context_turns")]
    pub thread_context_turns: usize,
    /// Age (days) after which an idle persistent-session workspace is swept.
    #[serde(default = "d_workspace_gc_age_days")]
    pub workspace_gc_age_days: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            agent_id: d_agent_id(),
            dm_scope: DmScope::default(),
            identity_links: Vec::new(),
            lifecycle: LifecycleConfig::default(),
            send_policy: SendPolicyConfig::default(),
            max_turns: d_max_turns(),
            thread_context_turns: d_thread_context_turns(),
            workspace_gc_age_days: d_workspace_gc_age_days(),
        }
    }
}

fn d_agent_id() -> String {
    "default".into()
}
fn d_max_turns() -> usize {
    200
}
fn d_thread_context_turns() -> usize {
    20
}
fn d_workspace_gc_age_days() -> u64 {
    7
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DmScope {
    Main,
    PerPeer,
    #[default]
    PerChannelPeer,
    PerAccountChannelPeer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLink {
    pub canonical: String,
    pub peer_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "d_daily_reset_hour")]
    pub daily_reset_hour: Option<u8>,
    #[serde(default = "d_idle_minutes")]
    pub idle_minutes: Option<u64>,
    #[serde(default)]
    pub reset_by_channel: HashMap<String, ResetOverride>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            daily_reset_hour: d_daily_reset_hour(),
            idle_minutes: d_idle_minutes(),
            reset_by_channel: HashMap::new(),
        }
    }
}

fn d_daily_reset_hour() -> Option<u8> {
    Some(4)
}
fn d_idle_minutes() -> Option<u64> {
    None
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetOverride {
    pub daily_reset_hour: Option<u8>,
    pub idle_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPolicyConfig {
    #[serde(default)]
    pub default: SendPolicyMode,
    /// Groups/channels are denied by default unless explicitly allow-listed.
    #[serde(default = "d_true")]
    pub deny_groups: bool,
    #[serde(default)]
    pub channel_overrides: HashMap<String, SendPolicyMode>,
}

impl Default for SendPolicyConfig {
    fn default() -> Self {
        Self {
            default: SendPolicyMode::default(),
            deny_groups: true,
            channel_overrides: HashMap::new(),
        }
    }
}

fn d_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SendPolicyMode {
    #[default]
    Allow,
    Deny,
}

/// Metadata describing where an inbound message came from, used to compute
/// the session key and to evaluate thread/bootstrap gates.
#[derive(Debug, Clone, Default)]
pub struct InboundMetadata {
    pub channel: Option<String>,
    pub account_id: Option<String>,
    pub peer_id: Option<String>,
    pub group_id: Option<String>,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub is_direct: bool,
}
