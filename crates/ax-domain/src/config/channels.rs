use serde::{Deserialize, Serialize};

/// Channel ingestion tuning: dedup window, thread backfill depth (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default = "d_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    #[serde(default = "d_dedup_cap")]
    pub dedup_cap: usize,
    #[serde(default = "d_thread_backfill_limit")]
    pub thread_backfill_limit: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: d_dedup_ttl_secs(),
            dedup_cap: d_dedup_cap(),
            thread_backfill_limit: d_thread_backfill_limit(),
        }
    }
}

fn d_dedup_ttl_secs() -> u64 {
    60
}
fn d_dedup_cap() -> usize {
    1_000
}
fn d_thread_backfill_limit() -> usize {
    20
}
