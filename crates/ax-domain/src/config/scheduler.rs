use serde::{Deserialize, Serialize};

/// Scheduler dispatch config: how often the job registry is polled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "d_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: d_tick_interval_secs(),
        }
    }
}

fn d_tick_interval_secs() -> u64 {
    30
}
