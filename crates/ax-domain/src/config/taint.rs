use serde::{Deserialize, Serialize};

/// Taint-budget policy: which profile is active and the ratio threshold
/// each profile enforces for sensitive actions (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintConfig {
    #[serde(default)]
    pub profile: TaintProfile,
    #[serde(default = "d_paranoid")]
    pub paranoid_threshold: f64,
    #[serde(default = "d_balanced")]
    pub balanced_threshold: f64,
    #[serde(default = "d_yolo")]
    pub yolo_threshold: f64,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            profile: TaintProfile::default(),
            paranoid_threshold: d_paranoid(),
            balanced_threshold: d_balanced(),
            yolo_threshold: d_yolo(),
        }
    }
}

fn d_paranoid() -> f64 {
    0.10
}
fn d_balanced() -> f64 {
    0.30
}
fn d_yolo() -> f64 {
    0.60
}

impl TaintConfig {
    pub fn active_threshold(&self) -> f64 {
        self.threshold_for(self.profile)
    }

    pub fn threshold_for(&self, profile: TaintProfile) -> f64 {
        match profile {
            TaintProfile::Paranoid => self.paranoid_threshold,
            TaintProfile::Balanced => self.balanced_threshold,
            TaintProfile::Yolo => self.yolo_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaintProfile {
    Paranoid,
    #[default]
    Balanced,
    Yolo,
}
