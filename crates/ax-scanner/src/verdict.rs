//! Scan verdicts and the result of a single scan pass.

use serde::Serialize;

/// The outcome of a scan. Ordered by severity: `Pass < Flag < Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Flag,
    Block,
}

impl Verdict {
    /// Combine two verdicts, keeping the more severe one.
    pub fn escalate(self, other: Verdict) -> Verdict {
        self.max(other)
    }
}

/// The result of scanning a single piece of content, possibly across
/// multiple chained strategies.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

impl ScanResult {
    pub fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            reason: None,
            patterns: Vec::new(),
        }
    }

    /// Merge another strategy's result in, escalating the verdict and
    /// accumulating matched pattern names.
    pub fn merge(mut self, other: ScanResult) -> Self {
        if other.verdict > self.verdict {
            self.reason = other.reason.clone();
        }
        self.verdict = self.verdict.escalate(other.verdict);
        self.patterns.extend(other.patterns);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalate_keeps_stronger_verdict() {
        assert_eq!(Verdict::Pass.escalate(Verdict::Flag), Verdict::Flag);
        assert_eq!(Verdict::Flag.escalate(Verdict::Block), Verdict::Block);
        assert_eq!(Verdict::Block.escalate(Verdict::Pass), Verdict::Block);
    }

    #[test]
    fn merge_accumulates_patterns_and_escalates() {
        let a = ScanResult {
            verdict: Verdict::Flag,
            reason: Some("r1".into()),
            patterns: vec!["p1".into()],
        };
        let b = ScanResult {
            verdict: Verdict::Block,
            reason: Some("r2".into()),
            patterns: vec!["p2".into()],
        };
        let merged = a.merge(b);
        assert_eq!(merged.verdict, Verdict::Block);
        assert_eq!(merged.reason.as_deref(), Some("r2"));
        assert_eq!(merged.patterns, vec!["p1", "p2"]);
    }
}
