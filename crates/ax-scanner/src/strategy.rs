//! The `ScanStrategy` trait — pluggable scanning backends.
//!
//! Concrete strategies (regex rule sets today, an ML classifier tomorrow)
//! all speak the same verdict contract so the router never has to know
//! which strategies are chained behind `CompositeScanner`.

use crate::verdict::ScanResult;

pub trait ScanStrategy: Send + Sync {
    /// A short name for this strategy, surfaced in trace events.
    fn name(&self) -> &str;

    fn scan_input(&self, content: &str) -> ScanResult;

    fn scan_output(&self, content: &str) -> ScanResult;
}
