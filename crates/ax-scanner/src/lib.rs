//! Content scanning and canary-token exfiltration detection.
//!
//! Exposes a single combined contract (`scanInput`/`scanOutput`/canary
//! mint+check) over any number of chained [`strategy::ScanStrategy`]
//! implementations, per the trust-boundary scanner capability.

pub mod canary;
pub mod composite;
pub mod rules;
pub mod strategy;
pub mod verdict;

pub use canary::{check_canary, tokens_equal, CanaryStore};
pub use composite::CompositeScanner;
pub use strategy::ScanStrategy;
pub use verdict::{ScanResult, Verdict};
