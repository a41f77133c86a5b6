//! Concurrent timing harness: warm-up, fan-out, settle-all, report.

pub mod harness;
pub mod report;

pub use harness::Harness;
pub use report::{LatencySummary, RequestOutcome, Settled, TimingReport};
