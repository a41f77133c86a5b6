use std::time::Duration;

use loadgen_common::LoadgenError;
use serde::Serialize;

/// What one completed request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub index: usize,
    pub elapsed: Duration,
    pub total_tokens: u64,
    /// Service-side processing time in seconds, zero when not reported.
    pub total_time: f64,
    pub preview: String,
}

impl RequestOutcome {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

pub type Settled = Result<RequestOutcome, LoadgenError>;

/// Settled batch results, positioned by issue index rather than arrival order.
#[derive(Debug)]
pub struct TimingReport {
    entries: Vec<Settled>,
}

impl TimingReport {
    pub fn new(entries: Vec<Settled>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Settled] {
        &self.entries
    }

    /// Elapsed milliseconds per position; `None` where the request failed.
    pub fn timings(&self) -> Vec<Option<u64>> {
        self.entries
            .iter()
            .map(|e| e.as_ref().ok().map(RequestOutcome::elapsed_ms))
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Timings as a JSON array, failures rendered as `null`.
    pub fn timings_json(&self) -> String {
        serde_json::to_string(&self.timings()).unwrap_or_default()
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        let mut ms: Vec<u64> = self.timings().into_iter().flatten().collect();
        if ms.is_empty() {
            return None;
        }
        ms.sort_unstable();
        let count = ms.len();
        let mean_ms = ms.iter().sum::<u64>() as f64 / count as f64;
        Some(LatencySummary {
            count,
            min_ms: ms[0],
            max_ms: ms[count - 1],
            mean_ms,
            p50_ms: nearest_rank(&ms, 50.0),
            p95_ms: nearest_rank(&ms, 95.0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
}

// `sorted` must be non-empty and ascending.
fn nearest_rank(sorted: &[u64], pct: f64) -> u64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
