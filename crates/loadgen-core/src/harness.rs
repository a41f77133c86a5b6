use std::sync::Arc;

use futures::future::join_all;
use loadgen_client::{CompletionClient, CompletionRequest};
use loadgen_common::chat::Conversation;
use loadgen_common::config::LoadgenConfig;
use loadgen_common::Result;
use loadgen_obs::RunMetrics;
use tokio::time::Instant;

use crate::report::{RequestOutcome, TimingReport};

/// Issues the configured conversation against a completion client and times it.
///
/// The request body is built once; every call borrows the same value, so all
/// requests in a run carry an identical conversation and parameters.
pub struct Harness {
    client: Arc<dyn CompletionClient>,
    request: CompletionRequest,
    concurrency: usize,
    preview_chars: usize,
    metrics: Option<RunMetrics>,
}

impl Harness {
    pub fn new(client: Arc<dyn CompletionClient>, config: &LoadgenConfig) -> Self {
        Self {
            client,
            request: CompletionRequest::new(config.conversation(), &config.params),
            concurrency: config.concurrency,
            preview_chars: config.preview_chars,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.request.messages
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// One timed call. Client errors propagate unchanged.
    pub async fn run_single_request(&self, index: usize) -> Result<RequestOutcome> {
        let start = Instant::now();
        let response = self.client.complete(&self.request).await?;
        let elapsed = start.elapsed();

        let preview: String = response.text()?.chars().take(self.preview_chars).collect();
        let outcome = RequestOutcome {
            index,
            elapsed,
            total_tokens: response.total_tokens(),
            total_time: response.total_time(),
            preview,
        };
        tracing::info!(
            target: "harness",
            index,
            elapsed_ms = outcome.elapsed_ms(),
            total_tokens = outcome.total_tokens,
            total_time = outcome.total_time,
            "Request[{}]: took {} msec, total_tokens: {}, total_time: {}, result:\"{}...\"",
            index,
            outcome.elapsed_ms(),
            outcome.total_tokens,
            outcome.total_time,
            outcome.preview,
        );
        Ok(outcome)
    }

    /// Fans out `concurrency` requests on the current task and waits for all
    /// of them to settle. A failed request occupies its slot as an error.
    pub async fn run_concurrent_batch(&self, concurrency: usize) -> TimingReport {
        let settled = join_all((0..concurrency).map(|index| self.run_single_request(index))).await;

        for (index, result) in settled.iter().enumerate() {
            match result {
                Ok(outcome) => {
                    if let Some(m) = &self.metrics {
                        m.record_success(outcome.elapsed, outcome.total_tokens);
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "harness", index, error = %e, "Request[{}] failed", index);
                    if let Some(m) = &self.metrics {
                        m.record_failure();
                    }
                }
            }
        }

        let report = TimingReport::new(settled);
        tracing::info!(
            target: "harness",
            requests = report.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Timings: {}",
            report.timings_json(),
        );
        if let Some(s) = report.summary() {
            tracing::info!(
                target: "harness",
                "latency ms: min {} p50 {} p95 {} max {} mean {:.1}",
                s.min_ms, s.p50_ms, s.p95_ms, s.max_ms, s.mean_ms,
            );
        }
        report
    }

    /// Warm-up call, then one batch of the configured size.
    pub async fn run_test(&self) -> Result<TimingReport> {
        // warm-up establishes the connection before anything is measured
        self.run_single_request(0).await?;
        let report = self.run_concurrent_batch(self.concurrency).await;
        tracing::info!(target: "harness", "Finished");
        Ok(report)
    }
}
