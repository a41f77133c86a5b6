use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use loadgen_client::HttpCompletionClient;
use loadgen_common::config::LoadgenConfig;
use loadgen_core::Harness;
use loadgen_obs::RunMetrics;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "loadgen", version, about = "Burst-load latency test for chat-completion APIs")]
struct Cli {
    /// YAML config file; falls back to $LOADGEN_CONFIG, then the built-in workload
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the batch metrics in Prometheus text format to this path
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {
            println!("Execution finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Exception: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => LoadgenConfig::from_path(path)?,
        None => LoadgenConfig::load()?,
    };
    let client = HttpCompletionClient::from_config(&config.endpoint)?;
    let metrics = RunMetrics::new().context("registering metrics")?;
    let harness = Harness::new(Arc::new(client), &config).with_metrics(metrics.clone());

    tracing::info!(
        target: "loadgen",
        model = %config.params.model,
        concurrency = harness.concurrency(),
        messages = harness.conversation().len(),
        "starting run"
    );
    harness.run_test().await?;

    if let Some(path) = cli.metrics_out {
        std::fs::write(&path, metrics.render()).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    let json = std::env::var("LOADGEN_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
