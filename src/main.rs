use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tracking_relay::{
    Handled, InMemoryContext, Relay, RelayConfig, API_GATEWAY_URL_KEY, EVENT_CODES_KEY,
};

/// Feeds newline-delimited tracking updates from stdin through the relay.
#[derive(Debug, Parser)]
#[command(name = "tracking-relay", version)]
struct Args {
    /// Topic the payloads are republished to.
    #[arg(long, default_value = "tracking-updates-out")]
    output_topic: String,

    /// Comma-separated event codes eligible for forwarding.
    #[arg(long)]
    event_codes: Option<String>,

    /// Gateway URL. Dispatch is skipped when not set.
    #[arg(long)]
    gateway_url: Option<String>,

    /// TOML file with retry and timeout settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tracking_relay=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RelayConfig::default(),
    };

    let mut context = InMemoryContext::new(&args.output_topic);
    if let Some(codes) = &args.event_codes {
        context = context.with_config(EVENT_CODES_KEY, codes);
    }
    if let Some(url) = &args.gateway_url {
        context = context.with_config(API_GATEWAY_URL_KEY, url);
    }
    let context = Arc::new(context);

    let relay = Relay::new(context, &config).context("building gateway client")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handled = 0usize;
    let mut failed = 0usize;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match relay.handle(&line).await {
            Ok(Handled::Dispatched(report)) => {
                handled += 1;
                info!(outcome = ?report.outcome, attempts = report.attempts, "dispatched");
            }
            Ok(Handled::Skipped(reason)) => {
                handled += 1;
                info!(?reason, "skipped");
            }
            Err(err) => {
                failed += 1;
                error!(error = %err, "invocation failed");
            }
        }
    }

    info!(handled, failed, "done");

    if failed > 0 {
        bail!("{failed} payload(s) failed");
    }
    Ok(())
}
