//! Recipe store server with optional fault injection.
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use pantry::{server, telemetry, RecipeStore, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "In-memory recipe store with injected latency and failures")]
struct Args {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Probability that a mutation fails, between 0 and 1
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Lower bound of the injected latency in milliseconds
    #[arg(long)]
    min_delay_ms: Option<u64>,

    /// Upper bound of the injected latency in milliseconds
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Serve without injected latency or failures
    #[arg(long)]
    no_faults: bool,

    /// Let reads fail as well as mutations
    #[arg(long)]
    fail_reads: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = telemetry::DEFAULT_FILTER)]
    log: String,
}

impl Args {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(rate) = self.failure_rate {
            config.failure_rate = rate;
        }
        if let Some(min) = self.min_delay_ms {
            config.min_delay_ms = min;
        }
        if let Some(max) = self.max_delay_ms {
            config.max_delay_ms = max;
        }
        if self.no_faults {
            config.faults_enabled = false;
        }
        if self.fail_reads {
            config.fail_reads = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(&args.log).context("installing tracing subscriber")?;

    let config = args.apply(ServerConfig::from_env()?);
    let faults = config.fault_policy()?;
    info!(?faults, "fault policy");

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    let store = RecipeStore::with_shared_faults(faults);

    server::serve(listener, store, shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
