//! Block pipeline binary
//!
//! Polls an Ethereum node for new blocks and runs them through the standard
//! handler chain: full transactions, optional address filter, receipts, log.

use anyhow::{Context, Result};
use blockpipe::config::load_watchlist;
use blockpipe::handlers::{AppendReceipts, AppendTransactions, BlockLogger, FilterAddress};
use blockpipe::{ChainRpc, Pipeline, PipelineConfig, PollingConfig, PollingSource, RpcClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ethereum block pipeline
#[derive(Parser)]
#[command(name = "blockpipe")]
#[command(about = "Poll Ethereum blocks and run them through a handler pipeline")]
struct Args {
    /// RPC endpoint URL (e.g., https://eth.llamarpc.com)
    #[arg(short, long, default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Milliseconds between poll cycles
    #[arg(short, long, default_value_t = 10_000)]
    interval_ms: u64,

    /// Stay this many blocks behind the confirmed head
    #[arg(long, default_value_t = 0)]
    lag_blocks: u64,

    /// Last block already processed; polling resumes after it
    #[arg(long)]
    last_known_block: Option<u64>,

    /// Number of recent blocks kept in memory
    #[arg(long, default_value_t = 50)]
    history_window: usize,

    /// Path to watchlist file (one address per line); only matching transactions are kept
    #[arg(short, long)]
    watchlist: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting block pipeline");
    info!("RPC URL: {}", args.rpc_url);

    let rpc: Arc<dyn ChainRpc> = Arc::new(RpcClient::new(args.rpc_url));

    let source = PollingSource::new(
        Arc::clone(&rpc),
        PollingConfig {
            interval: Duration::from_millis(args.interval_ms),
            last_known_block: args.last_known_block,
            lag_blocks: args.lag_blocks,
        },
    )
    .context("Invalid polling configuration")?;

    let mut pipeline = Pipeline::new(
        Arc::new(source),
        rpc,
        PipelineConfig {
            history_window_size: args.history_window,
        },
    )
    .context("Invalid pipeline configuration")?;

    pipeline.use_handler(AppendTransactions::new())?;
    if let Some(path) = &args.watchlist {
        let addresses = load_watchlist(path).context("Failed to load watchlist")?;
        info!("Loaded {} addresses to watch", addresses.len());
        pipeline.use_handler(FilterAddress::new(addresses)?)?;
    }
    pipeline
        .use_handler(AppendReceipts::new())?
        .use_handler(BlockLogger::new())?;

    info!("Running {} handlers", pipeline.handler_count().await);
    pipeline.start().await.context("Failed to start pipeline")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down gracefully...");

    pipeline.stop().await?;
    info!("Pipeline stopped");
    Ok(())
}
