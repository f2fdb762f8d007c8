use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use gdash_core::fetch::WeatherFetcher;
use gdash_core::queue::MemoryTransport;
use gdash_core::{
    Collector, Config, LogBuffer, OpenMeteoFetcher, QueuePublisher, RetryPolicy, run_scheduler,
};

use crate::http;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "gdash", version, about = "GDash weather pipeline daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect readings on a fixed interval and publish them to the queue.
    Collect,

    /// Serve the insights HTTP API.
    Serve {
        /// Bind address; overrides INSIGHTS_BIND.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Fetch one reading and print it as JSON.
    Fetch,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::from_env().context("Failed to read configuration")?;

        match self.command {
            Command::Collect => collect(config).await,
            Command::Serve { bind } => serve(config, bind).await,
            Command::Fetch => fetch_once(config).await,
        }
    }
}

/// Run the fetch-then-publish loop until Ctrl+C.
async fn collect(config: Config) -> Result<()> {
    let shutdown = shutdown_channel()?;

    let fetcher = OpenMeteoFetcher::new(&config)?;
    let transport = MemoryTransport::new();
    let publisher = QueuePublisher::new(
        Box::new(transport.clone()),
        config.queue_name.clone(),
        RetryPolicy::forever(config.connect_retry),
    );
    let collector = Collector::new(Box::new(fetcher), publisher);

    log::info!(
        "Collecting {} every {}s into queue {} (in-process transport; an AMQP \
         adapter for {} plugs in through QueueTransport)",
        config.location,
        config.fetch_interval.as_secs(),
        config.queue_name,
        config.rabbitmq_url
    );

    run_scheduler(config.fetch_interval, shutdown, || collector.run_once()).await;

    log::info!(
        "Stopped with {} readings in the in-process queue",
        transport.messages().len()
    );
    Ok(())
}

/// Serve the insights API until Ctrl+C.
async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let shutdown = shutdown_channel()?;

    let bind = bind.unwrap_or_else(|| config.insights_bind.clone());
    let buffer = Arc::new(LogBuffer::new(config.buffer_capacity));

    http::serve(&bind, buffer, shutdown).await
}

/// One reading on stdout, for checking coordinates and connectivity.
async fn fetch_once(config: Config) -> Result<()> {
    let fetcher = OpenMeteoFetcher::new(&config)?;

    let log = fetcher
        .fetch_current()
        .await
        .context("Failed to fetch current weather")?;

    let json = serde_json::to_string_pretty(&log).context("Failed to encode weather log")?;
    println!("{json}");

    Ok(())
}

/// Watch channel signaled by Ctrl+C. The sender lives inside the handler
/// for the rest of the process.
fn shutdown_channel() -> Result<watch::Receiver<()>> {
    let (tx, rx) = watch::channel(());

    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down gracefully...");
        tx.send(()).ok();
    })
    .context("Failed to install Ctrl+C handler")?;

    Ok(rx)
}
