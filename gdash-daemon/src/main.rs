//! Binary crate for the GDash weather daemon.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Wiring configuration into the collector and the insights API
//! - Process lifecycle: logging setup and graceful shutdown

use clap::Parser;

mod cli;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let cmd = cli::Cli::parse();
    cmd.run().await
}
