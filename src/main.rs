//! Server entry point: parse the CLI, init tracing, serve.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use matchline::{Config, Server};

#[derive(Parser, Debug)]
#[command(name = "matchline", about = "Limit order book matching engine")]
struct Cli {
    /// TCP port to listen on
    port: u16,

    /// Seconds a session may sit idle before being reaped
    #[arg(long, default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Shared secret clients present with AUTH
    #[arg(long, default_value = "pawy")]
    passkey: String,

    /// Secret for DEBUG AUTH
    #[arg(long, default_value = "123456")]
    admin_secret: String,

    /// Instruments listed at startup
    #[arg(long, value_delimiter = ',', default_value = "TSLA")]
    symbols: Vec<String>,

    /// Group name that receives L1 market-data updates
    #[arg(long, default_value = "F1")]
    md_group: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("matchline=info")),
        )
        .init();

    let cli = Cli::parse();
    info!(port = cli.port, symbols = ?cli.symbols, "starting");

    let config = Config {
        port: cli.port,
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
        passkey: cli.passkey,
        admin_secret: cli.admin_secret,
        symbols: cli.symbols,
        md_group: cli.md_group,
    };

    let server = Server::bind(config).await?;
    server.run().await
}
