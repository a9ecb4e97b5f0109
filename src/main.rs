mod cli;
mod config;
mod error;
mod models;
mod resolver;
mod shell;
mod surface;
mod switcher;
mod utils;
mod watcher;

use anyhow::Result;
use cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout may be eval'd by the calling shell
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::new();
    cli.run().await.map_err(|e| anyhow::anyhow!(e))
}
