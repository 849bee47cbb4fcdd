//! sshkey - inspect, verify and manage SSH keys and certificates

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sshkey_core::cli::{Cli, CliHandler};
use sshkey_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config may not load yet; logging falls back to its default level
    let configured = Config::load_config(cli.config.as_deref())
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let log_level = if cli.verbose { "debug".to_string() } else { configured };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sshkey_core={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("sshkey v{}", env!("CARGO_PKG_VERSION"));

    let mut handler = CliHandler::new(cli.config).await?;
    handler.handle_command(cli.command).await?;

    Ok(())
}
