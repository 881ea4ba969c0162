//! sfpd-etl - SFPD incident neighborhood ETL
//!
//! Usage: `sfpd-etl [--config <file>] [--data-dir <dir>] [--skip-download]
//! [import | latest | lookup <lng> <lat> | sfpd]`
//!
//! Command output goes to stdout, logs to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use sfpd_common::config::EtlConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sfpd_etl::cli::{dotenv_warning, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may come from a local .env file
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = EtlConfig::resolve(cli.config.as_deref(), cli.data_dir.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sfpd_etl={level},sfpd_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Reported once logging is up
    if let Some(message) = dotenv_warning(&dotenv) {
        warn!("{}", message);
    }

    info!("Starting sfpd-etl {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.data_dir().display());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    sfpd_etl::pipeline::dispatch(cli.command, cli.skip_download, &config, &mut out).await?;

    Ok(())
}
