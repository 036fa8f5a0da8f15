//! OCPP Central System binary
//!
//! Reads configuration from a TOML file (`--config`, `OCPP_CONFIG`, or
//! `<config_dir>/ocpp-core/config.toml`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use ocpp_core::config::{resolve_config_path, AppConfig};
use ocpp_core::{init_tracing, ServerHandle};

#[derive(Debug, Parser)]
#[command(name = "ocpp-core-server", version, about = "OCPP 1.6 / 2.0.1 central system")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Override `logging.level`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = resolve_config_path(cli.config);

    let mut config = match AppConfig::load(&path).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if cli.check {
        println!("Configuration OK: {}", path.display());
        return ExitCode::SUCCESS;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_tracing(&config);
    info!(config = %path.display(), "Configuration loaded");

    let handle = match ServerHandle::start(config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };
    info!(address = %handle.local_addr, "Press Ctrl+C to shut down gracefully");
    handle.install_signal_handler();
    handle.wait().await;
    ExitCode::SUCCESS
}
