//! Device Duel - instant tech comparisons with follow-up chat
//!
//! Main entry point for the `duel` binary.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use device_duel::cli::{Cli, Commands};
use device_duel::commands;
use device_duel::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let (config, warnings) = Config::load_with_warnings(config_path, &cli)?;

    init_tracing(cli.verbose, config.logging.json);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting backend server");
            commands::run_serve(config).await?;
            Ok(())
        }
        Commands::Compare {
            device_one,
            device_two,
            ..
        } => {
            tracing::debug!("Starting interactive comparison client");
            commands::run_compare(config, device_one, device_two).await?;
            Ok(())
        }
    }
}

/// Initialize tracing
///
/// `RUST_LOG` wins over the default filter.
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "device_duel=debug"
    } else {
        "device_duel=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
