//! Push agent - Entry point.

use clap::{Parser, Subcommand};
use push_agent::config::{Config, LogFormat};
use push_agent::{Agent, AppResult};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "push-agent", version, about = "Register this device for push notifications")]
struct Cli {
    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register (or re-register) the device
    Register {
        /// Device alias, overrides REGISTRATION__DEVICE_ALIAS
        #[arg(long)]
        alias: Option<String>,

        /// Custom user id, overrides REGISTRATION__CUSTOM_USER_ID
        #[arg(long)]
        custom_user_id: Option<String>,

        /// Comma-separated tags, overrides REGISTRATION__TAGS
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Enable or disable geofencing, overrides REGISTRATION__GEOFENCES_ENABLED
        #[arg(long)]
        geofences: Option<bool>,
    },
    /// Remove the device registration
    Unregister,
    /// Fetch geofence changes since the last sync
    RefreshGeofences,
    /// Stop monitoring locations the platform reported as triggered
    ClearLocations {
        /// Monitor request ids, e.g. geofence_12_0
        #[arg(required = true)]
        request_ids: Vec<String>,
    },
    /// Print the stored registration state as JSON
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(
        cli.log_level.as_deref().unwrap_or(&config.log.level),
        config.log.format,
    );

    if let Err(e) = run(cli.command, &config).await {
        error!(error = %e, "Command failed");
        std::process::exit(e.exit_code());
    }
}

async fn run(command: Command, config: &Config) -> AppResult<()> {
    let agent = Agent::from_config(config)?;

    match command {
        Command::Register {
            alias,
            custom_user_id,
            tags,
            geofences,
        } => {
            let mut params = config.registration.to_parameters()?;
            if alias.is_some() {
                params.device_alias = alias;
            }
            if custom_user_id.is_some() {
                params.custom_user_id = custom_user_id;
            }
            if let Some(tags) = tags {
                params = params.with_tags(tags);
            }
            if let Some(enabled) = geofences {
                params.geofences_enabled = enabled;
            }

            agent.restore_geofences().await?;
            agent.register(&params).await?;
            info!("Device registered");
        }
        Command::Unregister => {
            let params = config.registration.to_parameters()?;
            agent.unregister(&params).await?;
            info!("Device unregistered");
        }
        Command::RefreshGeofences => {
            let params = config.registration.to_parameters()?;
            agent.restore_geofences().await?;
            if agent.refresh_geofences(&params).await? {
                info!(armed = agent.monitor().armed().len(), "Geofences refreshed");
            }
        }
        Command::ClearLocations { request_ids } => {
            let cleared = agent.clear_locations(&request_ids).await?;
            info!(cleared, "Geofence locations cleared");
        }
        Command::Status => {
            let status = agent.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
