//! smarthome-link - device connectivity entry point
//!
//! Brings up the station link, waits for an address, then keeps an MQTT
//! session alive on top of it until the process is signalled.

use clap::{Parser, Subcommand};
use smarthome_link::config::DeviceConfig;
use smarthome_link::diagnostics::ConsoleDiagnostics;
use smarthome_link::link::HostLink;
use smarthome_link::observability::{
    init_default_logging, init_logging, spawn_status_monitor, LogFormat, StatusServer,
};
use smarthome_link::orchestrator::Orchestrator;
use smarthome_link::transport::mqtt::MqttSession;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};

/// Station link and MQTT session orchestrator
#[derive(Parser)]
#[command(name = "smarthome-link")]
#[command(about = "Keeps a device's wireless link and MQTT session alive")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace), overrides LOG_LEVEL
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and stay connected until SIGINT/SIGTERM
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration with secrets masked
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: &[&str] = &["device.toml", "config/device.toml"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        1 => init_logging(Level::DEBUG, LogFormat::Compact, false),
        _ => init_logging(Level::TRACE, LogFormat::Compact, true),
    }

    info!("Starting smarthome-link v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DeviceConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DeviceConfig::load_from_file(&path)?);
        }
    }

    Err(format!(
        "No configuration file found. Provide one with -c/--config or create {}",
        DEFAULT_CONFIG_PATHS[0]
    )
    .into())
}

async fn run(config: DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.mqtt.endpoint()?;
    let link = Arc::new(HostLink::new(format!("{}:{}", endpoint.host, endpoint.port)));

    let orchestrator = Orchestrator::new(config.clone(), link);
    let ctx = orchestrator.context();

    if let Some(port) = config.health.port {
        let server = StatusServer::new(ctx.clone(), port);
        tokio::spawn(server.start());
    }
    let monitor = spawn_status_monitor(ctx);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let running = tokio::select! {
        started = orchestrator.start(MqttSession::new, Arc::new(ConsoleDiagnostics)) => started?,
        _ = sigint.recv() => {
            info!("Received SIGINT during startup");
            return Ok(());
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM during startup");
            return Ok(());
        }
    };

    info!("Connectivity established, running until signalled");

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }

    monitor.abort();
    running.shutdown();
    Ok(())
}

fn handle_config_command(
    config: &DeviceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
