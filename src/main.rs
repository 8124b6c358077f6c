//! mqtt-uplink - Main Entry Point
//!
//! Loads the device configuration, wires the route probe, the rumqttc
//! session client and the periodic publisher into the orchestrator, and runs
//! until SIGINT or SIGTERM.

use clap::{Parser, Subcommand};
use mqtt_uplink::config::{DeviceConfig, PayloadKind};
use mqtt_uplink::echo::register_echo_handlers;
use mqtt_uplink::link::{ProbeSettings, RouteProbe};
use mqtt_uplink::observability::init_default_logging;
use mqtt_uplink::orchestrator::LINK_EVENT_CAPACITY;
use mqtt_uplink::periodic::{CounterPayload, PayloadSource, PeriodicPublisher, TemperatureSimulator};
use mqtt_uplink::session::SessionTarget;
use mqtt_uplink::transport::mqtt::{parse_broker_url, RumqttSessionFactory};
use mqtt_uplink::{Orchestrator, OrchestratorSettings};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// MQTT-over-TLS connectivity orchestrator
#[derive(Parser)]
#[command(name = "mqtt-uplink")]
#[command(about = "Keeps a device link and its MQTT session alive")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "UPLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring up the link and session and run until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting mqtt-uplink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_uplink(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DeviceConfig::load_from_file(path)?);
    }

    for path_str in ["uplink.toml", "config/uplink.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DeviceConfig::load_from_file(&path)?);
        }
    }

    Err("no configuration file found, pass -c/--config or create uplink.toml".into())
}

async fn run_uplink(config: DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let credential = config.credential()?;
    let trust = config.trust_store()?.map(Arc::new);
    let endpoint = parse_broker_url(&config.broker.url)?;

    info!(
        client_id = %credential.client_id(),
        broker = %config.broker.url,
        tls = endpoint.secure,
        "Device identity resolved"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (link_tx, link_rx) = mpsc::channel(LINK_EVENT_CAPACITY);

    let (probe, probe_handle) = RouteProbe::spawn(
        ProbeSettings {
            host: endpoint.host.clone(),
            port: endpoint.port,
            probe_interval: config.probe_interval(),
            retry_delay: config.link_retry_delay(),
        },
        link_tx,
        shutdown_rx.clone(),
    );

    let settings = OrchestratorSettings {
        target: SessionTarget {
            broker_url: config.broker.url.clone(),
            credential: credential.clone(),
            trust,
            keep_alive: config.keep_alive(),
            last_will_topic: config.broker.status_topic.clone(),
        },
        subscriptions: config.subscriptions.clone(),
        announce: config.announce.as_ref().map(|a| a.to_message()),
    };
    let orchestrator = Orchestrator::new(settings, RumqttSessionFactory::default(), probe);
    let bridge = orchestrator.bridge();

    if let Some(echo) = &config.echo {
        register_echo_handlers(&bridge, &config.subscriptions, &echo.topic).await?;
    }

    let source: Box<dyn PayloadSource> = match config.periodic.payload {
        PayloadKind::Counter => Box::new(CounterPayload::new(credential.client_id())),
        PayloadKind::Temperature => Box::new(TemperatureSimulator::new(credential.client_id())),
    };
    let publisher = PeriodicPublisher::new(
        bridge,
        config.periodic.topic.clone(),
        config.periodic.qos,
        config.periodic_interval(),
        source,
    );
    let publisher_handle = tokio::spawn(publisher.run(shutdown_rx.clone()));
    let mut orchestrator_handle = tokio::spawn(orchestrator.run(link_rx, shutdown_rx));

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("Uplink running, waiting for link");

    let early_exit = tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            None
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            None
        }
        result = &mut orchestrator_handle => Some(result),
    };

    let _ = shutdown_tx.send(true);

    let outcome = match early_exit {
        Some(result) => result?,
        None => orchestrator_handle.await?,
    };
    if let Err(e) = publisher_handle.await {
        warn!(error = %e, "Periodic publisher task failed");
    }
    if let Err(e) = probe_handle.await {
        warn!(error = %e, "Route probe task failed");
    }

    outcome?;
    Ok(())
}

fn handle_config_command(
    config: &DeviceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let credential = config.credential()?;
    if let Some(store) = config.trust_store()? {
        info!(anchors = store.len(), "Trust store loaded");
    }

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
        println!("# derived client id: {}", credential.client_id());
    }

    info!("Configuration validation complete");
    Ok(())
}
