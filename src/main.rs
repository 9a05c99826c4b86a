//! SNMP device simulator CLI.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info};

use snmp_sim::{config::SimulatorConfig, sim::Simulator, sim::SimulatorEvent, utils::setup_logging, Result};

#[derive(Parser)]
#[command(name = "snmp-sim")]
#[command(about = "Large-scale SNMP v1/v2c device simulator")]
#[command(version = snmp_sim::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load configuration, start the configured device populations, and run
    Run,
    /// Validate a configuration file without starting anything
    ValidateConfig,
    /// Print a default configuration to stdout or a file
    GenerateConfig {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(&cli)?;
    setup_logging(&config.logging, &config.general.node_id)?;

    info!("starting {} v{}", snmp_sim::NAME, snmp_sim::VERSION);

    match &cli.command {
        Some(Commands::Run) | None => run_simulator(config).await,
        Some(Commands::ValidateConfig) => validate_configuration(&config),
        Some(Commands::GenerateConfig { output }) => generate_default_config(output.clone()),
    }
}

fn load_configuration(cli: &Cli) -> Result<SimulatorConfig> {
    let config = if let Some(path) = &cli.config {
        SimulatorConfig::load_from_file(path)?
    } else {
        match SimulatorConfig::load_from_env() {
            Ok(config) => config,
            Err(_) => SimulatorConfig::default_config(),
        }
    };
    config.validate()?;
    Ok(config)
}

async fn run_simulator(config: SimulatorConfig) -> Result<()> {
    let mut simulator = Simulator::new(config);
    let mut event_rx = simulator.take_event_receiver().ok_or_else(|| snmp_sim::Error::internal("failed to get event receiver"))?;

    simulator.start().await?;

    let simulator = Arc::new(Mutex::new(simulator));
    let shutdown_target = simulator.clone();

    let event_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            handle_simulator_event(event);
        }
    });

    let shutdown_task = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                let mut simulator = shutdown_target.lock().await;
                if let Err(e) = simulator.stop().await {
                    error!("error during shutdown: {}", e);
                }
            }
            Err(err) => error!("unable to listen for shutdown signal: {}", err),
        }
    });

    tokio::select! {
        _ = event_task => {}
        _ = shutdown_task => {}
    }

    info!("simulator shutdown complete");
    Ok(())
}

fn handle_simulator_event(event: SimulatorEvent) {
    match event {
        SimulatorEvent::Started => info!("simulator started"),
        SimulatorEvent::Stopped => info!("simulator stopped"),
        SimulatorEvent::PopulationStarted { class, started } => {
            info!(class = %class, started, "device population started");
        }
        SimulatorEvent::ProfileLoadFailed { class, reason } => {
            error!(class = %class, reason = %reason, "profile load failed");
        }
        SimulatorEvent::SweepReclaimed { count } => {
            info!(count, "idle sweep reclaimed devices");
        }
    }
}

fn validate_configuration(config: &SimulatorConfig) -> Result<()> {
    config.validate()?;
    println!("Configuration is valid");
    println!("  Node ID: {}", config.general.node_id);
    println!("  Default community: {}", config.snmp.default_community);
    println!("  Pool idle timeout: {}s", config.pool.idle_timeout_secs);
    println!("  Port assignments: {}", config.pool.port_assignments.len());
    println!("  Device specs: {}", config.devices.len());
    Ok(())
}

fn generate_default_config(output_path: Option<PathBuf>) -> Result<()> {
    let config = SimulatorConfig::default_config();
    let toml_content = toml::to_string_pretty(&config).map_err(|e| snmp_sim::Error::internal(format!("failed to serialize config: {}", e)))?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, toml_content)?;
            println!("Default configuration written to: {}", path.display());
        }
        None => println!("{}", toml_content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_generation_succeeds() {
        assert!(generate_default_config(None).is_ok());
    }

    #[test]
    fn default_config_validates() {
        let config = SimulatorConfig::default_config();
        assert!(validate_configuration(&config).is_ok());
    }
}
