//! Simulator binary for kubesim.
//!
//! Wires configuration, the simulated cluster, the random workload
//! submitter and a Ctrl-C stop signal together, then runs the tick loop
//! until a bound is reached or the operator interrupts it.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `kubesim-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build nodes and the scheduler
//! 4. Register the random submitter
//! 5. Install Ctrl-C as the stop signal
//! 6. Run the simulation loop
//! 7. Log the result

mod error;
mod metrics_log;
mod random_submitter;

use std::path::Path;

use kubesim_core::config::SimulationConfig;
use kubesim_core::operator::stop_channel;
use kubesim_core::runner::{self, KubeSim};
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::metrics_log::LogObserver;
use crate::random_submitter::{RandomSubmitter, SubmitterConfig};

/// Configuration file, relative to the working directory.
const CONFIG_PATH: &str = "kubesim-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the simulation fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, submitter_config) = load_config()?;

    // 2. Initialize structured logging. RUST_LOG overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        tick_seconds = config.tick,
        start_clock = config.start_clock,
        strategy = ?config.scheduler.strategy,
        max_ticks = config.simulation.max_ticks,
        "kubesim-engine starting"
    );

    // 3. Build the cluster.
    let span = info_span!("simulation");
    let mut sim = KubeSim::from_config(&config, span)?;
    if sim.state().nodes.is_empty() {
        warn!("No nodes configured, every pod will stay pending");
    }
    info!(nodes = sim.state().nodes.len(), "Cluster built");

    // 4. Register the random submitter.
    sim.add_submitter(Box::new(RandomSubmitter::from_config(&submitter_config)?));

    // 5. Stop on Ctrl-C.
    let (stop_handle, stop_signal) = stop_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => stop_handle.stop("interrupted"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    // 6. Run the simulation.
    let mut observer = LogObserver::new();
    let result = sim.run(stop_signal, &mut observer).await.map_err(EngineError::from)?;

    // 7. Log results.
    runner::log_simulation_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "kubesim-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation and submitter configuration from `kubesim-config.yaml`.
///
/// A missing file yields defaults for both.
fn load_config() -> Result<(SimulationConfig, SubmitterConfig), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if !config_path.exists() {
        return Ok((SimulationConfig::default(), SubmitterConfig::default()));
    }

    let contents = std::fs::read_to_string(config_path).map_err(|source| EngineError::Config {
        source: source.into(),
    })?;
    let config = SimulationConfig::parse(&contents)?;
    let submitter = SubmitterConfig::from_yaml(&contents)?;
    Ok((config, submitter))
}
