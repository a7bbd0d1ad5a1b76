//! Main entry point for the sequencer binary
//!
//! Wires the JSON store, the command-line solver backend and the directional
//! generator into a `Sequencer` and runs one exploration.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;

use sequencer::{
    services::{CommandSolverFactory, DirectionalGeneratorFactory, JsonModelSource, JsonlRecorder},
    Sequencer, SequencerConfig,
};
use shared::{logging, process_debug, process_info, ProcessId};

/// Explore near-optimal alternatives around a cost-minimising solution
#[derive(Parser)]
#[command(name = "sequencer")]
#[command(about = "Solves a model, relaxes its cost and explores alternative solutions with a worker pool")]
pub struct Args {
    /// Run configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Override the iteration limit
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Override the wall-clock limit in hours
    #[arg(long)]
    pub time_limit_hrs: Option<f64>,

    /// Override the cost relaxation fraction
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Override the number of workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override how many repeated results end exploration
    #[arg(long)]
    pub patience: Option<u32>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<SequencerConfig> {
        let mut config = match &self.config {
            Some(path) => SequencerConfig::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => SequencerConfig::default(),
        };

        if let Some(iterations) = self.iterations {
            config.mga.iteration_limit = iterations;
        }
        if let Some(hours) = self.time_limit_hrs {
            config.mga.time_limit_hrs = hours;
        }
        if let Some(epsilon) = self.epsilon {
            config.mga.cost_epsilon = epsilon;
        }
        if let Some(workers) = self.workers {
            config.pool.workers = workers;
        }
        if let Some(patience) = self.patience {
            config.mga.patience = patience;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ProcessId::init_sequencer();
    logging::init_tracing_with_level(Some(&args.log_level));

    let config = args.load_config()?;
    process_debug!(
        ProcessId::current(),
        "Scenario: {}, store: {}, solver: {}, workers: {}",
        config.scenario,
        config.input_store.display(),
        config.solver.name,
        config.pool.workers
    );

    let model_source = JsonModelSource::new(&config.input_store);
    let recorder = JsonlRecorder::new(&config.output_store, &config.scenario);
    let solver_factory = CommandSolverFactory::new();
    let generator_factory = DirectionalGeneratorFactory::from_settings(&config.mga);

    let mut sequencer = Sequencer::new(config, model_source, solver_factory, generator_factory, recorder)
        .context("sequencer could not be constructed")?;

    // Set up graceful shutdown
    let shutdown_sender = sequencer.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal");
                let _ = shutdown_sender.send(()).await;
            }
            Err(err) => {
                logging::log_error(ProcessId::current(), "Signal handling", &err);
            }
        }
    });

    let summary = sequencer.run().await.context("exploration run failed")?;

    process_info!(
        ProcessId::current(),
        "Base cost {:.2}, cap {:.2}, {} alternatives ({} failed), stopped: {}",
        summary.optimal_cost,
        summary.cost_cap,
        summary.iterations_recorded,
        summary.failed_iterations,
        summary
            .stop_reason()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    logging::log_success(ProcessId::current(), "Sequencer stopped gracefully");
    Ok(())
}
