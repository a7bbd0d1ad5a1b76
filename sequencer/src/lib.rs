//! Sequencer library for exploring near-optimal alternatives
//!
//! Solves a cost-minimising base model once, caps cost at a relaxed bound
//! and then keeps a fixed pool of workers busy solving alternative
//! objectives until a limit, convergence or an abort stops the run.

pub mod config;
pub mod core;
pub mod error;
pub mod pool;
pub mod sequencer;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{BaseFailurePolicy, MgaAxis, MgaSettings, MgaWeighting, PoolSettings, SequencerConfig, SolverSettings};
pub use core::{relax_and_rebind, RelaxedModel, StopInputs, StopReason, StoppingState, COST_CAP};
pub use error::{SequencerError, SequencerResult};
pub use pool::{ShutdownReport, SubmitOutcome, WorkerExit, WorkerPool};
pub use sequencer::{RunSummary, Sequencer, SequencerPhase};
pub use traits::{
    AlternativeGenerator, GeneratorContext, GeneratorFactory, ModelSource, OutputRecorder, Solver, SolverFactory,
};
