//! Collaborator boundaries with mockall annotations for testing
//!
//! The sequencer only sequences work. Loading data, solving, choosing
//! alternative objectives and persisting results all sit behind these traits
//! and are injected at construction time.

use std::sync::Arc;

use shared::{Candidate, Model, ProblemInstance, SolveResult, SolverOutput};

use crate::config::{MgaAxis, MgaWeighting, SolverSettings};
use crate::error::SequencerResult;

/// Source of the base optimization model
///
/// Covers reading input data from the store and building the solver-ready
/// base instance from it.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ModelSource: Send + Sync {
    /// Load data and build the cost-minimising base model
    async fn load_base_model(&self) -> SequencerResult<Model>;
}

/// Optimization solver backend
#[mockall::automock]
#[async_trait::async_trait]
pub trait Solver: Send + Sync {
    /// Solve one instance and report its termination status and solution
    ///
    /// Backends doing heavy synchronous work should move it off the async
    /// runtime (for example with `tokio::task::spawn_blocking`).
    async fn solve(&self, instance: &ProblemInstance) -> SequencerResult<SolverOutput>;
}

/// Builds solver handles for the base solve and for each worker
#[mockall::automock]
pub trait SolverFactory: Send + Sync {
    /// Create a solver for the configured backend
    fn create_solver(&self, settings: &SolverSettings) -> SequencerResult<Arc<dyn Solver>>;
}

/// Everything a generator needs to know about the relaxed problem
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    /// Working model: cost objective removed, cost cap constraint added
    pub model: Model,
    pub optimal_cost: f64,
    pub cost_relaxation: f64,
    pub cost_cap: f64,
    pub axis: MgaAxis,
    pub weighting: MgaWeighting,
    pub seed: Option<u64>,
}

/// Producer of alternative instances and owner of convergence bookkeeping
///
/// The sequencer never inspects generator state beyond these operations.
#[mockall::automock]
#[async_trait::async_trait]
pub trait AlternativeGenerator: Send {
    /// Next candidate, `Candidate::Wait` to hold off, or `None` when the
    /// sequence is finished
    async fn next_candidate(&mut self) -> SequencerResult<Option<Candidate>>;

    /// Record a solve result and update convergence state
    async fn process_result(&mut self, result: &SolveResult) -> SequencerResult<()>;

    /// Whether exploration is exhausted
    fn stop_resolving(&self) -> bool;

    /// Flush any accumulated tracking output
    async fn finalize(&mut self) -> SequencerResult<()>;
}

/// Builds the generator once the relaxed model exists
#[mockall::automock]
pub trait GeneratorFactory: Send + Sync {
    fn build(&self, context: GeneratorContext) -> SequencerResult<Box<dyn AlternativeGenerator>>;
}

/// Output side of the store
#[mockall::automock]
#[async_trait::async_trait]
pub trait OutputRecorder: Send + Sync {
    /// Remove records of earlier runs under the current scenario label
    ///
    /// # Returns
    /// Number of records removed
    async fn clear_prior_run_records(&self) -> SequencerResult<usize>;

    /// Record the base solve (iteration 0)
    async fn write_base_result(&self, result: &SolveResult) -> SequencerResult<()>;

    /// Record one alternative solve under its iteration number
    async fn write_iteration_result(&self, result: &SolveResult, iteration: u32) -> SequencerResult<()>;

    /// Release the store
    async fn close(&self) -> SequencerResult<()>;
}
