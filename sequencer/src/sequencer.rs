//! Main sequencer implementation
//!
//! Owns the run from data load to finalize: solves the base instance, turns
//! its cost into a ceiling, starts the worker pool and feeds it alternatives
//! until the stopping state says otherwise, then shuts the pool down.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use shared::{
    logging, process_debug, process_error, process_info, process_warn, Candidate, InstanceId, Model, ProblemInstance,
    ProcessId, SolveResult,
};

use crate::config::{BaseFailurePolicy, MgaAxis, MgaWeighting, SequencerConfig};
use crate::core::{relax_and_rebind, RelaxedModel, StopInputs, StopReason, StoppingState};
use crate::error::{SequencerError, SequencerResult};
use crate::pool::{ShutdownReport, SubmitOutcome, WorkerExit, WorkerPool};
use crate::traits::{AlternativeGenerator, GeneratorContext, GeneratorFactory, ModelSource, OutputRecorder, SolverFactory};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPhase {
    Init,
    BaseSolve,
    RelaxAndRebind,
    PoolStart,
    Iterate,
    DrainAndStop,
    Finalize,
    Done,
}

impl fmt::Display for SequencerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequencerPhase::Init => "INIT",
            SequencerPhase::BaseSolve => "BASE_SOLVE",
            SequencerPhase::RelaxAndRebind => "RELAX_AND_REBIND",
            SequencerPhase::PoolStart => "POOL_START",
            SequencerPhase::Iterate => "ITERATE",
            SequencerPhase::DrainAndStop => "DRAIN_AND_STOP",
            SequencerPhase::Finalize => "FINALIZE",
            SequencerPhase::Done => "DONE",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub base: SolveResult,
    pub optimal_cost: f64,
    pub cost_cap: f64,
    /// Alternative results recorded, numbered 1..=iterations_recorded
    pub iterations_recorded: u32,
    pub failed_iterations: u32,
    pub stop: StoppingState,
    pub elapsed: Duration,
    pub late_results: usize,
    pub max_in_flight: usize,
    pub worker_exits: Vec<WorkerExit>,
}

impl RunSummary {
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop.primary_reason()
    }
}

/// Counters carried between rounds of the iterate loop
struct IterateOutcome {
    iterations: u32,
    failed: u32,
    stopping: StoppingState,
}

/// Sequencer for one exploration run, with injected collaborators
pub struct Sequencer<M, S, G, R>
where
    M: ModelSource + Send + Sync + 'static,
    S: SolverFactory + Send + Sync + 'static,
    G: GeneratorFactory + Send + Sync + 'static,
    R: OutputRecorder + Send + Sync + 'static,
{
    config: SequencerConfig,

    /// Injected services
    model_source: M,
    solver_factory: S,
    generator_factory: G,
    recorder: R,

    phase: SequencerPhase,

    /// External abort signal, checked once per loop round
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<M, S, G, R> Sequencer<M, S, G, R>
where
    M: ModelSource + Send + Sync + 'static,
    S: SolverFactory + Send + Sync + 'static,
    G: GeneratorFactory + Send + Sync + 'static,
    R: OutputRecorder + Send + Sync + 'static,
{
    /// Create a sequencer; fails before any run starts if the configuration
    /// is invalid or the stores differ
    pub fn new(
        mut config: SequencerConfig,
        model_source: M,
        solver_factory: S,
        generator_factory: G,
        recorder: R,
    ) -> SequencerResult<Self> {
        config.prepare();
        config.validate()?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok(Self {
            config,
            model_source,
            solver_factory,
            generator_factory,
            recorder,
            phase: SequencerPhase::Init,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn phase(&self) -> SequencerPhase {
        self.phase
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Get shutdown sender for graceful shutdown
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    fn enter(&mut self, phase: SequencerPhase) {
        logging::log_progress(ProcessId::current(), "Phase", &format!("{} -> {}", self.phase, phase));
        self.phase = phase;
    }

    /// Run the whole exploration
    ///
    /// The recorder is closed on every exit path; a run that fails part way
    /// still releases the store before the error is returned.
    pub async fn run(&mut self) -> SequencerResult<RunSummary> {
        let outcome = self.run_phases().await;
        if outcome.is_err() {
            if let Err(e) = self.recorder.close().await {
                process_warn!(ProcessId::current(), "Failed to close result store after aborted run: {}", e);
            }
        }
        outcome
    }

    async fn run_phases(&mut self) -> SequencerResult<RunSummary> {
        let pid = ProcessId::current();
        let started = Instant::now();
        logging::log_startup(pid, &format!("exploration run for scenario '{}'", self.config.scenario));

        // INIT
        let cleared = self.recorder.clear_prior_run_records().await?;
        if cleared > 0 {
            process_info!(pid, "🧹 Cleared {} records from earlier runs of '{}'", cleared, self.config.scenario);
        }
        let base_model = self.model_source.load_base_model().await?;
        base_model.validate()?;
        process_info!(
            pid,
            "📦 Loaded base model '{}' ({} variables, {} constraints)",
            base_model.name,
            base_model.variables.len(),
            base_model.constraints.len()
        );

        // BASE_SOLVE
        self.enter(SequencerPhase::BaseSolve);
        let base = self.solve_base(&base_model).await?;
        self.recorder.write_base_result(&base).await?;
        let optimal_cost = self.check_base(&base)?;
        process_info!(pid, "Completed initial solve with total cost: {:.2}", optimal_cost);

        // RELAX_AND_REBIND
        self.enter(SequencerPhase::RelaxAndRebind);
        process_info!(pid, "Relaxing cost by fraction: {:.3}", self.config.mga.cost_epsilon);
        let relaxed = relax_and_rebind(base_model, optimal_cost, self.config.mga.cost_epsilon)?;
        process_info!(pid, "Cost cap set at {:.2}", relaxed.cost_cap);
        let cost_cap = relaxed.cost_cap;
        let mut generator = self.generator_factory.build(self.generator_context(relaxed))?;

        // POOL_START
        self.enter(SequencerPhase::PoolStart);
        let mut pool = WorkerPool::start(&self.config.pool, &self.solver_factory, &self.config.solver)?;

        // ITERATE
        self.enter(SequencerPhase::Iterate);
        let iterated = self.iterate(&mut pool, generator.as_mut(), started).await;
        let max_in_flight = pool.max_in_flight();

        // DRAIN_AND_STOP
        self.enter(SequencerPhase::DrainAndStop);
        let report = pool.shutdown().await;
        log_late_results(&report);

        let outcome = match iterated {
            Ok(outcome) => outcome,
            Err(e) => {
                logging::log_error(pid, "Exploration loop", &e);
                return Err(e);
            }
        };

        // FINALIZE
        self.enter(SequencerPhase::Finalize);
        generator.finalize().await?;
        self.recorder.close().await?;
        self.enter(SequencerPhase::Done);

        let summary = RunSummary {
            base,
            optimal_cost,
            cost_cap,
            iterations_recorded: outcome.iterations,
            failed_iterations: outcome.failed,
            stop: outcome.stopping,
            elapsed: started.elapsed(),
            late_results: report.late_results.len(),
            max_in_flight,
            worker_exits: report.exits,
        };
        logging::log_success(
            pid,
            &format!(
                "Exploration finished after {} alternatives ({} failed) in {:.1}s",
                summary.iterations_recorded,
                summary.failed_iterations,
                summary.elapsed.as_secs_f64()
            ),
        );
        Ok(summary)
    }

    /// Solve the base instance with a solver handle owned by the sequencer
    ///
    /// A backend error is turned into a failed result so the base record is
    /// always written.
    async fn solve_base(&self, model: &Model) -> SequencerResult<SolveResult> {
        let pid = ProcessId::current();
        let solver = self.solver_factory.create_solver(&self.config.solver)?;
        let instance = ProblemInstance::new(format!("{}_base", self.config.scenario), model.clone());

        let tic = Instant::now();
        let solved = solver.solve(&instance).await;
        let elapsed = tic.elapsed();

        let result = match solved {
            Ok(output) => SolveResult::from_output(InstanceId::BASE, instance.label, None, elapsed, output),
            Err(e) => SolveResult::faulted(InstanceId::BASE, instance.label, None, elapsed, e.to_string()),
        };
        process_info!(pid, "Initial solve time: {:.4}s", elapsed.as_secs_f64());
        process_debug!(pid, "Termination condition: {}", result.status);
        Ok(result)
    }

    /// Decide whether the run can go on after the base solve
    fn check_base(&self, base: &SolveResult) -> SequencerResult<f64> {
        let pid = ProcessId::current();

        if !base.is_optimal() {
            process_error!(pid, "Abnormal termination condition on baseline solve: {}", base.status);
            if let Some(fault) = &base.fault {
                process_error!(pid, "Baseline solve fault: {}", fault);
            }
            match self.config.base_failure {
                BaseFailurePolicy::Abort => return Err(SequencerError::BaseSolveFailed { status: base.status }),
                BaseFailurePolicy::Continue => {
                    process_warn!(pid, "Continuing after non-optimal baseline solve as configured");
                }
            }
        }

        base.objective_value
            .filter(|v| v.is_finite())
            .ok_or(SequencerError::BaseSolveFailed { status: base.status })
    }

    fn generator_context(&self, relaxed: RelaxedModel) -> GeneratorContext {
        GeneratorContext {
            model: relaxed.model,
            optimal_cost: relaxed.optimal_cost,
            cost_relaxation: relaxed.cost_relaxation,
            cost_cap: relaxed.cost_cap,
            axis: self.config.mga.axis.unwrap_or(MgaAxis::CategoryActivity),
            weighting: self.config.mga.weighting.unwrap_or(MgaWeighting::HullExpansion),
            seed: self.config.mga.seed,
        }
    }

    fn abort_requested(&mut self) -> bool {
        self.shutdown_rx.try_recv().is_ok()
    }

    /// The main loop: pull, submit, drain, record, re-evaluate
    async fn iterate(
        &mut self,
        pool: &mut WorkerPool,
        generator: &mut dyn AlternativeGenerator,
        started: Instant,
    ) -> SequencerResult<IterateOutcome> {
        let pid = ProcessId::current();
        let iteration_limit = self.config.mga.iteration_limit;
        let time_limit = self.config.mga.time_limit();
        let poll_interval = self.config.pool.poll_interval();

        let mut stopping = StoppingState::new();
        let mut iterations: u32 = 0;
        let mut failed: u32 = 0;
        let mut pending: Option<ProblemInstance> = None;
        let mut waiting = false;
        let mut sequence_done = false;

        loop {
            let generator_exhausted =
                generator.stop_resolving() || (sequence_done && pending.is_none() && pool.in_flight() == 0);
            stopping = stopping.advance(&StopInputs {
                generator_exhausted,
                completed_iterations: iterations,
                iteration_limit,
                elapsed: started.elapsed(),
                time_limit,
                abort_requested: self.abort_requested(),
            });
            if stopping.should_stop() {
                break;
            }

            let mut progressed = false;

            // 1. pull, unless holding an unsubmitted instance or waiting on results
            if waiting && pending.is_none() && pool.in_flight() == 0 {
                process_debug!(pid, "Generator asked to wait with nothing in flight; pulling again");
                waiting = false;
            }
            if pending.is_none() && !waiting && !sequence_done {
                match generator.next_candidate().await? {
                    Some(Candidate::Instance(instance)) => pending = Some(instance),
                    Some(Candidate::Wait) => {
                        process_debug!(pid, "Generator waiting for more results");
                        waiting = true;
                    }
                    None => {
                        process_debug!(pid, "Generator candidate sequence finished");
                        sequence_done = true;
                    }
                }
            }

            // 2. non-blocking submit; a full channel keeps the instance for next round
            if let Some(instance) = pending.take() {
                match pool.try_submit(instance)? {
                    SubmitOutcome::Submitted(id) => {
                        process_debug!(pid, "Submitted instance {} ({} in flight)", id, pool.in_flight());
                        progressed = true;
                    }
                    SubmitOutcome::Full(instance) => pending = Some(instance),
                }
            }

            // 3-4. non-blocking drain; a result feeds the generator and the recorder
            if let Some(result) = pool.try_next_result() {
                progressed = true;
                waiting = false;
                generator.process_result(&result).await?;
                iterations += 1;
                if !result.is_optimal() {
                    failed += 1;
                }
                self.recorder.write_iteration_result(&result, iterations).await?;
                log_iteration(&result, iterations, iteration_limit);
            }

            if !progressed {
                tokio::time::sleep(poll_interval).await;
            }
        }

        match stopping.primary_reason() {
            Some(StopReason::Converged) => {
                process_info!(pid, "🎯 Exploration converged after {} alternatives", iterations);
            }
            Some(reason) => logging::log_shutdown(pid, &format!("{reason} after {iterations} alternatives")),
            None => {}
        }

        Ok(IterateOutcome {
            iterations,
            failed,
            stopping,
        })
    }
}

fn log_iteration(result: &SolveResult, iteration: u32, limit: u32) {
    let pid = ProcessId::current();
    if result.is_optimal() {
        process_info!(
            pid,
            "Solve #{}/{} ({}) time: {:.4}s. Status: {}",
            iteration,
            limit,
            result.label,
            result.elapsed.as_secs_f64(),
            result.status
        );
    } else {
        process_warn!(
            pid,
            "Solve #{}/{} ({}) failed with status {}{}",
            iteration,
            limit,
            result.label,
            result.status,
            result.fault.as_deref().map(|f| format!(": {f}")).unwrap_or_default()
        );
    }
}

fn log_late_results(report: &ShutdownReport) {
    let pid = ProcessId::current();
    for result in &report.late_results {
        process_warn!(
            pid,
            "Discarding result {} ({}) that arrived after the loop stopped",
            result.instance_id,
            result.label
        );
    }
    if report.alive_after > 0 {
        process_error!(pid, "{} workers still alive after shutdown", report.alive_after);
    }
}
