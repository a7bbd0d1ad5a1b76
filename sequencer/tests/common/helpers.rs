//! Test helpers and builder patterns for sequencer tests
//!
//! Scripted collaborators record what the sequencer does with them so tests
//! can assert on instances solved, results ingested and records written.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use sequencer::{
    AlternativeGenerator, BaseFailurePolicy, GeneratorContext, GeneratorFactory, ModelSource, OutputRecorder, RunSummary,
    Sequencer, SequencerConfig, SequencerError, SequencerResult, Solver, SolverFactory, SolverSettings,
};
use shared::{Candidate, LinearExpr, Model, Objective, ProblemInstance, SolveResult, SolverOutput, TerminationStatus};

use super::fixtures::TestFixtures;

pub type TestSequencer = Sequencer<FixedModelSource, ScriptedSolverFactory, ScriptedGeneratorFactory, MemoryRecorder>;

/// Model source returning a fixed model
pub struct FixedModelSource(pub Model);

#[async_trait]
impl ModelSource for FixedModelSource {
    async fn load_base_model(&self) -> SequencerResult<Model> {
        Ok(self.0.clone())
    }
}

/// Solver whose behaviour is driven by the instance label
///
/// The base instance (cost objective) gets `base_status`; labels ending in
/// `_fault` fail, labels ending in `_panic` panic, everything else is optimal.
pub struct ScriptedSolver {
    base_status: TerminationStatus,
    delay: Duration,
    seen: Arc<Mutex<Vec<ProblemInstance>>>,
}

#[async_trait]
impl Solver for ScriptedSolver {
    async fn solve(&self, instance: &ProblemInstance) -> SequencerResult<SolverOutput> {
        self.seen.lock().unwrap().push(instance.clone());

        let is_base = instance
            .model
            .objective
            .as_ref()
            .map(|o| o.name == TestFixtures::COST_OBJECTIVE)
            .unwrap_or(false);
        if is_base {
            let mut output = SolverOutput::with_status(self.base_status);
            output.objective_value = Some(TestFixtures::BASE_COST);
            return Ok(output);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if instance.label.ends_with("_fault") {
            return Err(SequencerError::solver("numerical trouble"));
        }
        if instance.label.ends_with("_panic") {
            panic!("solver crashed on {}", instance.label);
        }

        let n = instance.label.len() as f64;
        let values = [("wind".to_string(), n)].into_iter().collect();
        Ok(SolverOutput::optimal(TestFixtures::BASE_COST, values))
    }
}

#[derive(Clone)]
pub struct ScriptedSolverFactory {
    pub base_status: TerminationStatus,
    pub delay: Duration,
    pub seen: Arc<Mutex<Vec<ProblemInstance>>>,
    pub created: Arc<AtomicUsize>,
}

impl SolverFactory for ScriptedSolverFactory {
    fn create_solver(&self, _settings: &SolverSettings) -> SequencerResult<Arc<dyn Solver>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSolver {
            base_status: self.base_status,
            delay: self.delay,
            seen: Arc::clone(&self.seen),
        }))
    }
}

/// How the scripted generator behaves
#[derive(Debug, Clone, Default)]
pub struct GeneratorPlan {
    /// Finite candidate sequence length
    pub max_candidates: Option<usize>,
    /// Yield `Wait` while this many candidates are unprocessed
    pub wait_at: Option<usize>,
    /// Declare convergence after this many processed results
    pub converge_after: Option<usize>,
    /// 1-based candidate numbers whose solve fails
    pub fault_at: Vec<usize>,
    /// 1-based candidate numbers whose solve panics
    pub panic_at: Vec<usize>,
}

/// Observations shared between a test and its generator
#[derive(Default)]
pub struct GeneratorTally {
    pub emitted: AtomicUsize,
    pub processed: AtomicUsize,
    pub waits: AtomicUsize,
    pub max_outstanding: AtomicUsize,
    pub finalized: AtomicBool,
    pub context: Mutex<Option<GeneratorContext>>,
}

pub struct ScriptedGenerator {
    model: Model,
    plan: GeneratorPlan,
    tally: Arc<GeneratorTally>,
    emitted: usize,
    processed: usize,
}

#[async_trait]
impl AlternativeGenerator for ScriptedGenerator {
    async fn next_candidate(&mut self) -> SequencerResult<Option<Candidate>> {
        if let Some(max) = self.plan.max_candidates {
            if self.emitted >= max {
                return Ok(None);
            }
        }
        let outstanding = self.emitted - self.processed;
        if let Some(limit) = self.plan.wait_at {
            if outstanding >= limit {
                self.tally.waits.fetch_add(1, Ordering::SeqCst);
                return Ok(Some(Candidate::Wait));
            }
        }

        self.emitted += 1;
        self.tally.emitted.store(self.emitted, Ordering::SeqCst);
        self.tally.max_outstanding.fetch_max(outstanding + 1, Ordering::SeqCst);

        let n = self.emitted;
        let label = if self.plan.fault_at.contains(&n) {
            format!("alt_{n}_fault")
        } else if self.plan.panic_at.contains(&n) {
            format!("alt_{n}_panic")
        } else {
            format!("alt_{n}")
        };
        let objective = Objective::maximize(label.clone(), LinearExpr::from_terms([("wind", 1.0), ("solar", 1.0)]));
        Ok(Some(Candidate::Instance(ProblemInstance::new(
            label,
            self.model.with_objective(objective),
        ))))
    }

    async fn process_result(&mut self, _result: &SolveResult) -> SequencerResult<()> {
        self.processed += 1;
        self.tally.processed.store(self.processed, Ordering::SeqCst);
        Ok(())
    }

    fn stop_resolving(&self) -> bool {
        self.plan.converge_after.map(|n| self.processed >= n).unwrap_or(false)
    }

    async fn finalize(&mut self) -> SequencerResult<()> {
        self.tally.finalized.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ScriptedGeneratorFactory {
    pub plan: GeneratorPlan,
    pub tally: Arc<GeneratorTally>,
}

impl GeneratorFactory for ScriptedGeneratorFactory {
    fn build(&self, context: GeneratorContext) -> SequencerResult<Box<dyn AlternativeGenerator>> {
        let model = context.model.clone();
        *self.tally.context.lock().unwrap() = Some(context);
        Ok(Box::new(ScriptedGenerator {
            model,
            plan: self.plan.clone(),
            tally: Arc::clone(&self.tally),
            emitted: 0,
            processed: 0,
        }))
    }
}

/// Everything the recorder was asked to do
#[derive(Default)]
pub struct RecorderLog {
    pub clears: usize,
    pub base: Option<SolveResult>,
    pub iterations: Vec<(u32, SolveResult)>,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct MemoryRecorder {
    pub log: Arc<Mutex<RecorderLog>>,
}

impl MemoryRecorder {
    pub fn iteration_numbers(&self) -> Vec<u32> {
        self.log.lock().unwrap().iterations.iter().map(|(n, _)| *n).collect()
    }

    pub fn iteration_results(&self) -> Vec<SolveResult> {
        self.log.lock().unwrap().iterations.iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl OutputRecorder for MemoryRecorder {
    async fn clear_prior_run_records(&self) -> SequencerResult<usize> {
        self.log.lock().unwrap().clears += 1;
        Ok(0)
    }

    async fn write_base_result(&self, result: &SolveResult) -> SequencerResult<()> {
        self.log.lock().unwrap().base = Some(result.clone());
        Ok(())
    }

    async fn write_iteration_result(&self, result: &SolveResult, iteration: u32) -> SequencerResult<()> {
        self.log.lock().unwrap().iterations.push((iteration, result.clone()));
        Ok(())
    }

    async fn close(&self) -> SequencerResult<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Handles kept by a test after the sequencer is built
pub struct TestHandles {
    pub recorder: MemoryRecorder,
    pub tally: Arc<GeneratorTally>,
    pub solved: Arc<Mutex<Vec<ProblemInstance>>>,
    pub solvers_created: Arc<AtomicUsize>,
    pub store: TempDir,
}

/// Builder for test sequencers with sensible defaults
pub struct SequencerBuilder {
    store: TempDir,
    config: SequencerConfig,
    output_store: Option<PathBuf>,
    base_status: TerminationStatus,
    delay: Duration,
    plan: GeneratorPlan,
}

impl SequencerBuilder {
    pub fn new() -> Self {
        let store = tempfile::tempdir().unwrap();
        let config = TestFixtures::config(store.path());
        Self {
            store,
            config,
            output_store: None,
            base_status: TerminationStatus::Optimal,
            delay: Duration::ZERO,
            plan: GeneratorPlan::default(),
        }
    }

    pub fn with_iteration_limit(mut self, limit: u32) -> Self {
        self.config.mga.iteration_limit = limit;
        self
    }

    pub fn with_time_limit_hrs(mut self, hours: f64) -> Self {
        self.config.mga.time_limit_hrs = hours;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.pool.workers = workers;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.pool.work_capacity = capacity;
        self.config.pool.result_capacity = capacity;
        self
    }

    pub fn with_base_status(mut self, status: TerminationStatus) -> Self {
        self.base_status = status;
        self
    }

    pub fn with_base_failure(mut self, policy: BaseFailurePolicy) -> Self {
        self.config.base_failure = policy;
        self
    }

    pub fn with_solve_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_plan(mut self, plan: GeneratorPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Point the output store somewhere other than the input store
    pub fn with_separate_output_store(mut self) -> Self {
        self.output_store = Some(self.store.path().join("elsewhere"));
        self
    }

    pub fn try_build(self) -> (SequencerResult<TestSequencer>, TestHandles) {
        let mut config = self.config;
        if let Some(output) = self.output_store {
            config.output_store = output;
        }

        let recorder = MemoryRecorder::default();
        let tally = Arc::new(GeneratorTally::default());
        let solved = Arc::new(Mutex::new(Vec::new()));
        let solvers_created = Arc::new(AtomicUsize::new(0));

        let solver_factory = ScriptedSolverFactory {
            base_status: self.base_status,
            delay: self.delay,
            seen: Arc::clone(&solved),
            created: Arc::clone(&solvers_created),
        };
        let generator_factory = ScriptedGeneratorFactory {
            plan: self.plan,
            tally: Arc::clone(&tally),
        };

        let sequencer = Sequencer::new(
            config,
            FixedModelSource(TestFixtures::base_model()),
            solver_factory,
            generator_factory,
            recorder.clone(),
        );

        let handles = TestHandles {
            recorder,
            tally,
            solved,
            solvers_created,
            store: self.store,
        };
        (sequencer, handles)
    }

    pub fn build(self) -> (TestSequencer, TestHandles) {
        let (sequencer, handles) = self.try_build();
        (sequencer.unwrap(), handles)
    }
}

/// Common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Run with a generous timeout so a hung pipeline fails the test instead of the suite
    pub async fn run(sequencer: &mut TestSequencer) -> SequencerResult<RunSummary> {
        tokio::time::timeout(Duration::from_secs(20), sequencer.run())
            .await
            .expect("sequencer run timed out")
    }

    /// Every worker received its sentinel and none is left running
    pub fn assert_clean_shutdown(summary: &RunSummary, workers: usize) {
        assert_eq!(summary.worker_exits.len(), workers);
        assert!(summary.worker_exits.iter().all(|e| e.received_shutdown));
    }

    /// Alternative instances the solver saw, excluding the base solve
    pub fn alternative_instances(handles: &TestHandles) -> Vec<ProblemInstance> {
        handles
            .solved
            .lock()
            .unwrap()
            .iter()
            .filter(|i| {
                i.model
                    .objective
                    .as_ref()
                    .map(|o| o.name != TestFixtures::COST_OBJECTIVE)
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }
}
