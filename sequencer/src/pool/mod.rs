//! Worker pool
//!
//! A fixed set of worker tasks sharing one bounded work channel and one
//! bounded result channel. The sequencer talks to the pool only through
//! non-blocking `try_submit` and `try_next_result` while iterating, and
//! through `shutdown` once it has decided to stop.

pub mod channels;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use shared::{process_debug, process_info, process_warn, ProblemInstance, ProcessId, SolveResult, WorkerId};

pub use channels::{channel_pair, ResultReceiver, SubmitOutcome, WorkSender, WorkerEndpoints};
pub use worker::{run_worker, WorkerExit};

use crate::config::{PoolSettings, SolverSettings};
use crate::error::SequencerResult;
use crate::traits::SolverFactory;

/// Handle on one running worker
pub struct WorkerRecord {
    pub id: WorkerId,
    handle: JoinHandle<WorkerExit>,
    alive: Arc<AtomicBool>,
}

impl WorkerRecord {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// What happened while the pool was shut down
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub exits: Vec<WorkerExit>,
    pub sentinels_sent: usize,
    /// Results that arrived after the sequencer stopped consuming
    pub late_results: Vec<SolveResult>,
    /// Workers still flagged alive once every join returned
    pub alive_after: usize,
}

pub struct WorkerPool {
    sender: WorkSender,
    results: ResultReceiver,
    workers: Vec<WorkerRecord>,
}

impl WorkerPool {
    /// Spawn `settings.workers` workers, each with its own solver handle
    pub fn start<F>(settings: &PoolSettings, factory: &F, solver_settings: &SolverSettings) -> SequencerResult<Self>
    where
        F: SolverFactory + ?Sized,
    {
        let (sender, results, endpoints) = channel_pair(settings.work_capacity, settings.result_capacity);
        let mut workers = Vec::with_capacity(settings.workers);

        for n in 1..=settings.workers {
            let id = WorkerId(n as u32);
            let solver = factory.create_solver(solver_settings)?;
            let alive = Arc::new(AtomicBool::new(true));
            let handle = tokio::spawn(run_worker(id, solver, endpoints.clone(), Arc::clone(&alive)));
            workers.push(WorkerRecord { id, handle, alive });
        }
        // Workers hold the only remaining endpoints, so the result channel
        // closes once the last of them exits.
        drop(endpoints);

        process_info!(
            ProcessId::current(),
            "👷 Started {} workers (work capacity {}, result capacity {})",
            workers.len(),
            settings.work_capacity,
            settings.result_capacity
        );

        Ok(Self {
            sender,
            results,
            workers,
        })
    }

    /// Submit an instance if there is room, without waiting
    pub fn try_submit(&mut self, instance: ProblemInstance) -> SequencerResult<SubmitOutcome> {
        self.sender.try_submit(instance)
    }

    /// Read one result if any is ready, without waiting
    pub fn try_next_result(&mut self) -> Option<SolveResult> {
        let result = self.results.try_next()?;
        self.sender.complete_one();
        Some(result)
    }

    pub fn in_flight(&self) -> usize {
        self.sender.in_flight()
    }

    pub fn max_in_flight(&self) -> usize {
        self.sender.max_in_flight()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.workers
    }

    pub fn alive_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Send one sentinel per worker and wait for every worker to exit
    ///
    /// Results that arrive meanwhile are drained so no worker stays blocked
    /// on a full result channel. They are returned in the report, never
    /// handed to the generator.
    pub async fn shutdown(self) -> ShutdownReport {
        let pid = ProcessId::current();
        let WorkerPool {
            sender,
            mut results,
            workers,
        } = self;
        let mut report = ShutdownReport::default();

        for _ in 0..workers.len() {
            loop {
                tokio::select! {
                    sent = sender.reserve_shutdown() => {
                        match sent {
                            Ok(()) => report.sentinels_sent += 1,
                            Err(e) => process_warn!(pid, "Could not deliver shutdown sentinel: {}", e),
                        }
                        break;
                    }
                    Some(result) = results.recv() => {
                        process_debug!(pid, "Drained late result {} during shutdown", result.instance_id);
                        report.late_results.push(result);
                    }
                }
            }
        }

        for mut record in workers {
            loop {
                tokio::select! {
                    joined = &mut record.handle => {
                        match joined {
                            Ok(exit) => {
                                if !exit.received_shutdown {
                                    process_warn!(pid, "Worker {} exited without receiving shutdown", exit.worker_id);
                                }
                                report.exits.push(exit);
                            }
                            Err(e) => process_warn!(pid, "Worker {} task failed: {}", record.id, e),
                        }
                        break;
                    }
                    Some(result) = results.recv() => {
                        process_debug!(pid, "Drained late result {} during shutdown", result.instance_id);
                        report.late_results.push(result);
                    }
                }
            }
            if record.is_alive() {
                report.alive_after += 1;
            }
        }

        while let Some(result) = results.try_next() {
            report.late_results.push(result);
        }
        drop(sender);
        drop(results);

        process_info!(
            pid,
            "🛑 Worker pool stopped: {} sentinels, {} workers joined, {} late results discarded",
            report.sentinels_sent,
            report.exits.len(),
            report.late_results.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequencerError;
    use crate::traits::{MockSolverFactory, Solver};
    use shared::{Model, SolverOutput};
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    struct SlowSolver {
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Solver for SlowSolver {
        async fn solve(&self, instance: &ProblemInstance) -> SequencerResult<SolverOutput> {
            tokio::time::sleep(self.delay).await;
            if instance.label == "bad" {
                return Err(SequencerError::solver("infeasible backend state"));
            }
            Ok(SolverOutput::optimal(1.0, BTreeMap::new()))
        }
    }

    fn factory(delay: Duration) -> MockSolverFactory {
        let mut factory = MockSolverFactory::new();
        factory
            .expect_create_solver()
            .returning(move |_| Ok(Arc::new(SlowSolver { delay }) as Arc<dyn Solver>));
        factory
    }

    fn settings(workers: usize, capacity: usize) -> PoolSettings {
        PoolSettings {
            workers,
            work_capacity: capacity,
            result_capacity: capacity,
            poll_interval_ms: 1,
        }
    }

    fn instance(label: &str) -> ProblemInstance {
        ProblemInstance::new(label, Model::new("m"))
    }

    async fn collect(pool: &mut WorkerPool, n: usize) -> Vec<SolveResult> {
        let mut out = Vec::new();
        while out.len() < n {
            match pool.try_next_result() {
                Some(r) => out.push(r),
                None => tokio::time::sleep(Duration::from_millis(2)).await,
            }
        }
        out
    }

    #[tokio::test]
    async fn test_shutdown_reaches_every_worker() {
        let pool = WorkerPool::start(&settings(3, 2), &factory(Duration::ZERO), &SolverSettings::default()).unwrap();
        assert_eq!(pool.workers().len(), 3);

        let report = pool.shutdown().await;

        assert_eq!(report.sentinels_sent, 3);
        assert_eq!(report.exits.len(), 3);
        assert!(report.exits.iter().all(|e| e.received_shutdown));
        assert_eq!(report.alive_after, 0);
    }

    #[tokio::test]
    async fn test_submit_never_blocks_on_slow_workers() {
        let mut pool =
            WorkerPool::start(&settings(1, 2), &factory(Duration::from_millis(300)), &SolverSettings::default())
                .unwrap();

        let started = Instant::now();
        let mut full = 0;
        for i in 0..5 {
            if let SubmitOutcome::Full(_) = pool.try_submit(instance(&format!("alt_{i}"))).unwrap() {
                full += 1;
            }
        }

        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(full, 3);
        assert_eq!(pool.in_flight(), 2);
        assert!(pool.max_in_flight() <= pool.capacity());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_solve_keeps_worker_alive() {
        let mut pool = WorkerPool::start(&settings(2, 4), &factory(Duration::ZERO), &SolverSettings::default()).unwrap();

        pool.try_submit(instance("bad")).unwrap();
        pool.try_submit(instance("good")).unwrap();
        let results = collect(&mut pool, 2).await;

        assert_eq!(results.iter().filter(|r| r.is_fault()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_optimal()).count(), 1);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.alive_count(), 2);

        let report = pool.shutdown().await;
        assert_eq!(report.exits.iter().map(|e| e.faults).sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn test_unread_results_are_drained_at_shutdown() {
        let mut pool = WorkerPool::start(&settings(2, 2), &factory(Duration::ZERO), &SolverSettings::default()).unwrap();

        pool.try_submit(instance("a")).unwrap();
        pool.try_submit(instance("b")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = pool.shutdown().await;
        assert_eq!(report.late_results.len(), 2);
        assert_eq!(report.exits.len(), 2);
    }

    #[tokio::test]
    async fn test_factory_failure_aborts_start() {
        let mut factory = MockSolverFactory::new();
        factory
            .expect_create_solver()
            .returning(|_| Err(SequencerError::solver("unknown backend")));

        let started = WorkerPool::start(&settings(2, 2), &factory, &SolverSettings::default());
        assert!(matches!(started, Err(SequencerError::SolverError { .. })));
    }
}
