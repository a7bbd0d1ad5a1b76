//! Worker loop
//!
//! A worker pulls one item at a time from the work channel, solves it and
//! pushes the result back. It stops only on the shutdown sentinel, or when a
//! channel disappears underneath it. Solver errors and panics are turned into
//! failed results so a misbehaving backend never silently removes a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use shared::{process_debug, process_warn, InstanceId, ProblemInstance, SolveResult, WorkItem, WorkerId};

use super::channels::WorkerEndpoints;
use crate::traits::Solver;

/// Summary returned by a worker when it exits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub worker_id: WorkerId,
    pub solved: u64,
    pub faults: u64,
    pub received_shutdown: bool,
}

/// Clears the liveness flag however the worker task ends
struct LivenessGuard(Arc<AtomicBool>);

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Run one worker until it receives the shutdown sentinel
pub async fn run_worker(
    worker_id: WorkerId,
    solver: Arc<dyn Solver>,
    endpoints: WorkerEndpoints,
    alive: Arc<AtomicBool>,
) -> WorkerExit {
    let _liveness = LivenessGuard(alive);
    let pid = worker_id.process_id();
    let mut exit = WorkerExit {
        worker_id,
        solved: 0,
        faults: 0,
        received_shutdown: false,
    };

    process_debug!(pid, "Worker {} waiting for work", worker_id);

    loop {
        match endpoints.next_item().await {
            Some(WorkItem::Shutdown) => {
                exit.received_shutdown = true;
                process_debug!(pid, "Worker {} received shutdown after {} solves", worker_id, exit.solved);
                return exit;
            }
            Some(WorkItem::Solve { id, instance }) => {
                let result = solve_one(worker_id, &solver, id, instance).await;
                exit.solved += 1;
                if result.is_fault() {
                    exit.faults += 1;
                }
                if !endpoints.send_result(result).await {
                    process_warn!(pid, "Worker {} lost the result channel; exiting", worker_id);
                    return exit;
                }
            }
            None => {
                process_warn!(pid, "Worker {} found the work channel closed without a shutdown", worker_id);
                return exit;
            }
        }
    }
}

/// Solve a single instance, converting errors and panics into a failed result
async fn solve_one(worker_id: WorkerId, solver: &Arc<dyn Solver>, id: InstanceId, instance: ProblemInstance) -> SolveResult {
    let pid = worker_id.process_id();
    let label = instance.label.clone();
    let solver = Arc::clone(solver);
    let started = Instant::now();

    // The instance moves into the task and is dropped there once solved.
    let outcome = tokio::spawn(async move { solver.solve(&instance).await }).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(output)) => {
            process_debug!(
                pid,
                "Solve {} ({}) time: {:.4}s. Status: {}",
                id,
                label,
                elapsed.as_secs_f64(),
                output.status
            );
            SolveResult::from_output(id, label, Some(worker_id), elapsed, output)
        }
        Ok(Err(e)) => {
            process_warn!(pid, "Solve {} ({}) failed: {}", id, label, e);
            SolveResult::faulted(id, label, Some(worker_id), elapsed, e.to_string())
        }
        Err(join_error) => {
            let message = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                "solve task cancelled".to_string()
            };
            process_warn!(pid, "Solve {} ({}) panicked: {}", id, label, message);
            SolveResult::faulted(id, label, Some(worker_id), elapsed, format!("solver panicked: {message}"))
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
