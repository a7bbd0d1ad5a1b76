//! Bounded channel pair between the sequencer and its workers
//!
//! The work channel carries `WorkItem`s out, the result channel carries
//! `SolveResult`s back. Both are bounded. On the sequencer side every
//! operation is non-blocking: a full work channel hands the instance back to
//! be retried next round, an empty result channel simply yields nothing.

use std::sync::Arc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, Mutex};

use shared::{InstanceId, ProblemInstance, SolveResult, WorkItem};

use crate::error::{SequencerError, SequencerResult};

/// Outcome of a non-blocking submit
#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(InstanceId),
    /// No room this round; the instance comes back for a retry
    Full(ProblemInstance),
}

/// Sequencer-side sending half of the work channel
///
/// Tracks instances that are in flight: submitted, and not yet read back
/// from the result channel. That count never exceeds `capacity`.
pub struct WorkSender {
    tx: mpsc::Sender<WorkItem>,
    capacity: usize,
    in_flight: usize,
    max_in_flight: usize,
    next_id: u64,
}

impl WorkSender {
    /// Try to submit an instance without waiting
    ///
    /// Fails only when no worker is left to receive.
    pub fn try_submit(&mut self, instance: ProblemInstance) -> SequencerResult<SubmitOutcome> {
        if self.in_flight >= self.capacity {
            return Ok(SubmitOutcome::Full(instance));
        }

        let id = InstanceId(self.next_id);
        match self.tx.try_send(WorkItem::Solve { id, instance }) {
            Ok(()) => {
                self.next_id += 1;
                self.in_flight += 1;
                self.max_in_flight = self.max_in_flight.max(self.in_flight);
                Ok(SubmitOutcome::Submitted(id))
            }
            Err(TrySendError::Full(WorkItem::Solve { instance, .. })) => Ok(SubmitOutcome::Full(instance)),
            Err(TrySendError::Full(WorkItem::Shutdown)) => {
                Err(SequencerError::pool("shutdown sentinel bounced from a submit"))
            }
            Err(TrySendError::Closed(_)) => Err(SequencerError::pool("work channel closed: no worker is receiving")),
        }
    }

    /// Account for one result read back from the result channel
    pub(crate) fn complete_one(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue the shutdown sentinel, waiting for room
    pub(crate) async fn reserve_shutdown(&self) -> SequencerResult<()> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| SequencerError::pool("work channel closed before shutdown could be delivered"))?;
        permit.send(WorkItem::Shutdown);
        Ok(())
    }
}

/// Sequencer-side receiving half of the result channel
pub struct ResultReceiver {
    rx: mpsc::Receiver<SolveResult>,
}

impl ResultReceiver {
    /// Read one result if any is ready
    pub fn try_next(&mut self) -> Option<SolveResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next result; `None` once every worker has dropped its sender
    pub(crate) async fn recv(&mut self) -> Option<SolveResult> {
        self.rx.recv().await
    }
}

/// Worker-side endpoints, cloned once per worker
#[derive(Clone)]
pub struct WorkerEndpoints {
    pub(crate) work_rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    pub(crate) result_tx: mpsc::Sender<SolveResult>,
}

impl WorkerEndpoints {
    /// Block until the next work item; `None` if the work channel closed
    pub async fn next_item(&self) -> Option<WorkItem> {
        let mut rx = self.work_rx.lock().await;
        rx.recv().await
    }

    /// Send a result, waiting for room; `false` if the sequencer is gone
    pub async fn send_result(&self, result: SolveResult) -> bool {
        self.result_tx.send(result).await.is_ok()
    }
}

/// Create the work/result channel pair
pub fn channel_pair(work_capacity: usize, result_capacity: usize) -> (WorkSender, ResultReceiver, WorkerEndpoints) {
    let (work_tx, work_rx) = mpsc::channel(work_capacity);
    let (result_tx, result_rx) = mpsc::channel(result_capacity);

    let sender = WorkSender {
        tx: work_tx,
        capacity: work_capacity,
        in_flight: 0,
        max_in_flight: 0,
        next_id: 1,
    };
    let endpoints = WorkerEndpoints {
        work_rx: Arc::new(Mutex::new(work_rx)),
        result_tx,
    };

    (sender, ResultReceiver { rx: result_rx }, endpoints)
}
