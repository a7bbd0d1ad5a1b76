//! Items flowing towards the workers

use crate::model::ProblemInstance;
use crate::types::InstanceId;

/// Message on the work channel
///
/// `Shutdown` is the pipeline sentinel; a worker that reads it exits without
/// touching either channel again.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Solve { id: InstanceId, instance: ProblemInstance },
    Shutdown,
}

impl WorkItem {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, WorkItem::Shutdown)
    }
}

/// One element of an alternative generator's candidate sequence
///
/// `Wait` asks the sequencer to hold off pulling further candidates until at
/// least one more result has been ingested.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Instance(ProblemInstance),
    Wait,
}
