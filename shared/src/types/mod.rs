//! Core identifiers used throughout the sequencer system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identity of any execution context that emits logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The sequencer (main control loop, singleton)
    Sequencer,
    /// A pool worker with its numeric identity
    Worker(u32),
}

impl ProcessId {
    /// Initialize the global process ID for the sequencer
    pub fn init_sequencer() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Sequencer)
    }

    /// Get the global process ID, defaulting to the sequencer when unset
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Sequencer)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Sequencer => write!(f, "sequencer"),
            ProcessId::Worker(id) => write!(f, "worker_{id}"),
        }
    }
}

/// Numeric identity of a pool worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl WorkerId {
    pub fn process_id(&self) -> ProcessId {
        ProcessId::Worker(self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity assigned to an instance when it is submitted to the work channel.
/// Results carry it back so they can be reconciled regardless of arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// The base solve is always instance zero
    pub const BASE: InstanceId = InstanceId(0);
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Termination status reported by a solver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unbounded,
    InfeasibleOrUnbounded,
    TimeLimit,
    IterationLimit,
    Interrupted,
    Error,
    Unknown,
}

impl TerminationStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, TerminationStatus::Optimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationStatus::Optimal => "optimal",
            TerminationStatus::Feasible => "feasible",
            TerminationStatus::Infeasible => "infeasible",
            TerminationStatus::Unbounded => "unbounded",
            TerminationStatus::InfeasibleOrUnbounded => "infeasible_or_unbounded",
            TerminationStatus::TimeLimit => "time_limit",
            TerminationStatus::IterationLimit => "iteration_limit",
            TerminationStatus::Interrupted => "interrupted",
            TerminationStatus::Error => "error",
            TerminationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
