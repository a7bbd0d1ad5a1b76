//! Solve outcomes flowing back to the sequencer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{InstanceId, TerminationStatus, WorkerId};

/// What a solver backend reports for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    pub status: TerminationStatus,
    #[serde(default)]
    pub objective_value: Option<f64>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl SolverOutput {
    pub fn optimal(objective_value: f64, values: BTreeMap<String, f64>) -> Self {
        Self {
            status: TerminationStatus::Optimal,
            objective_value: Some(objective_value),
            values,
        }
    }

    pub fn with_status(status: TerminationStatus) -> Self {
        Self {
            status,
            objective_value: None,
            values: BTreeMap::new(),
        }
    }
}

/// Result of one solve, read-only once created
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub instance_id: InstanceId,
    pub label: String,
    /// `None` for the base solve run by the sequencer itself
    pub worker: Option<WorkerId>,
    pub status: TerminationStatus,
    pub elapsed: Duration,
    pub objective_value: Option<f64>,
    pub values: BTreeMap<String, f64>,
    /// Backend error or panic message when the solve faulted
    pub fault: Option<String>,
}

impl SolveResult {
    pub fn from_output(
        instance_id: InstanceId,
        label: impl Into<String>,
        worker: Option<WorkerId>,
        elapsed: Duration,
        output: SolverOutput,
    ) -> Self {
        Self {
            instance_id,
            label: label.into(),
            worker,
            status: output.status,
            elapsed,
            objective_value: output.objective_value,
            values: output.values,
            fault: None,
        }
    }

    pub fn faulted(
        instance_id: InstanceId,
        label: impl Into<String>,
        worker: Option<WorkerId>,
        elapsed: Duration,
        fault: impl Into<String>,
    ) -> Self {
        Self {
            instance_id,
            label: label.into(),
            worker,
            status: TerminationStatus::Error,
            elapsed,
            objective_value: None,
            values: BTreeMap::new(),
            fault: Some(fault.into()),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }

    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }
}
