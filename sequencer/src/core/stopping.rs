//! Stopping state for the iterate loop
//!
//! The loop never flips scattered booleans. Each round it gathers a fresh
//! `StopInputs` snapshot and folds it into the previous `StoppingState`,
//! which is a plain value: flags only ever go from false to true.

use std::fmt;
use std::time::Duration;

/// Why the iterate loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The generator declared exploration exhausted
    Converged,
    IterationLimit,
    TimeLimit,
    /// Stop requested from outside the loop
    Aborted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Converged => write!(f, "generator converged"),
            StopReason::IterationLimit => write!(f, "iteration limit reached"),
            StopReason::TimeLimit => write!(f, "time limit reached"),
            StopReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Independent observations gathered once per loop round
#[derive(Debug, Clone, Copy)]
pub struct StopInputs {
    pub generator_exhausted: bool,
    pub completed_iterations: u32,
    pub iteration_limit: u32,
    pub elapsed: Duration,
    pub time_limit: Duration,
    pub abort_requested: bool,
}

/// Latched termination flags, combined by logical OR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoppingState {
    pub generator_exhausted: bool,
    pub iteration_limit_reached: bool,
    pub time_limit_reached: bool,
    pub abort_requested: bool,
}

impl StoppingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a fresh observation into this state; set flags stay set
    pub fn advance(self, inputs: &StopInputs) -> Self {
        Self {
            generator_exhausted: self.generator_exhausted || inputs.generator_exhausted,
            iteration_limit_reached: self.iteration_limit_reached
                || inputs.completed_iterations >= inputs.iteration_limit,
            time_limit_reached: self.time_limit_reached || inputs.elapsed >= inputs.time_limit,
            abort_requested: self.abort_requested || inputs.abort_requested,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.generator_exhausted || self.iteration_limit_reached || self.time_limit_reached || self.abort_requested
    }

    /// All reasons that are currently set
    pub fn reasons(&self) -> Vec<StopReason> {
        let mut reasons = Vec::new();
        if self.abort_requested {
            reasons.push(StopReason::Aborted);
        }
        if self.generator_exhausted {
            reasons.push(StopReason::Converged);
        }
        if self.iteration_limit_reached {
            reasons.push(StopReason::IterationLimit);
        }
        if self.time_limit_reached {
            reasons.push(StopReason::TimeLimit);
        }
        reasons
    }

    /// The reason reported in logs: abort, then convergence, then limits
    pub fn primary_reason(&self) -> Option<StopReason> {
        self.reasons().into_iter().next()
    }
}
