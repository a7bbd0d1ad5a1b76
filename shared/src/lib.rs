//! Shared types for the alternative-exploration sequencer
//!
//! Contains the optimization model snapshot that travels to workers, the
//! messages exchanged over the work and result channels, process identities,
//! and the common logging setup.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod model;
pub mod types;

pub use errors::*;
pub use model::{Constraint, LinearExpr, Model, Objective, ObjectiveSense, ProblemInstance, Sense, Variable};
pub use types::*;

pub use messages::{Candidate, SolveResult, SolverOutput, WorkItem};
