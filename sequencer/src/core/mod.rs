//! Core decision logic
//!
//! Pure functions and values with no I/O: the stopping state folded each
//! loop round and the one-time cost relaxation of the working model.

pub mod relaxation;
pub mod stopping;

pub use relaxation::{cost_ceiling, relax_and_rebind, RelaxedModel, COST_CAP};
pub use stopping::{StopInputs, StopReason, StoppingState};
