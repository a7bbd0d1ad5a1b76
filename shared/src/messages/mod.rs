//! Message types that cross the sequencer's channels
//!
//! - `work`: sequencer → worker items and generator candidates
//! - `result`: worker → sequencer solve outcomes

pub mod result;
pub mod work;

pub use result::{SolveResult, SolverOutput};
pub use work::{Candidate, WorkItem};
