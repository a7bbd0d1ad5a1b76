//! Service implementations
//!
//! Concrete collaborators used by the binary: a JSON store for input and
//! output, an external-process solver backend and a directional generator.

pub mod command_solver;
pub mod directional;
pub mod model_source;
pub mod recorder;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use command_solver::{CommandSolver, CommandSolverFactory};
pub use directional::{DirectionalGenerator, DirectionalGeneratorFactory};
pub use model_source::JsonModelSource;
pub use recorder::{JsonlRecorder, RecordKind, ResultRecord};
