//! Sequencer-specific error types

use shared::{SharedError, TerminationStatus};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Input store {input} and output store {output} must be the same store")]
    StoreMismatch { input: PathBuf, output: PathBuf },

    #[error("Configuration error: {field}: {reason}")]
    ConfigurationError { field: String, reason: String },

    #[error("Base solve terminated with status {status}")]
    BaseSolveFailed { status: TerminationStatus },

    #[error("Cost relaxation failed: {reason}")]
    RelaxationError { reason: String },

    #[error("Solver error: {message}")]
    SolverError { message: String },

    #[error("Alternative generator error: {message}")]
    GeneratorError { message: String },

    #[error("Output recording failed: {message}")]
    RecorderError { message: String },

    #[error("Worker pool error: {message}")]
    PoolError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SequencerError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn solver(message: impl Into<String>) -> Self {
        Self::SolverError { message: message.into() }
    }

    pub fn generator(message: impl Into<String>) -> Self {
        Self::GeneratorError { message: message.into() }
    }

    pub fn recorder(message: impl Into<String>) -> Self {
        Self::RecorderError { message: message.into() }
    }

    pub fn pool(message: impl Into<String>) -> Self {
        Self::PoolError { message: message.into() }
    }
}

pub type SequencerResult<T> = Result<T, SequencerError>;
