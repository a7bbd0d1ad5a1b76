//! Shared error types for the sequencer system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error("Duplicate constraint: {name}")]
    DuplicateConstraint { name: String },

    #[error("Model '{model}' has no objective")]
    MissingObjective { model: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },
}

impl SharedError {
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel { message: message.into() }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
