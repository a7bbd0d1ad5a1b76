//! Reads the base model from the store directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use shared::{process_debug, Model, ProcessId, SharedError};

use crate::error::SequencerResult;
use crate::traits::ModelSource;

/// File holding the base model inside a store directory
pub const MODEL_FILE: &str = "model.json";

/// Model source backed by `<store>/model.json`
pub struct JsonModelSource {
    store: PathBuf,
}

impl JsonModelSource {
    pub fn new(store: impl AsRef<Path>) -> Self {
        Self {
            store: store.as_ref().to_path_buf(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.store.join(MODEL_FILE)
    }
}

#[async_trait]
impl ModelSource for JsonModelSource {
    async fn load_base_model(&self) -> SequencerResult<Model> {
        let path = self.model_path();
        process_debug!(ProcessId::current(), "Loading base model from {}", path.display());

        let content = fs::read_to_string(&path).await?;
        let model = Model::from_json(&content)?;
        if model.objective.is_none() {
            return Err(SharedError::MissingObjective { model: model.name }.into());
        }
        Ok(model)
    }
}
