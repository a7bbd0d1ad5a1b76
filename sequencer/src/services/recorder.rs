//! Output recorder writing one JSON line per solve result
//!
//! Records from every run share `<store>/results.jsonl` and are told apart by
//! their scenario label and run id. Clearing prior runs rewrites the file
//! without the current scenario's lines and leaves everything else alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use shared::{process_debug, process_info, ProcessId, SolveResult, TerminationStatus};

use crate::error::{SequencerError, SequencerResult};
use crate::traits::OutputRecorder;

/// File holding result records inside a store directory
pub const RESULTS_FILE: &str = "results.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Base,
    Alternative,
}

/// One persisted line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub scenario: String,
    pub run_id: Uuid,
    pub iteration: u32,
    pub kind: RecordKind,
    pub instance_id: u64,
    pub label: String,
    pub worker: Option<u32>,
    pub status: TerminationStatus,
    pub elapsed_secs: f64,
    pub objective: Option<f64>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    #[serde(default)]
    pub fault: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// JSON-lines recorder owned by the sequencer
pub struct JsonlRecorder {
    path: PathBuf,
    scenario: String,
    run_id: Uuid,
    /// Serialises appends and rewrites of the results file
    file_lock: Mutex<()>,
    written: AtomicU64,
    closed: AtomicBool,
}

impl JsonlRecorder {
    pub fn new(store: impl AsRef<Path>, scenario: impl Into<String>) -> Self {
        Self {
            path: store.as_ref().join(RESULTS_FILE),
            scenario: scenario.into(),
            run_id: Uuid::new_v4(),
            file_lock: Mutex::new(()),
            written: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file, skipping lines that do not parse
    pub async fn read_records(&self) -> SequencerResult<Vec<ResultRecord>> {
        let _guard = self.file_lock.lock().await;
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    fn record(&self, result: &SolveResult, iteration: u32, kind: RecordKind) -> ResultRecord {
        ResultRecord {
            scenario: self.scenario.clone(),
            run_id: self.run_id,
            iteration,
            kind,
            instance_id: result.instance_id.0,
            label: result.label.clone(),
            worker: result.worker.map(|w| w.0),
            status: result.status,
            elapsed_secs: result.elapsed.as_secs_f64(),
            objective: result.objective_value,
            values: result.values.clone(),
            fault: result.fault.clone(),
            recorded_at: Utc::now(),
        }
    }

    async fn append(&self, record: &ResultRecord) -> SequencerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SequencerError::recorder("recorder already closed"));
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.file_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Whether a raw line belongs to the given scenario
fn tagged_with(line: &str, scenario: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("scenario").and_then(|s| s.as_str()).map(|s| s == scenario))
        .unwrap_or(false)
}

#[async_trait]
impl OutputRecorder for JsonlRecorder {
    async fn clear_prior_run_records(&self) -> SequencerResult<usize> {
        let _guard = self.file_lock.lock().await;
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut kept = String::with_capacity(content.len());
        let mut removed = 0;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            if tagged_with(line, &self.scenario) {
                removed += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }

        if removed > 0 {
            let tmp = self.path.with_extension("jsonl.tmp");
            fs::write(&tmp, kept).await?;
            fs::rename(&tmp, &self.path).await?;
        }
        process_debug!(
            ProcessId::current(),
            "Removed {} prior records for scenario '{}' from {}",
            removed,
            self.scenario,
            self.path.display()
        );
        Ok(removed)
    }

    async fn write_base_result(&self, result: &SolveResult) -> SequencerResult<()> {
        let record = self.record(result, 0, RecordKind::Base);
        self.append(&record).await
    }

    async fn write_iteration_result(&self, result: &SolveResult, iteration: u32) -> SequencerResult<()> {
        let record = self.record(result, iteration, RecordKind::Alternative);
        self.append(&record).await
    }

    async fn close(&self) -> SequencerResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            process_info!(
                ProcessId::current(),
                "💾 Wrote {} records for run {} to {}",
                self.written.load(Ordering::SeqCst),
                self.run_id,
                self.path.display()
            );
        }
        Ok(())
    }
}
