//! Run configuration for an exploration run
//!
//! Loaded from a JSON file (every field has a default), then normalised with
//! `prepare()` and checked with `validate()` before a `Sequencer` is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shared::{process_info, process_warn, ProcessId};

use crate::error::{SequencerError, SequencerResult};

/// Structural dimension that alternatives are spread along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MgaAxis {
    /// One dimension per variable category, summing its variables
    CategoryActivity,
    /// One dimension per variable
    VariableActivity,
}

impl fmt::Display for MgaAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MgaAxis::CategoryActivity => write!(f, "category_activity"),
            MgaAxis::VariableActivity => write!(f, "variable_activity"),
        }
    }
}

/// How the generator picks the next objective direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MgaWeighting {
    /// Axis-aligned extremes first, then random directions
    HullExpansion,
    /// Random directions only
    Random,
}

impl fmt::Display for MgaWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MgaWeighting::HullExpansion => write!(f, "hull_expansion"),
            MgaWeighting::Random => write!(f, "random"),
        }
    }
}

/// What to do when the base solve does not terminate optimally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseFailurePolicy {
    #[default]
    Abort,
    Continue,
}

/// Solver backend selection, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Backend name (for the command backend: the executable to launch)
    pub name: String,
    /// Backend-specific option bag, passed through untouched
    pub options: BTreeMap<String, serde_json::Value>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            name: "highs".to_string(),
            options: BTreeMap::new(),
        }
    }
}

/// Exploration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgaSettings {
    pub axis: Option<MgaAxis>,
    pub weighting: Option<MgaWeighting>,
    pub iteration_limit: u32,
    pub time_limit_hrs: f64,
    pub cost_epsilon: f64,
    /// Seed for generators that draw random directions
    pub seed: Option<u64>,
    /// Consecutive results without a new point before exploration converges
    pub patience: u32,
}

impl Default for MgaSettings {
    fn default() -> Self {
        Self {
            axis: None,
            weighting: None,
            iteration_limit: 20,
            time_limit_hrs: 12.0,
            cost_epsilon: 0.05,
            seed: None,
            patience: 10,
        }
    }
}

impl MgaSettings {
    /// Wall-clock budget; saturates for limits too large to represent
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_hrs * 3600.0).unwrap_or(Duration::MAX)
    }
}

/// Worker pool and channel sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub workers: usize,
    pub work_capacity: usize,
    pub result_capacity: usize,
    /// Sleep between loop rounds that made no progress
    pub poll_interval_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 6,
            work_capacity: 5,
            result_capacity: 5,
            poll_interval_ms: 10,
        }
    }
}

impl PoolSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Label tagging every record written by this run
    pub scenario: String,
    pub input_store: PathBuf,
    pub output_store: PathBuf,
    pub source_trace: bool,
    pub save_lp_file: bool,
    pub save_duals: bool,
    pub save_excel: bool,
    pub solver: SolverSettings,
    pub mga: MgaSettings,
    pub pool: PoolSettings,
    pub base_failure: BaseFailurePolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            scenario: "mga".to_string(),
            input_store: PathBuf::from("./store"),
            output_store: PathBuf::from("./store"),
            source_trace: true,
            save_lp_file: false,
            save_duals: false,
            save_excel: false,
            solver: SolverSettings::default(),
            mga: MgaSettings::default(),
            pool: PoolSettings::default(),
            base_failure: BaseFailurePolicy::default(),
        }
    }
}

impl SequencerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> SequencerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Normalise settings for an exploration run
    ///
    /// Auxiliary outputs are meaningless across many rapid re-solves and are
    /// switched off; missing axis and weighting fall back to defaults.
    pub fn prepare(&mut self) {
        let pid = ProcessId::current();

        if !self.source_trace {
            process_warn!(
                pid,
                "Performing exploration runs without source trace. Recommend enabling source trace."
            );
        }
        if self.save_lp_file {
            process_info!(pid, "Saving LP file is disabled during exploration runs.");
            self.save_lp_file = false;
        }
        if self.save_duals {
            process_info!(pid, "Saving duals is disabled during exploration runs.");
            self.save_duals = false;
        }
        if self.save_excel {
            process_info!(pid, "Saving spreadsheet output is disabled during exploration runs.");
            self.save_excel = false;
        }
        if self.mga.axis.is_none() {
            process_warn!(pid, "No exploration axis specified. Using default: {}", MgaAxis::CategoryActivity);
            self.mga.axis = Some(MgaAxis::CategoryActivity);
        }
        if self.mga.weighting.is_none() {
            process_warn!(pid, "No weighting specified. Using default: {}", MgaWeighting::HullExpansion);
            self.mga.weighting = Some(MgaWeighting::HullExpansion);
        }
    }

    /// Check limits, sizes and the store collocation precondition
    pub fn validate(&self) -> SequencerResult<()> {
        if !self.mga.cost_epsilon.is_finite() || self.mga.cost_epsilon < 0.0 {
            return Err(SequencerError::config(
                "mga.cost_epsilon",
                format!("must be a finite value >= 0, got {}", self.mga.cost_epsilon),
            ));
        }
        if !self.mga.time_limit_hrs.is_finite() || self.mga.time_limit_hrs < 0.0 {
            return Err(SequencerError::config(
                "mga.time_limit_hrs",
                format!("must be a finite value >= 0, got {}", self.mga.time_limit_hrs),
            ));
        }
        if Duration::try_from_secs_f64(self.mga.time_limit_hrs * 3600.0).is_err() {
            return Err(SequencerError::config(
                "mga.time_limit_hrs",
                format!("{} hours is too large to represent", self.mga.time_limit_hrs),
            ));
        }
        if self.mga.patience == 0 {
            return Err(SequencerError::config("mga.patience", "must be at least 1"));
        }
        if self.mga.iteration_limit == 0 {
            return Err(SequencerError::config("mga.iteration_limit", "must be at least 1"));
        }
        if self.pool.workers == 0 {
            return Err(SequencerError::config("pool.workers", "must be at least 1"));
        }
        if self.pool.work_capacity == 0 {
            return Err(SequencerError::config("pool.work_capacity", "must be at least 1"));
        }
        if self.pool.result_capacity == 0 {
            return Err(SequencerError::config("pool.result_capacity", "must be at least 1"));
        }
        if self.scenario.trim().is_empty() {
            return Err(SequencerError::config("scenario", "must not be empty"));
        }
        if !same_store(&self.input_store, &self.output_store) {
            return Err(SequencerError::StoreMismatch {
                input: self.input_store.clone(),
                output: self.output_store.clone(),
            });
        }
        Ok(())
    }
}

/// Stores are the same if their canonical paths match, or their literal
/// paths when either does not exist yet
fn same_store(input: &Path, output: &Path) -> bool {
    match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SequencerConfig::default();
        assert_eq!(config.mga.iteration_limit, 20);
        assert_eq!(config.mga.time_limit_hrs, 12.0);
        assert_eq!(config.mga.cost_epsilon, 0.05);
        assert_eq!(config.mga.patience, 10);
        assert_eq!(config.pool.workers, 6);
        assert_eq!(config.pool.work_capacity, 5);
        assert_eq!(config.pool.result_capacity, 5);
        assert_eq!(config.base_failure, BaseFailurePolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prepare_forces_auxiliary_outputs_off() {
        let mut config = SequencerConfig {
            save_lp_file: true,
            save_duals: true,
            save_excel: true,
            ..Default::default()
        };
        config.prepare();

        assert!(!config.save_lp_file);
        assert!(!config.save_duals);
        assert!(!config.save_excel);
        assert_eq!(config.mga.axis, Some(MgaAxis::CategoryActivity));
        assert_eq!(config.mga.weighting, Some(MgaWeighting::HullExpansion));
    }

    #[test]
    fn test_prepare_keeps_explicit_axis() {
        let mut config = SequencerConfig::default();
        config.mga.axis = Some(MgaAxis::VariableActivity);
        config.mga.weighting = Some(MgaWeighting::Random);
        config.prepare();

        assert_eq!(config.mga.axis, Some(MgaAxis::VariableActivity));
        assert_eq!(config.mga.weighting, Some(MgaWeighting::Random));
    }

    #[test]
    fn test_store_mismatch_rejected() {
        let config = SequencerConfig {
            input_store: PathBuf::from("./in"),
            output_store: PathBuf::from("./out"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SequencerError::StoreMismatch { .. })));
    }

    #[test]
    fn test_store_equivalent_paths_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let config = SequencerConfig {
            input_store: dir.path().to_path_buf(),
            output_store: dir.path().join("."),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_epsilon_rejected() {
        let mut config = SequencerConfig::default();
        config.mga.cost_epsilon = -0.1;
        assert!(matches!(
            config.validate(),
            Err(SequencerError::ConfigurationError { ref field, .. }) if field == "mga.cost_epsilon"
        ));
    }

    #[test]
    fn test_zero_patience_rejected() {
        let mut config = SequencerConfig::default();
        config.mga.patience = 0;
        assert!(matches!(
            config.validate(),
            Err(SequencerError::ConfigurationError { ref field, .. }) if field == "mga.patience"
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = SequencerConfig::default();
        config.pool.work_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{
            "scenario": "utopia",
            "mga": { "iteration_limit": 3, "axis": "variable_activity", "patience": 4 },
            "solver": { "name": "cbc", "options": { "threads": 4 } }
        }"#;
        let config: SequencerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.scenario, "utopia");
        assert_eq!(config.mga.iteration_limit, 3);
        assert_eq!(config.mga.axis, Some(MgaAxis::VariableActivity));
        assert_eq!(config.mga.patience, 4);
        assert_eq!(config.mga.cost_epsilon, 0.05);
        assert_eq!(config.solver.options["threads"], serde_json::json!(4));
        assert_eq!(config.pool.workers, 6);
    }

    #[test]
    fn test_time_limit_conversion() {
        let settings = MgaSettings {
            time_limit_hrs: 0.5,
            ..Default::default()
        };
        assert_eq!(settings.time_limit(), Duration::from_secs(1800));
    }

    #[test]
    fn test_unrepresentable_time_limit_rejected() {
        let mut config = SequencerConfig::default();
        config.mga.time_limit_hrs = 1e16;

        assert!(matches!(
            config.validate(),
            Err(SequencerError::ConfigurationError { ref field, .. }) if field == "mga.time_limit_hrs"
        ));
        assert_eq!(config.mga.time_limit(), Duration::MAX);
    }
}
