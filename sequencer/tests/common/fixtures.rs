//! Test fixtures and data for sequencer tests

use std::path::Path;

use sequencer::SequencerConfig;
use shared::{LinearExpr, Model, Objective, Variable};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Objective value reported by the base solve
    pub const BASE_COST: f64 = 1000.0;
    pub const EPSILON: f64 = 0.05;
    /// `(1 + EPSILON) * BASE_COST`
    pub const COST_CAP: f64 = 1050.0;

    pub const SCENARIO: &'static str = "test_scenario";
    pub const COST_OBJECTIVE: &'static str = "total_cost";

    pub const DEFAULT_WORKERS: usize = 3;
    pub const DEFAULT_CAPACITY: usize = 2;

    /// Small four-technology model with a cost objective
    pub fn base_model() -> Model {
        let mut model = Model::new("energy_system")
            .with_variable(Variable::new("coal").with_category("fossil"))
            .with_variable(Variable::new("gas").with_category("fossil"))
            .with_variable(Variable::new("wind").with_category("renewable"))
            .with_variable(Variable::new("solar").with_category("renewable"));
        model.objective = Some(Objective::minimize(
            Self::COST_OBJECTIVE,
            LinearExpr::from_terms([("coal", 30.0), ("gas", 40.0), ("wind", 60.0), ("solar", 70.0)]),
        ));
        model
    }

    /// Fast configuration over a single store directory
    pub fn config(store: &Path) -> SequencerConfig {
        let mut config = SequencerConfig {
            scenario: Self::SCENARIO.to_string(),
            input_store: store.to_path_buf(),
            output_store: store.to_path_buf(),
            ..Default::default()
        };
        config.mga.cost_epsilon = Self::EPSILON;
        config.mga.iteration_limit = 5;
        config.pool.workers = Self::DEFAULT_WORKERS;
        config.pool.work_capacity = Self::DEFAULT_CAPACITY;
        config.pool.result_capacity = Self::DEFAULT_CAPACITY;
        config.pool.poll_interval_ms = 1;
        config
    }
}
