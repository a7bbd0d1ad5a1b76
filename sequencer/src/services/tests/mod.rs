//! Service-specific tests
//!
//! One file per service, sharing the small helpers below.


pub mod common {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use shared::{InstanceId, LinearExpr, Model, Objective, SolveResult, SolverOutput, Variable, WorkerId};

    /// Two technologies per category, cost minimised
    pub fn energy_model() -> Model {
        let mut model = Model::new("energy")
            .with_variable(Variable::new("coal_1").with_category("fossil"))
            .with_variable(Variable::new("gas_1").with_category("fossil"))
            .with_variable(Variable::new("wind_1").with_category("renewable"))
            .with_variable(Variable::new("solar_1").with_category("renewable"));
        model.objective = Some(Objective::minimize(
            "total_cost",
            LinearExpr::from_terms([("coal_1", 3.0), ("gas_1", 4.0), ("wind_1", 6.0), ("solar_1", 7.0)]),
        ));
        model
    }

    pub fn optimal_result(id: u64, values: &[(&str, f64)]) -> SolveResult {
        let values: BTreeMap<String, f64> = values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        SolveResult::from_output(
            InstanceId(id),
            format!("alt_{id}"),
            Some(WorkerId(1)),
            Duration::from_millis(5),
            SolverOutput::optimal(100.0, values),
        )
    }
}
