//! Cost relaxation: turn the cost objective into a cost ceiling
//!
//! After the base solve the working model no longer optimises cost. Its
//! objective expression becomes the constraint `cost <= (1 + eps) * C*` and
//! the objective slot is left empty for alternative objectives.

use shared::{Constraint, Model, ObjectiveSense, Sense};

use crate::error::{SequencerError, SequencerResult};

/// Name of the constraint added by `relax_and_rebind`
pub const COST_CAP: &str = "cost_cap";

/// Working model after relaxation
#[derive(Debug, Clone)]
pub struct RelaxedModel {
    pub model: Model,
    pub optimal_cost: f64,
    pub cost_relaxation: f64,
    pub cost_cap: f64,
}

/// Upper bound on cost for a given optimum and relaxation fraction
pub fn cost_ceiling(optimal_cost: f64, epsilon: f64) -> f64 {
    (1.0 + epsilon) * optimal_cost
}

/// Replace the model's objective with a cost ceiling constraint
///
/// One-time and non-reversible for a run: a model that already carries a
/// cost cap is rejected.
pub fn relax_and_rebind(mut model: Model, optimal_cost: f64, epsilon: f64) -> SequencerResult<RelaxedModel> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(SequencerError::RelaxationError {
            reason: format!("relaxation fraction must be finite and >= 0, got {epsilon}"),
        });
    }
    if !optimal_cost.is_finite() {
        return Err(SequencerError::RelaxationError {
            reason: format!("optimal cost must be finite, got {optimal_cost}"),
        });
    }
    if model.constraint(COST_CAP).is_some() {
        return Err(SequencerError::RelaxationError {
            reason: format!("model '{}' already has a {COST_CAP} constraint", model.name),
        });
    }

    if let Some(objective) = model.objective.as_ref().filter(|o| o.sense == ObjectiveSense::Maximize) {
        return Err(SequencerError::RelaxationError {
            reason: format!("objective '{}' maximises; a cost ceiling needs a minimised cost", objective.name),
        });
    }

    let objective = model.take_objective()?;
    let cost_cap = cost_ceiling(optimal_cost, epsilon);
    model.add_constraint(Constraint::new(COST_CAP, objective.expr, Sense::Le, cost_cap))?;

    Ok(RelaxedModel {
        model,
        optimal_cost,
        cost_relaxation: epsilon,
        cost_cap,
    })
}
