//! Linear optimization model snapshot
//!
//! A `Model` is the solver-ready description of one optimization problem:
//! variables with bounds, linear constraints and an optional objective. It is
//! what travels through the work channel inside a `ProblemInstance`, so every
//! type here is plain data and serializes to JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{SharedError, SharedResult};

/// Linear expression `sum(coef * var) + constant`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    #[serde(default)]
    pub terms: BTreeMap<String, f64>,
    #[serde(default)]
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(variable, coefficient)` pairs; repeated variables accumulate
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut expr = Self::new();
        for (var, coef) in terms {
            expr.add_term(var, coef);
        }
        expr
    }

    pub fn add_term(&mut self, var: impl Into<String>, coef: f64) {
        *self.terms.entry(var.into()).or_insert(0.0) += coef;
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    /// Evaluate against variable values; missing variables count as zero
    pub fn evaluate(&self, values: &BTreeMap<String, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values.get(var).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn is_finite(&self) -> bool {
        self.constant.is_finite() && self.terms.values().all(|c| c.is_finite())
    }
}

/// Decision variable with bounds and an optional category tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub lower: f64,
    #[serde(default)]
    pub upper: Option<f64>,
    /// Grouping tag used by exploration axes that aggregate variables
    #[serde(default)]
    pub category: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: 0.0,
            upper: None,
            category: None,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: Option<f64>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Constraint sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Ge => write!(f, ">="),
            Sense::Eq => write!(f, "=="),
        }
    }
}

/// Named linear constraint `expr <sense> rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, expr: LinearExpr, sense: Sense, rhs: f64) -> Self {
        Self {
            name: name.into(),
            expr,
            sense,
            rhs,
        }
    }

    /// Check the constraint against a solution within an absolute tolerance
    pub fn is_satisfied(&self, values: &BTreeMap<String, f64>, tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: ObjectiveSense,
}

impl Objective {
    pub fn minimize(name: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            sense: ObjectiveSense::Minimize,
        }
    }

    pub fn maximize(name: impl Into<String>, expr: LinearExpr) -> Self {
        Self {
            name: name.into(),
            expr,
            sense: ObjectiveSense::Maximize,
        }
    }
}

/// A complete optimization model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub objective: Option<Objective>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Add a constraint; names are unique within a model
    pub fn add_constraint(&mut self, constraint: Constraint) -> SharedResult<()> {
        if self.constraint(&constraint.name).is_some() {
            return Err(SharedError::DuplicateConstraint { name: constraint.name });
        }
        if !constraint.expr.is_finite() || !constraint.rhs.is_finite() {
            return Err(SharedError::invalid_model(format!(
                "constraint '{}' has non-finite coefficients",
                constraint.name
            )));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Remove and return the objective
    pub fn take_objective(&mut self) -> SharedResult<Objective> {
        self.objective
            .take()
            .ok_or_else(|| SharedError::MissingObjective { model: self.name.clone() })
    }

    /// Copy of this model carrying a different objective
    pub fn with_objective(&self, objective: Objective) -> Model {
        let mut model = self.clone();
        model.objective = Some(objective);
        model
    }

    /// Parse a model document and run the structural checks on it
    pub fn from_json(content: &str) -> SharedResult<Self> {
        let model: Model = serde_json::from_str(content).map_err(|e| SharedError::DeserializationError {
            message: format!("model document: {e}"),
        })?;
        model.validate()?;
        Ok(model)
    }

    /// Structural checks performed when a model is loaded from storage
    pub fn validate(&self) -> SharedResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for var in &self.variables {
            if !seen.insert(var.name.as_str()) {
                return Err(SharedError::invalid_model(format!("duplicate variable '{}'", var.name)));
            }
            if let Some(upper) = var.upper {
                if upper < var.lower {
                    return Err(SharedError::invalid_model(format!(
                        "variable '{}' has upper bound below lower bound",
                        var.name
                    )));
                }
            }
        }

        let mut names = std::collections::BTreeSet::new();
        for constraint in &self.constraints {
            if !names.insert(constraint.name.as_str()) {
                return Err(SharedError::DuplicateConstraint {
                    name: constraint.name.clone(),
                });
            }
            if let Some(var) = constraint.expr.terms.keys().find(|v| !seen.contains(v.as_str())) {
                return Err(SharedError::invalid_model(format!(
                    "constraint '{}' references unknown variable '{}'",
                    constraint.name, var
                )));
            }
        }

        if let Some(objective) = &self.objective {
            if !objective.expr.is_finite() {
                return Err(SharedError::invalid_model("objective has non-finite coefficients"));
            }
        }
        Ok(())
    }
}

/// One solver-ready snapshot handed to exactly one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInstance {
    pub label: String,
    pub model: Model,
}

impl ProblemInstance {
    pub fn new(label: impl Into<String>, model: Model) -> Self {
        Self {
            label: label.into(),
            model,
        }
    }
}
