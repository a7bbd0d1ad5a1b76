//! Directional alternative generator
//!
//! Projects every solution onto a small set of activity dimensions (one per
//! variable category, or one per variable) and asks the solver to push the
//! solution along chosen directions in that space. Hull expansion first
//! tries both extremes of every dimension, waits for those results, then
//! continues with random directions. Exploration is exhausted once `patience`
//! consecutive results land on points already seen.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};

use shared::{process_debug, process_info, Candidate, LinearExpr, Model, Objective, ProblemInstance, ProcessId, SolveResult};

use crate::config::{MgaAxis, MgaSettings, MgaWeighting};
use crate::error::{SequencerError, SequencerResult};
use crate::traits::{AlternativeGenerator, GeneratorContext, GeneratorFactory};

/// Distance below which two projected points count as the same
const POINT_TOLERANCE: f64 = 1e-6;

/// One coordinate of the projection space
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub expr: LinearExpr,
}

/// Build the projection dimensions for a model
pub fn dimensions(model: &Model, axis: MgaAxis) -> Vec<Dimension> {
    match axis {
        MgaAxis::VariableActivity => model
            .variables
            .iter()
            .map(|v| Dimension {
                name: v.name.clone(),
                expr: LinearExpr::from_terms([(v.name.as_str(), 1.0)]),
            })
            .collect(),
        MgaAxis::CategoryActivity => {
            let mut by_category: BTreeMap<&str, LinearExpr> = BTreeMap::new();
            for var in &model.variables {
                if let Some(category) = var.category.as_deref() {
                    by_category.entry(category).or_default().add_term(var.name.as_str(), 1.0);
                }
            }
            by_category
                .into_iter()
                .map(|(name, expr)| Dimension {
                    name: name.to_string(),
                    expr,
                })
                .collect()
        }
    }
}

/// Where the generator is in its candidate sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Emitting axis-aligned extremes
    Axes,
    /// All extremes emitted, waiting for their results
    AwaitAxes,
    Random,
}

pub struct DirectionalGenerator {
    model: Model,
    dims: Vec<Dimension>,
    stage: Stage,
    queue: VecDeque<(String, Vec<f64>)>,
    rng: StdRng,
    patience: u32,
    stale: u32,
    outstanding: usize,
    emitted: u64,
    points: Vec<Vec<f64>>,
}

impl DirectionalGenerator {
    pub fn new(context: GeneratorContext, patience: u32) -> SequencerResult<Self> {
        let dims = dimensions(&context.model, context.axis);
        if dims.is_empty() {
            return Err(SequencerError::generator(format!(
                "model '{}' has no dimensions along axis {}",
                context.model.name, context.axis
            )));
        }
        if patience == 0 {
            return Err(SequencerError::config("mga.patience", "must be at least 1"));
        }

        let (stage, queue) = match context.weighting {
            MgaWeighting::HullExpansion => (Stage::Axes, axis_directions(&dims)),
            MgaWeighting::Random => (Stage::Random, VecDeque::new()),
        };
        let rng = match context.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        process_debug!(
            ProcessId::current(),
            "Directional generator over {} dimensions ({}, {})",
            dims.len(),
            context.axis,
            context.weighting
        );

        Ok(Self {
            model: context.model,
            dims,
            stage,
            queue,
            rng,
            patience,
            stale: 0,
            outstanding: 0,
            emitted: 0,
            points: Vec::new(),
        })
    }

    /// Distinct projected points seen so far
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    fn instance(&mut self, tag: &str, weights: &[f64]) -> ProblemInstance {
        let mut expr = LinearExpr::new();
        for (dim, weight) in self.dims.iter().zip(weights) {
            for (var, coef) in &dim.expr.terms {
                expr.add_term(var.as_str(), weight * coef);
            }
        }

        self.emitted += 1;
        self.outstanding += 1;
        let label = format!("mga_{}_{}", self.emitted, tag);
        ProblemInstance::new(label.clone(), self.model.with_objective(Objective::minimize(label, expr)))
    }

    fn random_weights(&mut self) -> Vec<f64> {
        loop {
            let weights: Vec<f64> = (0..self.dims.len()).map(|_| self.rng.gen_range(-1.0..=1.0)).collect();
            let norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
            if norm > f64::EPSILON {
                return weights.into_iter().map(|w| w / norm).collect();
            }
        }
    }

    fn project(&self, values: &BTreeMap<String, f64>) -> Vec<f64> {
        self.dims.iter().map(|d| d.expr.evaluate(values)).collect()
    }

    fn is_known(&self, point: &[f64]) -> bool {
        self.points.iter().any(|p| {
            p.iter()
                .zip(point)
                .all(|(a, b)| (a - b).abs() <= POINT_TOLERANCE * a.abs().max(b.abs()).max(1.0))
        })
    }
}

/// Minimise then maximise each dimension
fn axis_directions(dims: &[Dimension]) -> VecDeque<(String, Vec<f64>)> {
    let mut queue = VecDeque::with_capacity(dims.len() * 2);
    for (i, dim) in dims.iter().enumerate() {
        for (sign, tag) in [(1.0, "min"), (-1.0, "max")] {
            let mut weights = vec![0.0; dims.len()];
            weights[i] = sign;
            queue.push_back((format!("{tag}_{}", dim.name), weights));
        }
    }
    queue
}

#[async_trait]
impl AlternativeGenerator for DirectionalGenerator {
    async fn next_candidate(&mut self) -> SequencerResult<Option<Candidate>> {
        if self.stop_resolving() {
            return Ok(None);
        }

        if self.stage == Stage::Axes {
            if let Some((tag, weights)) = self.queue.pop_front() {
                if self.queue.is_empty() {
                    self.stage = Stage::AwaitAxes;
                }
                return Ok(Some(Candidate::Instance(self.instance(&tag, &weights))));
            }
            self.stage = Stage::AwaitAxes;
        }

        if self.stage == Stage::AwaitAxes {
            if self.outstanding > 0 {
                return Ok(Some(Candidate::Wait));
            }
            process_debug!(ProcessId::current(), "Axis extremes explored; switching to random directions");
            self.stage = Stage::Random;
        }

        let weights = self.random_weights();
        Ok(Some(Candidate::Instance(self.instance("random", &weights))))
    }

    async fn process_result(&mut self, result: &SolveResult) -> SequencerResult<()> {
        self.outstanding = self.outstanding.saturating_sub(1);

        if !result.is_optimal() {
            self.stale += 1;
            return Ok(());
        }

        let point = self.project(&result.values);
        if self.is_known(&point) {
            self.stale += 1;
        } else {
            self.points.push(point);
            self.stale = 0;
        }
        Ok(())
    }

    fn stop_resolving(&self) -> bool {
        self.stage == Stage::Random && self.stale >= self.patience
    }

    async fn finalize(&mut self) -> SequencerResult<()> {
        let pid = ProcessId::current();
        process_info!(
            pid,
            "Explored {} distinct points across {} dimensions from {} candidates",
            self.points.len(),
            self.dims.len(),
            self.emitted
        );
        let names: Vec<&str> = self.dims.iter().map(|d| d.name.as_str()).collect();
        for point in &self.points {
            process_debug!(pid, "Point {:?} = {:?}", names, point);
        }
        Ok(())
    }
}

/// Builds a `DirectionalGenerator` once the relaxed model exists
#[derive(Debug, Clone)]
pub struct DirectionalGeneratorFactory {
    pub patience: u32,
}

impl DirectionalGeneratorFactory {
    pub fn from_settings(settings: &MgaSettings) -> Self {
        Self {
            patience: settings.patience,
        }
    }
}

impl Default for DirectionalGeneratorFactory {
    fn default() -> Self {
        Self::from_settings(&MgaSettings::default())
    }
}

impl GeneratorFactory for DirectionalGeneratorFactory {
    fn build(&self, context: GeneratorContext) -> SequencerResult<Box<dyn AlternativeGenerator>> {
        Ok(Box::new(DirectionalGenerator::new(context, self.patience)?))
    }
}
