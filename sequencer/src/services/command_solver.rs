//! Solver backend running an external command per solve
//!
//! The command receives `{ "options": ..., "instance": ... }` as JSON on
//! stdin and must print a `SolverOutput` JSON document on stdout. A non-zero
//! exit status or unparseable output is reported as a solver error, which the
//! worker turns into a failed result.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use shared::{process_debug, ProblemInstance, ProcessId, SolverOutput};

use crate::config::SolverSettings;
use crate::error::{SequencerError, SequencerResult};
use crate::traits::{Solver, SolverFactory};

/// Option keys consumed by the factory rather than passed to the backend
const COMMAND_KEY: &str = "command";
const ARGS_KEY: &str = "args";

#[derive(Serialize)]
struct SolveRequest<'a> {
    options: &'a BTreeMap<String, serde_json::Value>,
    instance: &'a ProblemInstance,
}

/// One external solver command
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    options: BTreeMap<String, serde_json::Value>,
}

impl CommandSolver {
    pub fn new(program: impl Into<String>, args: Vec<String>, options: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            program: program.into(),
            args,
            options,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Solver for CommandSolver {
    async fn solve(&self, instance: &ProblemInstance) -> SequencerResult<SolverOutput> {
        let payload = serde_json::to_vec(&SolveRequest {
            options: &self.options,
            instance,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SequencerError::solver(format!("Failed to launch solver '{}': {e}", self.program)))?;

        // Feed stdin while collecting output, so a backend that writes a lot
        // before it finishes reading cannot stall on a full pipe.
        let stdin = child.stdin.take();
        let program = self.program.as_str();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // A backend may exit before reading its input; its exit status tells the story.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    process_debug!(ProcessId::current(), "Solver '{}' closed stdin early", program);
                    Ok(())
                }
                other => other,
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SequencerError::solver(format!(
                "solver '{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| SequencerError::solver(format!("malformed output from solver '{}': {e}", self.program)))
    }
}

/// Builds `CommandSolver`s from solver settings
///
/// The executable is `options.command` when present, otherwise the solver
/// name; `options.args` supplies its arguments. All other options are passed
/// through to the backend untouched.
#[derive(Debug, Clone, Default)]
pub struct CommandSolverFactory;

impl CommandSolverFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SolverFactory for CommandSolverFactory {
    fn create_solver(&self, settings: &SolverSettings) -> SequencerResult<Arc<dyn Solver>> {
        let mut options = settings.options.clone();

        let program = match options.remove(COMMAND_KEY) {
            Some(serde_json::Value::String(command)) => command,
            Some(other) => {
                return Err(SequencerError::config(
                    "solver.options.command",
                    format!("must be a string, got {other}"),
                ))
            }
            None => settings.name.clone(),
        };
        if program.trim().is_empty() {
            return Err(SequencerError::config("solver.name", "no solver command configured"));
        }

        let args = match options.remove(ARGS_KEY) {
            None => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s),
                    other => Err(SequencerError::config(
                        "solver.options.args",
                        format!("arguments must be strings, got {other}"),
                    )),
                })
                .collect::<SequencerResult<Vec<_>>>()?,
            Some(other) => {
                return Err(SequencerError::config(
                    "solver.options.args",
                    format!("must be an array, got {other}"),
                ))
            }
        };

        Ok(Arc::new(CommandSolver::new(program, args, options)))
    }
}
