//! Scripted lifecycle replay
//!
//! Drives a [`StateGatedQueue`] over [`EngineState`] from a TOML script, against a small table of
//! built-in operations, and reports what ran and in which order. Used by the `readygate` binary
//! to exercise gating rules without a real engine.

use crate::config::QueueConfig;
use crate::engine_state::EngineState;
use crate::error::{ApiError, QueueError};
use crate::operation::{ArgKind, Args, OperationRegistry, Value};
use crate::queue::{QueueStats, StateGatedQueue, Submission};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A replay script
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default = "default_initial")]
    pub initial: EngineState,

    #[serde(default = "default_ready")]
    pub ready: EngineState,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_initial() -> EngineState {
    EngineState::Initial
}

fn default_ready() -> EngineState {
    EngineState::Running
}

/// One scripted action
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Submit {
        submit: String,
        gate: EngineState,
        #[serde(default)]
        args: Vec<ScriptArg>,
    },
    Advance {
        advance: EngineState,
        #[serde(default)]
        expect: Option<EngineState>,
    },
    Reset {
        reset: EngineState,
    },
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::Submit { submit, gate, .. } => format!("submit {} until {}", submit, gate),
            Step::Advance {
                advance,
                expect: Some(expected),
            } => format!("advance {} -> {}", expected, advance),
            Step::Advance { advance, .. } => format!("advance -> {}", advance),
            Step::Reset { reset } => format!("reset -> {}", reset),
        }
    }
}

/// A script argument: a plain TOML value, a tagged value, or a tagged null.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptArg {
    Tagged { tag: ArgKind, value: toml::Value },
    Null { null: ArgKind },
    Plain(toml::Value),
}

impl Script {
    pub fn from_toml_str(source: &str) -> Result<Self, ApiError> {
        toml::from_str(source).map_err(|e| ApiError::ScriptError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Resolve every submission against the built-in table without running anything.
    ///
    /// Returns one message per problem, prefixed with the step number.
    pub fn check(&self) -> Vec<String> {
        let registry = builtin_registry(Arc::new(Mutex::new(Transcript::default())));
        let mut problems = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            if let Step::Submit { submit, args, .. } = step {
                let resolved = to_args(args)
                    .map_err(|e| e.to_string())
                    .and_then(|args| {
                        registry
                            .resolve(None, submit, &args)
                            .map(|_| ())
                            .map_err(|e| e.to_string())
                    });
                if let Err(problem) = resolved {
                    problems.push(format!("step {}: {}", index + 1, problem));
                }
            }
        }
        problems
    }
}

fn to_value(value: &toml::Value) -> Result<Value, ApiError> {
    match value {
        toml::Value::Boolean(v) => Ok(Value::Bool(*v)),
        toml::Value::Integer(v) => Ok(Value::Int(*v)),
        toml::Value::Float(v) => Ok(Value::Float(*v)),
        toml::Value::String(v) => Ok(Value::Str(v.clone())),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(byte) => u8::try_from(*byte).map_err(|_| {
                    ApiError::ScriptError(format!("byte value out of range: {}", byte))
                }),
                other => Err(ApiError::ScriptError(format!(
                    "byte arrays may only contain integers, found {}",
                    other.type_str()
                ))),
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Value::Bytes),
        other => Err(ApiError::ScriptError(format!(
            "unsupported argument type: {}",
            other.type_str()
        ))),
    }
}

fn to_args(args: &[ScriptArg]) -> Result<Args, ApiError> {
    args.iter().try_fold(Args::new(), |acc, arg| {
        Ok(match arg {
            ScriptArg::Tagged { tag, value } => acc.typed(*tag, to_value(value)?),
            ScriptArg::Null { null } => acc.null(*null),
            ScriptArg::Plain(value) => acc.push(to_value(value)?),
        })
    })
}

/// Record of what built-in operations did
#[derive(Debug, Default)]
pub struct Transcript {
    pub lines: Vec<String>,
    pub total: i64,
}

/// Built-in operations available to scripts:
/// `note(str)`, `count(i64)`, `fail(str)`, and the non-deferrable `emit(str)`.
pub fn builtin_registry(transcript: Arc<Mutex<Transcript>>) -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    let note = Arc::clone(&transcript);
    let count = Arc::clone(&transcript);

    // The handlers and signatures below are fixed; registration cannot collide.
    let _ = registry.register_static("note", &[ArgKind::Str], move |args| {
        let text = args[0].as_str().unwrap_or("<null>");
        note.lock().lines.push(format!("note: {}", text));
        Ok(())
    });
    let _ = registry.register_static("count", &[ArgKind::I64], move |args| {
        let n = args[0].as_i64().unwrap_or_default();
        let mut transcript = count.lock();
        transcript.total += n;
        let line = format!("count: +{} = {}", n, transcript.total);
        transcript.lines.push(line);
        Ok(())
    });
    let _ = registry.register_static("fail", &[ArgKind::Str], |args| {
        anyhow::bail!("{}", args[0].as_str().unwrap_or("failed"))
    });
    let _ = registry.register_forbidden(
        "emit",
        &[ArgKind::Str],
        "emit writes straight to the embedder and has no deferred re-entry point",
    );
    registry
}

/// Result of one step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepResult {
    Executed,
    Queued { seq: u64 },
    Advanced { state: EngineState },
    Rejected { current: EngineState },
    Reset { discarded: usize },
    Failed { error: String },
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Executed => f.write_str("executed"),
            StepResult::Queued { seq } => write!(f, "queued #{}", seq),
            StepResult::Advanced { state } => write!(f, "advanced to {}", state),
            StepResult::Rejected { current } => write!(f, "rejected (state is {})", current),
            StepResult::Reset { discarded } => write!(f, "reset, discarded {}", discarded),
            StepResult::Failed { error } => write!(f, "error: {}", error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub action: String,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub transcript: Vec<String>,
    pub stats: QueueStats<EngineState>,
}

impl ReplayReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for outcome in &self.steps {
            out.push_str(&format!(
                "{:>3}  {:<40} {}\n",
                outcome.step, outcome.action, outcome.result
            ));
        }
        out.push_str("\ntranscript:\n");
        for line in &self.transcript {
            out.push_str(&format!("  {}\n", line));
        }
        out.push_str(&format!(
            "\nstate: {}  ready: {}  pending: {}  executed: {}  failed: {}  discarded: {}\n",
            self.stats.state,
            self.stats.ready,
            self.stats.pending,
            self.stats.executed,
            self.stats.failed,
            self.stats.discarded
        ));
        out
    }
}

/// Run a script to completion. Step errors are recorded, not fatal.
pub fn run_script(script: &Script, config: &QueueConfig) -> ReplayReport {
    let transcript = Arc::new(Mutex::new(Transcript::default()));
    let registry = Arc::new(builtin_registry(Arc::clone(&transcript)));
    let queue = StateGatedQueue::with_config(script.initial, script.ready, registry, config);
    info!(
        steps = script.steps.len(),
        initial = %script.initial,
        ready = %queue.ready_state(),
        "Starting replay"
    );

    let mut steps = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let result = run_step(&queue, step);
        debug!(step = index + 1, result = %result, "Replayed step");
        steps.push(StepOutcome {
            step: index + 1,
            action: step.describe(),
            result,
        });
    }

    let lines = std::mem::take(&mut transcript.lock().lines);
    ReplayReport {
        steps,
        transcript: lines,
        stats: queue.stats(),
    }
}

fn run_step(queue: &StateGatedQueue<EngineState>, step: &Step) -> StepResult {
    match step {
        Step::Submit { submit, gate, args } => {
            let args = match to_args(args) {
                Ok(args) => args,
                Err(e) => {
                    return StepResult::Failed {
                        error: e.to_string(),
                    }
                }
            };
            match queue.submit_static(submit, *gate, args) {
                Ok(Submission::Executed) => StepResult::Executed,
                Ok(Submission::Queued { seq }) => StepResult::Queued { seq },
                Err(e) => failed(&e),
            }
        }
        Step::Advance { advance, expect } => {
            match queue.try_advance(expect.as_ref(), *advance) {
                Ok(true) => StepResult::Advanced { state: *advance },
                Ok(false) => StepResult::Rejected {
                    current: queue.state(),
                },
                Err(e) => failed(&e),
            }
        }
        Step::Reset { reset } => {
            let discarded = queue.pending_len();
            queue.reset(*reset);
            StepResult::Reset { discarded }
        }
    }
}

fn failed(error: &QueueError) -> StepResult {
    let mut message = error.to_string();
    for failure in error.failures() {
        message.push_str(&format!("; {}", failure));
    }
    StepResult::Failed { error: message }
}
