//! Late-bound calls: resolved invocations, optionally held behind a readiness gate.

use crate::error::OperationFailure;
use crate::lifecycle::Lifecycle;
use crate::operation::args::TypedValue;
use crate::operation::OperationId;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Object identity a call is bound to
pub type TargetRef = Arc<dyn Any + Send + Sync>;

pub(crate) type Handler =
    Arc<dyn Fn(Option<&TargetRef>, &[TypedValue]) -> anyhow::Result<()> + Send + Sync>;

/// A resolved call: target, operation and concrete arguments.
#[derive(Clone)]
pub struct Invocation {
    operation: OperationId,
    target: Option<TargetRef>,
    args: Vec<TypedValue>,
    handler: Handler,
}

impl Invocation {
    pub(crate) fn new(
        operation: OperationId,
        target: Option<TargetRef>,
        args: Vec<TypedValue>,
        handler: Handler,
    ) -> Self {
        Self {
            operation,
            target,
            args,
            handler,
        }
    }

    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    pub fn args(&self) -> &[TypedValue] {
        &self.args
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    pub fn invoke(&self) -> anyhow::Result<()> {
        (self.handler)(self.target.as_ref(), &self.args)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("operation", &self.operation)
            .field("has_target", &self.has_target())
            .field("args", &self.args)
            .finish()
    }
}

/// An invocation waiting for its gating state.
///
/// Immutable once built; the queue either runs it (consuming it) or keeps it.
pub struct PendingCall<S> {
    seq: u64,
    gate: S,
    invocation: Invocation,
}

impl<S: Lifecycle> PendingCall<S> {
    pub(crate) fn new(seq: u64, gate: S, invocation: Invocation) -> Self {
        Self {
            seq,
            gate,
            invocation,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn gate(&self) -> &S {
        &self.gate
    }

    pub fn operation(&self) -> &OperationId {
        self.invocation.operation()
    }

    pub fn is_eligible(&self, state: &S) -> bool {
        state.is_at_least(&self.gate)
    }

    /// Run the call once. A panicking handler is reported as a failure like a returned error.
    pub(crate) fn run(self) -> Result<(), OperationFailure> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.invocation.invoke()))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!("operation panicked: {}", panic_message(payload.as_ref())))
            });
        outcome.map_err(|error| OperationFailure {
            operation: self.invocation.operation,
            seq: self.seq,
            error: error.into(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl<S: fmt::Debug> fmt::Debug for PendingCall<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("seq", &self.seq)
            .field("gate", &self.gate)
            .field("invocation", &self.invocation)
            .finish()
    }
}
