//! Readygate: State-Gated Deferred Invocation
//!
//! Lets callers issue operations against a subsystem before it has reached the lifecycle state
//! those operations need. Each operation runs exactly once, in submission order among those
//! sharing eligibility, the moment the required state is reached, or never if the queue is
//! reset first.

pub mod cli;
pub mod config;
pub mod engine_state;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod operation;
pub mod queue;
pub mod replay;

pub use engine_state::EngineState;
pub use error::{OperationFailure, QueueError};
pub use lifecycle::Lifecycle;
pub use operation::{ArgKind, Args, OperationRegistry, TargetRef, TypedValue, Value};
pub use queue::{StateGatedQueue, Submission};
