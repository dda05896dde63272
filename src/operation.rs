//! Late-bound operations
//!
//! Operations are resolved through an explicit [`OperationRegistry`] instead of runtime
//! reflection: the host registers named handlers with exact parameter signatures, and a
//! submission resolves `(target, name, args)` against that table before anything is queued.

pub mod args;
pub mod call;
pub mod registry;

pub use args::{Arg, ArgKind, Args, TypedValue, Value};
pub use call::{Invocation, PendingCall, TargetRef};
pub use registry::OperationRegistry;

use std::fmt;

/// Operation identifier: name plus parameter signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId {
    pub name: String,
    pub signature: Vec<ArgKind>,
}

impl OperationId {
    pub fn new(name: impl Into<String>, signature: Vec<ArgKind>) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, kind) in self.signature.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", kind)?;
        }
        f.write_str(")")
    }
}
