//! Operation registry: the table late-bound calls are resolved against.
//!
//! Each entry is keyed by name and exact signature, so one name may carry several overloads.
//! Resolution picks the overload whose signature equals the kinds of the resolved arguments.

use crate::error::{QueueError, RegistryError};
use crate::operation::args::{ArgKind, Args, TypedValue};
use crate::operation::call::{Handler, Invocation, TargetRef};
use crate::operation::OperationId;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
enum Receiver {
    Static,
    Instance {
        type_id: TypeId,
        type_name: &'static str,
    },
}

enum Dispatch {
    Deferrable(Receiver, Handler),
    Forbidden(String),
}

struct Entry {
    id: OperationId,
    dispatch: Dispatch,
}

/// Registered operations available to late-bound calls
#[derive(Default)]
pub struct OperationRegistry {
    entries: HashMap<String, Vec<Entry>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation that runs without a target.
    pub fn register_static<F>(
        &mut self,
        name: &str,
        signature: &[ArgKind],
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&[TypedValue]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler =
            Arc::new(move |_target: Option<&TargetRef>, args: &[TypedValue]| handler(args));
        self.insert(
            OperationId::new(name, signature.to_vec()),
            Dispatch::Deferrable(Receiver::Static, handler),
        )
    }

    /// Register an operation invoked on a target of concrete type `T`.
    pub fn register_instance<T, F>(
        &mut self,
        name: &str,
        signature: &[ArgKind],
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        T: Any + Send + Sync,
        F: Fn(&T, &[TypedValue]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler =
            Arc::new(move |target: Option<&TargetRef>, args: &[TypedValue]| {
                let target = target
                    .and_then(|t| t.downcast_ref::<T>())
                    .ok_or_else(|| anyhow::anyhow!("target is not a {}", type_name::<T>()))?;
                handler(target, args)
            });
        let receiver = Receiver::Instance {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        };
        self.insert(
            OperationId::new(name, signature.to_vec()),
            Dispatch::Deferrable(receiver, handler),
        )
    }

    /// Register an operation the host knows about but that must never be deferred.
    pub fn register_forbidden(
        &mut self,
        name: &str,
        signature: &[ArgKind],
        reason: impl Into<String>,
    ) -> Result<&mut Self, RegistryError> {
        self.insert(
            OperationId::new(name, signature.to_vec()),
            Dispatch::Forbidden(reason.into()),
        )
    }

    fn insert(&mut self, id: OperationId, dispatch: Dispatch) -> Result<&mut Self, RegistryError> {
        let overloads = self.entries.entry(id.name.clone()).or_default();
        if overloads.iter().any(|entry| entry.id == id) {
            return Err(RegistryError::Duplicate(id));
        }
        overloads.push(Entry { id, dispatch });
        Ok(self)
    }

    /// Number of registered overloads
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered operation ids, sorted by display form
    pub fn operations(&self) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = self
            .entries
            .values()
            .flat_map(|overloads| overloads.iter().map(|entry| entry.id.clone()))
            .collect();
        ids.sort_by_key(|id| id.to_string());
        ids
    }

    /// Resolve `(target, name, args)` to a callable invocation.
    pub fn resolve(
        &self,
        target: Option<TargetRef>,
        name: &str,
        args: &Args,
    ) -> Result<Invocation, QueueError> {
        let overloads = self
            .entries
            .get(name)
            .ok_or_else(|| QueueError::UnresolvedOperation {
                operation: name.to_string(),
                reason: "no operation with this name is registered".to_string(),
            })?;

        let values = args.resolve().map_err(|reason| QueueError::ArgumentShape {
            operation: name.to_string(),
            reason,
        })?;
        let kinds: Vec<ArgKind> = values.iter().map(TypedValue::kind).collect();

        let entry = overloads
            .iter()
            .find(|entry| entry.id.signature == kinds)
            .ok_or_else(|| QueueError::UnresolvedOperation {
                operation: OperationId::new(name, kinds.clone()).to_string(),
                reason: format!(
                    "no overload matches; registered: {}",
                    overloads
                        .iter()
                        .map(|entry| entry.id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })?;

        let (receiver, handler) = match &entry.dispatch {
            Dispatch::Forbidden(reason) => {
                return Err(QueueError::DisallowedOperation {
                    operation: entry.id.clone(),
                    reason: reason.clone(),
                })
            }
            Dispatch::Deferrable(receiver, handler) => (*receiver, handler),
        };

        check_receiver(&entry.id, receiver, target.as_ref())?;
        trace!(operation = %entry.id, "Resolved operation");

        Ok(Invocation::new(
            entry.id.clone(),
            target,
            values,
            Arc::clone(handler),
        ))
    }
}

fn check_receiver(
    id: &OperationId,
    receiver: Receiver,
    target: Option<&TargetRef>,
) -> Result<(), QueueError> {
    let unresolved = |reason: String| QueueError::UnresolvedOperation {
        operation: id.to_string(),
        reason,
    };
    match (receiver, target) {
        (Receiver::Static, None) => Ok(()),
        (Receiver::Static, Some(_)) => {
            Err(unresolved("static operation does not take a target".to_string()))
        }
        (Receiver::Instance { type_name, .. }, None) => Err(unresolved(format!(
            "instance operation requires a target of type {}",
            type_name
        ))),
        (Receiver::Instance { type_id, type_name }, Some(target)) => {
            if (**target).type_id() == type_id {
                Ok(())
            } else {
                Err(unresolved(format!("target is not a {}", type_name)))
            }
        }
    }
}
