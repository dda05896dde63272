//! State-Gated Deferred Invocation Queue
//!
//! Lets callers issue operations before the target subsystem has reached the lifecycle state
//! they need. A call whose gate already holds runs inline on the submitting thread; any other
//! call is appended to the pending list and runs exactly once, in submission order, during the
//! first transition whose new state reaches its gate. [`StateGatedQueue::reset`] drops all
//! pending work without running it.
//!
//! Locking: `submit`, `try_advance` and `reset` share one reentrant lock per queue. The
//! bookkeeping sits in a `RefCell` behind that lock and is never borrowed while a call runs, so a
//! running call may submit, advance or reset the same queue from the same thread. `state` and
//! `is_ready` read a separately published snapshot and never take the queue lock.
//!
//! During a transition the new state is committed before the eligible calls run, so those calls
//! observe the post-transition state. A call submitted by a running call either runs inline (its
//! gate is already met) or waits for a later transition; it never joins the pass in progress.
//! A reset issued by a running call cancels the rest of that pass.

use crate::config::QueueConfig;
use crate::error::{OperationFailure, QueueError};
use crate::lifecycle::Lifecycle;
use crate::operation::{Args, OperationRegistry, PendingCall, TargetRef};
use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    /// The gate already held; the call ran before `submit` returned
    Executed,
    /// The call was appended to the pending list
    Queued { seq: u64 },
}

impl Submission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued { .. })
    }
}

/// Point-in-time counters for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats<S> {
    pub state: S,
    pub ready: bool,
    pub pending: usize,
    pub executed: u64,
    pub failed: u64,
    pub discarded: u64,
    pub resets: u64,
}

/// Copy of one pending entry
#[derive(Debug, Clone, Serialize)]
pub struct PendingEntry<S> {
    pub seq: u64,
    pub operation: String,
    pub gate: S,
}

struct QueueInner<S> {
    state: S,
    pending: Vec<PendingCall<S>>,
    next_seq: u64,
    /// Incremented by every reset
    epoch: u64,
    executed: u64,
    failed: u64,
    discarded: u64,
    retention_warned: bool,
}

impl<S: Lifecycle> QueueInner<S> {
    fn new(state: S) -> Self {
        Self {
            state,
            pending: Vec::new(),
            next_seq: 1,
            epoch: 0,
            executed: 0,
            failed: 0,
            discarded: 0,
            retention_warned: false,
        }
    }
}

/// Queue that admits late-bound calls now or later depending on a readiness gate.
pub struct StateGatedQueue<S: Lifecycle> {
    ready: S,
    registry: Arc<OperationRegistry>,
    inner: ReentrantMutex<RefCell<QueueInner<S>>>,
    published: RwLock<S>,
    pending_warn_threshold: usize,
}

impl<S: Lifecycle> StateGatedQueue<S> {
    pub fn new(initial: S, ready: S, registry: Arc<OperationRegistry>) -> Self {
        Self::with_config(initial, ready, registry, &QueueConfig::default())
    }

    pub fn with_config(
        initial: S,
        ready: S,
        registry: Arc<OperationRegistry>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            ready,
            registry,
            inner: ReentrantMutex::new(RefCell::new(QueueInner::new(initial.clone()))),
            published: RwLock::new(initial),
            pending_warn_threshold: config.pending_warn_threshold,
        }
    }

    /// True iff the current state is at least the designated ready state.
    pub fn is_ready(&self) -> bool {
        self.published.read().is_at_least(&self.ready)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> S {
        self.published.read().clone()
    }

    pub fn ready_state(&self) -> &S {
        &self.ready
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn pending_len(&self) -> usize {
        let guard = self.inner.lock();
        let len = guard.borrow().pending.len();
        len
    }

    /// Copies of the pending entries, in submission order.
    pub fn pending_snapshot(&self) -> Vec<PendingEntry<S>> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let entries = inner
            .pending
            .iter()
            .map(|call| PendingEntry {
                seq: call.seq(),
                operation: call.operation().to_string(),
                gate: call.gate().clone(),
            })
            .collect();
        entries
    }

    pub fn stats(&self) -> QueueStats<S> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let stats = QueueStats {
            state: inner.state.clone(),
            ready: inner.state.is_at_least(&self.ready),
            pending: inner.pending.len(),
            executed: inner.executed,
            failed: inner.failed,
            discarded: inner.discarded,
            resets: inner.epoch,
        };
        stats
    }

    /// Unconditional transition to `new_state`.
    pub fn advance(&self, new_state: S) -> Result<bool, QueueError> {
        self.try_advance(None, new_state)
    }

    /// Transition to `new_state` if the current state `is` `expected`.
    ///
    /// Returns `Ok(false)` without touching anything when the expectation does not hold.
    /// Otherwise every pending call whose gate `new_state` reaches is removed, the new state is
    /// committed, and the removed calls run in submission order. A call that returns an error or
    /// panics does not stop the others; all failures are returned together as
    /// [`QueueError::FlushFailed`], with the state committed and every removed call consumed.
    pub fn try_advance(&self, expected: Option<&S>, new_state: S) -> Result<bool, QueueError> {
        let guard = self.inner.lock();
        let cell: &RefCell<QueueInner<S>> = &guard;

        let (epoch, eligible) = {
            let mut inner = cell.borrow_mut();
            if let Some(expected) = expected {
                if !inner.state.is(expected) {
                    debug!(
                        current = ?inner.state,
                        expected = ?expected,
                        requested = ?new_state,
                        "Rejected state transition"
                    );
                    return Ok(false);
                }
            }

            let (eligible, retained): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.pending)
                .into_iter()
                .partition(|call| call.is_eligible(&new_state));
            inner.pending = retained;
            if inner.pending.len() < self.pending_warn_threshold {
                inner.retention_warned = false;
            }

            info!(
                from = ?inner.state,
                to = ?new_state,
                flushing = eligible.len(),
                pending = inner.pending.len(),
                "Advancing lifecycle state"
            );
            inner.state = new_state.clone();
            *self.published.write() = new_state.clone();
            (inner.epoch, eligible)
        };

        let failures = run_calls(cell, epoch, eligible);
        if failures.is_empty() {
            Ok(true)
        } else {
            Err(QueueError::FlushFailed {
                state: format!("{:?}", new_state),
                failures,
            })
        }
    }

    /// Submit a late-bound call gated on `gate`.
    ///
    /// The reference is resolved first, so an unknown operation, a bad argument shape or a
    /// non-deferrable operation is rejected even while the queue is not ready.
    pub fn submit(
        &self,
        target: Option<TargetRef>,
        operation: &str,
        gate: S,
        args: Args,
    ) -> Result<Submission, QueueError> {
        let invocation = self.registry.resolve(target, operation, &args)?;

        let guard = self.inner.lock();
        let cell: &RefCell<QueueInner<S>> = &guard;

        let call = {
            let mut inner = cell.borrow_mut();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let call = PendingCall::new(seq, gate, invocation);

            if !call.is_eligible(&inner.state) {
                debug!(
                    seq,
                    operation = %call.operation(),
                    gate = ?call.gate(),
                    state = ?inner.state,
                    "Deferred call until gate is reached"
                );
                inner.pending.push(call);
                self.check_retention(&mut inner);
                return Ok(Submission::Queued { seq });
            }
            call
        };

        debug!(seq = call.seq(), operation = %call.operation(), "Running call inline");
        match call.run() {
            Ok(()) => {
                cell.borrow_mut().executed += 1;
                Ok(Submission::Executed)
            }
            Err(failure) => {
                warn!(
                    seq = failure.seq,
                    operation = %failure.operation,
                    error = %failure.error,
                    "Inline call failed"
                );
                cell.borrow_mut().failed += 1;
                Err(QueueError::OperationFailed(failure))
            }
        }
    }

    /// Convenience for target-less operations.
    pub fn submit_static(
        &self,
        operation: &str,
        gate: S,
        args: Args,
    ) -> Result<Submission, QueueError> {
        self.submit(None, operation, gate, args)
    }

    /// Drop every pending call without running it and restart from `initial`.
    pub fn reset(&self, initial: S) {
        let guard = self.inner.lock();
        let cell: &RefCell<QueueInner<S>> = &guard;

        let dropped = {
            let mut inner = cell.borrow_mut();
            let dropped = std::mem::take(&mut inner.pending);
            inner.epoch += 1;
            inner.discarded += dropped.len() as u64;
            inner.retention_warned = false;
            info!(
                from = ?inner.state,
                to = ?initial,
                discarded = dropped.len(),
                "Reset queue"
            );
            inner.state = initial.clone();
            *self.published.write() = initial;
            dropped
        };
        // Targets may call back into the queue when dropped.
        drop(dropped);
    }

    fn check_retention(&self, inner: &mut QueueInner<S>) {
        if self.pending_warn_threshold == 0 || inner.retention_warned {
            return;
        }
        if inner.pending.len() >= self.pending_warn_threshold {
            inner.retention_warned = true;
            warn!(
                pending = inner.pending.len(),
                threshold = self.pending_warn_threshold,
                state = ?inner.state,
                "Pending calls are accumulating; the gating state may never be reached"
            );
        }
    }
}

fn run_calls<S: Lifecycle>(
    cell: &RefCell<QueueInner<S>>,
    epoch: u64,
    calls: Vec<PendingCall<S>>,
) -> Vec<OperationFailure> {
    let mut failures = Vec::new();
    let mut calls = calls.into_iter();
    while let Some(call) = calls.next() {
        if cell.borrow().epoch != epoch {
            let cancelled = 1 + calls.len();
            cell.borrow_mut().discarded += cancelled as u64;
            info!(cancelled, "Queue was reset during flush; cancelling remaining calls");
            break;
        }

        let seq = call.seq();
        debug!(seq, operation = %call.operation(), "Running deferred call");
        match call.run() {
            Ok(()) => cell.borrow_mut().executed += 1,
            Err(failure) => {
                warn!(
                    seq,
                    operation = %failure.operation,
                    error = %failure.error,
                    "Deferred call failed"
                );
                cell.borrow_mut().failed += 1;
                failures.push(failure);
            }
        }
    }
    failures
}

impl<S: Lifecycle> std::fmt::Debug for StateGatedQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateGatedQueue")
            .field("state", &*self.published.read())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}
