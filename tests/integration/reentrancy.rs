//! Integration tests for calls that re-enter the queue while it is flushing

use super::test_utils::{logged, recording_registry, Log};
use readygate::operation::{ArgKind, Args};
use readygate::queue::StateGatedQueue;
use std::sync::{Arc, OnceLock, Weak};

type QueueSlot = Arc<OnceLock<Weak<StateGatedQueue<u32>>>>;

fn upgrade(slot: &QueueSlot) -> anyhow::Result<Arc<StateGatedQueue<u32>>> {
    slot.get()
        .and_then(Weak::upgrade)
        .ok_or_else(|| anyhow::anyhow!("queue is gone"))
}

/// Queue whose registry can submit, advance and reset the queue itself.
fn create_reentrant_queue(initial: u32, ready: u32) -> (Arc<StateGatedQueue<u32>>, Log) {
    let (mut registry, log) = recording_registry();
    let slot: QueueSlot = Arc::new(OnceLock::new());

    let chain_slot = Arc::clone(&slot);
    let advance_slot = Arc::clone(&slot);
    let reset_slot = Arc::clone(&slot);
    registry
        .register_static("chain", &[ArgKind::Str, ArgKind::I32], move |args| {
            let queue = upgrade(&chain_slot)?;
            let text = args[0].as_str().unwrap_or_default().to_string();
            let gate = args[1].as_i64().unwrap_or_default() as u32;
            queue.submit_static("record", gate, Args::new().push(text))?;
            Ok(())
        })
        .unwrap()
        .register_static("advance_to", &[ArgKind::I32], move |args| {
            let queue = upgrade(&advance_slot)?;
            queue.advance(args[0].as_i64().unwrap_or_default() as u32)?;
            Ok(())
        })
        .unwrap()
        .register_static("reset_to", &[ArgKind::I32], move |args| {
            let queue = upgrade(&reset_slot)?;
            queue.reset(args[0].as_i64().unwrap_or_default() as u32);
            Ok(())
        })
        .unwrap();

    let queue = Arc::new(StateGatedQueue::new(initial, ready, Arc::new(registry)));
    slot.set(Arc::downgrade(&queue)).unwrap();
    (queue, log)
}

#[test]
fn test_submission_from_flush_sees_committed_state() {
    let (queue, log) = create_reentrant_queue(0, 2);
    queue
        .submit_static("chain", 1, Args::new().push("inline").push(1))
        .unwrap();
    queue
        .submit_static("chain", 1, Args::new().push("later").push(2))
        .unwrap();

    queue.advance(1).unwrap();

    // Gate 1 is already met by the committed state, gate 2 is not.
    assert_eq!(logged(&log), vec!["inline"]);
    assert_eq!(queue.pending_len(), 1);

    queue.advance(2).unwrap();
    assert_eq!(logged(&log), vec!["inline", "later"]);
}

#[test]
fn test_resubmission_waits_for_later_transition() {
    let (queue, log) = create_reentrant_queue(0, 3);
    queue
        .submit_static("chain", 2, Args::new().push("nested").push(3))
        .unwrap();
    queue
        .submit_static("record", 2, Args::new().push("sibling"))
        .unwrap();

    queue.advance(2).unwrap();
    assert_eq!(logged(&log), vec!["sibling"]);

    let pending = queue.pending_snapshot();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, "record(str)");
    assert_eq!(pending[0].gate, 3);
}

#[test]
fn test_nested_advance_flushes_remaining_calls() {
    let (queue, log) = create_reentrant_queue(0, 2);
    queue
        .submit_static("advance_to", 1, Args::new().push(2))
        .unwrap();
    queue
        .submit_static("record", 2, Args::new().push("late"))
        .unwrap();

    queue.advance(1).unwrap();

    assert_eq!(queue.state(), 2);
    assert!(queue.is_ready());
    assert_eq!(logged(&log), vec!["late"]);
    assert_eq!(queue.pending_len(), 0);
}

#[test]
fn test_reset_during_flush_cancels_rest_of_pass() {
    let (queue, log) = create_reentrant_queue(0, 2);
    queue
        .submit_static("record", 1, Args::new().push("first"))
        .unwrap();
    queue
        .submit_static("reset_to", 1, Args::new().push(0))
        .unwrap();
    queue
        .submit_static("record", 1, Args::new().push("cancelled"))
        .unwrap();
    queue
        .submit_static("record", 2, Args::new().push("dropped"))
        .unwrap();

    queue.advance(1).unwrap();

    assert_eq!(logged(&log), vec!["first"]);
    assert_eq!(queue.state(), 0);
    assert_eq!(queue.pending_len(), 0);

    let stats = queue.stats();
    assert_eq!(stats.resets, 1);
    assert_eq!(stats.discarded, 2);

    queue.advance(2).unwrap();
    assert_eq!(logged(&log), vec!["first"]);
}

#[test]
fn test_inline_call_may_reenter() {
    let (queue, log) = create_reentrant_queue(2, 2);
    let outcome = queue
        .submit_static("chain", 0, Args::new().push("reentered").push(1))
        .unwrap();
    assert!(!outcome.is_queued());
    assert_eq!(logged(&log), vec!["reentered"]);
    assert_eq!(queue.stats().executed, 2);
}
