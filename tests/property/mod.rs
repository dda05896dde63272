//! Property-based tests for the queue's delivery guarantees
