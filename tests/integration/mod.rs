//! Integration tests for the state-gated deferred invocation queue

mod concurrent_access;
mod reentrancy;
mod replay_cli;
