//! Native engine boot lattice.
//!
//! Teardown states reuse the readiness rank of earlier boot stages: an engine that is exiting
//! still has its libraries loaded, but nothing that needs a running engine may start.

use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a native engine hosted by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Initial,
    Launched,
    LoaderReady,
    LibrariesReady,
    BindingsReady,
    ProfileReady,
    Running,
    Exiting,
    Restarting,
    Exited,
}

impl EngineState {
    pub const ALL: [EngineState; 10] = [
        EngineState::Initial,
        EngineState::Launched,
        EngineState::LoaderReady,
        EngineState::LibrariesReady,
        EngineState::BindingsReady,
        EngineState::ProfileReady,
        EngineState::Running,
        EngineState::Exiting,
        EngineState::Restarting,
        EngineState::Exited,
    ];

    /// Readiness rank used by `is_at_least`
    pub fn rank(self) -> u8 {
        match self {
            EngineState::Initial => 0,
            EngineState::Launched => 1,
            EngineState::LoaderReady => 2,
            EngineState::LibrariesReady => 3,
            EngineState::BindingsReady => 4,
            EngineState::ProfileReady => 5,
            EngineState::Running => 6,
            EngineState::Exiting => 3,
            EngineState::Restarting => 3,
            EngineState::Exited => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Initial => "initial",
            EngineState::Launched => "launched",
            EngineState::LoaderReady => "loader_ready",
            EngineState::LibrariesReady => "libraries_ready",
            EngineState::BindingsReady => "bindings_ready",
            EngineState::ProfileReady => "profile_ready",
            EngineState::Running => "running",
            EngineState::Exiting => "exiting",
            EngineState::Restarting => "restarting",
            EngineState::Exited => "exited",
        }
    }
}

impl Lifecycle for EngineState {
    fn is(&self, other: &Self) -> bool {
        self == other
    }

    fn is_at_least(&self, other: &Self) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EngineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("Unknown engine state: {}", s))
    }
}
