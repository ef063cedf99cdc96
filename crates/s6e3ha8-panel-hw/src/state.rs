//! Panel lifecycle states.
//!
//! The framework drives the panel through `prepare`, `enable`, `disable` and
//! `unprepare` in that order. Any other call order is rejected.

use serde::Serialize;

/// Power state of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Supplies off, reset asserted or not wired. No commands possible.
    #[default]
    Unpowered,
    /// Powered, out of reset and out of sleep, display output still off.
    Prepared,
    /// Display output on.
    Enabled,
}

/// Lifecycle operation requested by the display pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Prepare,
    Unprepare,
    Enable,
    Disable,
}

impl LifecycleState {
    /// Returns the state a successful `operation` leads to, or `None` if the
    /// operation is not allowed from this state.
    pub fn transition(self, operation: Operation) -> Option<LifecycleState> {
        use LifecycleState::*;
        match (self, operation) {
            (Unpowered, Operation::Prepare) => Some(Prepared),
            (Prepared | Enabled, Operation::Unprepare) => Some(Unpowered),
            (Prepared, Operation::Enable) => Some(Enabled),
            (Enabled, Operation::Disable) => Some(Prepared),
            _ => None,
        }
    }
}

impl Operation {
    /// The bring-up and tear-down order used by the display pipeline.
    pub const SEQUENCE: [Operation; 4] = [
        Operation::Prepare,
        Operation::Enable,
        Operation::Disable,
        Operation::Unprepare,
    ];
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unpowered => write!(f, "unpowered"),
            LifecycleState::Prepared => write!(f, "prepared"),
            LifecycleState::Enabled => write!(f, "enabled"),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Prepare => write!(f, "prepare"),
            Operation::Unprepare => write!(f, "unprepare"),
            Operation::Enable => write!(f, "enable"),
            Operation::Disable => write!(f, "disable"),
        }
    }
}
