//! Consumer lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of a batch consumer
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl HandlerState {
    /// Whether `start` is legal in this state
    #[inline]
    pub fn can_start(self) -> bool {
        matches!(self, HandlerState::Stopped)
    }
}

impl std::fmt::Display for HandlerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerState::Stopped => write!(f, "stopped"),
            HandlerState::Starting => write!(f, "starting"),
            HandlerState::Running => write!(f, "running"),
            HandlerState::Stopping => write!(f, "stopping"),
        }
    }
}
