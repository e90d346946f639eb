//! Pool lifecycle state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an encoder pool
///
/// ```text
/// Pending ──spawn──▶ Running ──exit 0──▶ Completed
///    │                  │ └───exit≠0──▶ Failed
///    │                  └──cutoff──▶ TimedOut ──exit──▶ Completed | Failed
///    │                                   └──SIGKILL──▶ Killed
///    └──spawn error──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Not launched yet
    Pending,
    /// Process alive
    Running,
    /// Cutoff elapsed, graceful termination sent, process still alive
    TimedOut,
    /// Exited successfully or stopped cleanly by graceful termination
    Completed,
    /// Failed to spawn or exited with a failure status
    Failed,
    /// Force-terminated after ignoring graceful termination
    Killed,
}

impl PoolState {
    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PoolState::Completed | PoolState::Failed | PoolState::Killed
        )
    }

    /// Whether a process is (or may still be) alive in this state
    pub fn is_alive(&self) -> bool {
        matches!(self, PoolState::Running | PoolState::TimedOut)
    }

    /// Upper-case label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            PoolState::Pending => "PENDING",
            PoolState::Running => "RUNNING",
            PoolState::TimedOut => "TIMED_OUT",
            PoolState::Completed => "COMPLETED",
            PoolState::Failed => "FAILED",
            PoolState::Killed => "KILLED",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Termination signal sent to a pool's process group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolSignal {
    /// Graceful termination (SIGTERM)
    Terminate,
    /// Forced termination (SIGKILL)
    Kill,
}

impl fmt::Display for PoolSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSignal::Terminate => f.write_str("SIGTERM"),
            PoolSignal::Kill => f.write_str("SIGKILL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PoolState::Pending.is_terminal());
        assert!(!PoolState::Running.is_terminal());
        assert!(!PoolState::TimedOut.is_terminal());
        assert!(PoolState::Completed.is_terminal());
        assert!(PoolState::Failed.is_terminal());
        assert!(PoolState::Killed.is_terminal());
    }

    #[test]
    fn test_labels() {
        assert_eq!(PoolState::TimedOut.to_string(), "TIMED_OUT");
        assert_eq!(PoolSignal::Kill.to_string(), "SIGKILL");
        assert_eq!(
            serde_json::to_string(&PoolState::TimedOut).unwrap(),
            "\"timed_out\""
        );
    }
}
