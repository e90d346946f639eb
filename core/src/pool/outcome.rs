//! Final record of one pool

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::partition::{PoolId, StreamRange};
use crate::pool::{PoolSignal, PoolState};

/// What happened to a pool, captured once it is terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOutcome {
    /// Pool identity
    pub pool: PoolId,
    /// Streams assigned to the pool
    pub range: StreamRange,
    /// Final state
    pub state: PoolState,
    /// OS process id, when spawned
    pub pid: Option<u32>,
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,
    /// Signal that ended the process, when killed by one
    pub exit_signal: Option<i32>,
    /// Whether the test-duration cutoff was hit
    pub timed_out: bool,
    /// Termination signals sent, in order
    pub signals_sent: Vec<PoolSignal>,
    /// Seconds between spawn and exit
    pub runtime_secs: Option<f64>,
    /// Error description for failed pools
    pub error: Option<String>,
    /// Process log of the pool
    pub log_path: PathBuf,
}

impl PoolOutcome {
    /// Whether the pool ended cleanly
    pub fn succeeded(&self) -> bool {
        self.state == PoolState::Completed
    }
}
