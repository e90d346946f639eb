//! Error types for nvenc-capacity-core

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::partition::PoolId;

/// Core error type
///
/// Variants map onto the run's failure taxonomy. Pre-flight variants
/// ([`BenchError::is_preflight`]) abort the run before any pipeline process
/// is launched; the per-pool variants are recorded against one pool and never
/// cancel the other.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Aggregate memory requirement exceeds what the device can admit
    #[error(
        "insufficient device memory: {required_mb} MB required, {free_mb} MB free \
         ({safety_margin_mb} MB reserved as safety margin)"
    )]
    ResourceInsufficient {
        /// Aggregate requirement for the run
        required_mb: u64,
        /// Free memory reported by the device
        free_mb: u64,
        /// Memory held back from admission
        safety_margin_mb: u64,
    },

    /// Requested stream count cannot be split into two pools
    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    /// An expected input file does not exist
    #[error("missing input for stream {index}: {}", .path.display())]
    MissingInput {
        /// Stream index the input belongs to
        index: u32,
        /// Resolved input path
        path: PathBuf,
    },

    /// The pipeline process for a pool could not be spawned
    #[error("failed to launch pipeline for {pool}: {source}")]
    PipelineLaunchFailed {
        /// Pool that failed to launch
        pool: PoolId,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The pipeline process exited with a failure status
    #[error("pipeline for {pool} exited with {}", describe_code(.code))]
    PipelineExitedNonZero {
        /// Pool whose process failed
        pool: PoolId,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// The pool outlived the test-duration cutoff
    #[error("pipeline for {pool} still running after {after:?} cutoff")]
    TimedOut {
        /// Pool that timed out
        pool: PoolId,
        /// Cutoff that elapsed
        after: Duration,
    },

    /// The pool had to be force-terminated
    #[error("pipeline for {pool} was force-killed after ignoring graceful termination")]
    Killed {
        /// Pool that was killed
        pool: PoolId,
    },

    /// A device telemetry query failed
    #[error("device query failed: {0}")]
    TelemetryQueryFailed(String),

    /// A teardown step failed (always swallowed by cleanup)
    #[error("cleanup step '{step}' failed: {message}")]
    CleanupStepFailed {
        /// Name of the cleanup step
        step: &'static str,
        /// Failure description
        message: String,
    },

    /// The command builder rejected a job
    #[error("command builder error: {0}")]
    CommandBuild(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing builder component
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BenchError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing-configuration error
    pub fn missing_config(what: &'static str) -> Self {
        Self::MissingConfig(what)
    }

    /// Create an invalid-partition error
    pub fn partition(msg: impl Into<String>) -> Self {
        Self::InvalidPartition(msg.into())
    }

    /// Create a telemetry query error
    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::TelemetryQueryFailed(msg.into())
    }

    /// Create a command builder error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::CommandBuild(msg.into())
    }

    /// Create a cleanup step error
    pub fn cleanup(step: &'static str, msg: impl Into<String>) -> Self {
        Self::CleanupStepFailed {
            step,
            message: msg.into(),
        }
    }

    /// Whether this error aborts the whole run before any process launches
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            BenchError::ResourceInsufficient { .. }
                | BenchError::InvalidPartition(_)
                | BenchError::MissingInput { .. }
                | BenchError::CommandBuild(_)
                | BenchError::Config(_)
                | BenchError::MissingConfig(_)
        )
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
