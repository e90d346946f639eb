//! nvenc-capacity-core: orchestration engine for dual-NVENC capacity tests
//!
//! This crate runs a fixed number of concurrent live-encode streams split
//! across the GPU's two hardware encoders and decides whether the device
//! sustained them, including:
//!
//! - Memory budgeting and the pre-flight admission check
//! - Partitioning streams into two encoder pools
//! - Pool process supervision with graceful-then-forced termination
//! - Periodic device telemetry into a CSV series
//! - Output and log analysis with a PASS/MARGINAL/FAIL verdict
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod partition;
pub mod pipeline;
pub mod pool;
pub mod resources;
pub mod telemetry;
pub mod traits;

pub use analyzer::{
    Classification, Grade, LogSummary, PerformanceScore, PoolOutputStats, ResultAnalyzer, TestResult,
};
pub use config::{ConfigError, EncodeProfile, PathsConfig, StreamCount, StreamPreset, TestConfig, TimingConfig};
pub use error::*;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunReport};
pub use partition::{partition, InputPattern, PoolId, StreamJob, StreamRange};
pub use pipeline::{ExternalScriptBuilder, PipelineCommand, PipelineRequest};
pub use pool::{EncoderPool, PoolOutcome, PoolSignal, PoolState};
pub use resources::{check_admission, AdmissionReport, ResourceBudget};
pub use telemetry::{NvidiaSmi, TelemetrySample, TelemetrySummary};
pub use traits::*;
