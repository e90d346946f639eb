//! Collaborator traits: the GPU device and the pipeline command builder
//!
//! The orchestrator never talks to the driver or builds transcoder flags
//! itself. Implementations live in [`crate::telemetry::nvidia`] and
//! [`crate::pipeline`]; tests provide mocks.

use crate::error::BenchResult;
use crate::pipeline::{PipelineCommand, PipelineRequest};
use crate::telemetry::{DeviceMemory, DeviceMetrics};

// ============================================================================
// Device Trait
// ============================================================================

/// Synchronous query boundary to the GPU under test
///
/// Queries are read-only; only [`GpuDevice::reset`] mutates device state and
/// it is called exclusively by cleanup.
pub trait GpuDevice: Send + Sync {
    /// Human readable device identifier (e.g. "nvidia-smi:0")
    fn name(&self) -> &str;

    /// Current memory totals, used by the admission check
    fn query_memory(&self) -> BenchResult<DeviceMemory>;

    /// One telemetry reading
    fn query_metrics(&self) -> BenchResult<DeviceMetrics>;

    /// Best-effort device state reset
    fn reset(&self) -> BenchResult<()>;
}

// ============================================================================
// Command Builder Trait
// ============================================================================

/// Produces the process to execute for one pool
///
/// The returned command is opaque to the orchestrator: it is spawned as-is,
/// its output captured to the pool log and its exit status observed.
pub trait CommandBuilder: Send + Sync {
    /// Builder identifier, for logs
    fn name(&self) -> &str;

    /// Build the pipeline command for a job
    fn build(&self, request: &PipelineRequest) -> BenchResult<PipelineCommand>;
}
