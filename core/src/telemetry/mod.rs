//! Device telemetry: value types, the `nvidia-smi` device, the CSV writer,
//! the periodic sampler and its summary

pub mod nvidia;
mod sample;
mod sampler;
mod summary;
mod writer;

pub use nvidia::NvidiaSmi;
pub use sample::{DeviceMemory, DeviceMetrics, TelemetrySample};
pub use sampler::{SamplerHandle, TelemetrySampler};
pub use summary::{TelemetryAccumulator, TelemetrySummary, HIGH_UTILIZATION_PERCENT};
pub use writer::{TelemetryCsvWriter, GAP_MARKER, TELEMETRY_HEADER};
