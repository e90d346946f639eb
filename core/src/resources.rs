//! Resource estimation and the pre-flight admission check
//!
//! Memory use of an NVENC stream is close to constant for a fixed encode
//! profile, so the budget is linear in the stream count:
//!
//! ```text
//! estimate(n) = n × per_stream_mb
//! required(n) = estimate(n) + overhead_mb
//! admit iff required(n) ≤ free_mb − safety_margin_mb
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::telemetry::DeviceMemory;
use crate::traits::GpuDevice;

/// Empirical VRAM cost of one 720p NVENC stream, in MB
pub const DEFAULT_PER_STREAM_MB: u64 = 170;

/// Fixed per-run overhead (CUDA contexts of both processes), in MB
pub const DEFAULT_OVERHEAD_MB: u64 = 512;

/// Memory never handed to the admission check, in MB
pub const DEFAULT_SAFETY_MARGIN_MB: u64 = 1024;

/// Memory budget parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Memory cost of a single stream
    pub per_stream_mb: u64,
    /// Fixed overhead added once per run
    pub overhead_mb: u64,
    /// Free memory held back from admission
    pub safety_margin_mb: u64,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            per_stream_mb: DEFAULT_PER_STREAM_MB,
            overhead_mb: DEFAULT_OVERHEAD_MB,
            safety_margin_mb: DEFAULT_SAFETY_MARGIN_MB,
        }
    }
}

impl ResourceBudget {
    /// Create a budget with the given per-stream cost and no overhead or margin
    pub fn per_stream(per_stream_mb: u64) -> Self {
        Self {
            per_stream_mb,
            overhead_mb: 0,
            safety_margin_mb: 0,
        }
    }

    /// Set the fixed overhead
    pub fn with_overhead(mut self, overhead_mb: u64) -> Self {
        self.overhead_mb = overhead_mb;
        self
    }

    /// Set the safety margin
    pub fn with_safety_margin(mut self, safety_margin_mb: u64) -> Self {
        self.safety_margin_mb = safety_margin_mb;
        self
    }

    /// Stream-proportional part of the budget
    pub fn estimate(&self, total_streams: u32) -> u64 {
        u64::from(total_streams).saturating_mul(self.per_stream_mb)
    }

    /// Aggregate requirement including the fixed overhead
    pub fn required(&self, total_streams: u32) -> u64 {
        self.estimate(total_streams).saturating_add(self.overhead_mb)
    }

    /// Memory the admission check may hand out given `free_mb`
    pub fn admissible(&self, free_mb: u64) -> u64 {
        free_mb.saturating_sub(self.safety_margin_mb)
    }

    /// Largest stream count per pool that `free_mb` admits
    pub fn max_streams_per_pool(&self, free_mb: u64) -> u64 {
        if self.per_stream_mb == 0 {
            return u64::MAX;
        }
        let usable = self.admissible(free_mb).saturating_sub(self.overhead_mb);
        usable / self.per_stream_mb / 2
    }

    /// Pure admission decision against a known memory state
    pub fn admit(&self, total_streams: u32, memory: &DeviceMemory) -> BenchResult<AdmissionReport> {
        let required_mb = self.required(total_streams);
        let admissible_mb = self.admissible(memory.free_mb);

        if required_mb > admissible_mb {
            return Err(BenchError::ResourceInsufficient {
                required_mb,
                free_mb: memory.free_mb,
                safety_margin_mb: self.safety_margin_mb,
            });
        }

        Ok(AdmissionReport {
            total_streams,
            required_mb,
            free_mb: memory.free_mb,
            total_mb: memory.total_mb,
            headroom_mb: admissible_mb - required_mb,
        })
    }
}

/// Outcome of a successful admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionReport {
    /// Streams admitted across both pools
    pub total_streams: u32,
    /// Aggregate requirement
    pub required_mb: u64,
    /// Free memory at check time
    pub free_mb: u64,
    /// Total device memory
    pub total_mb: u64,
    /// Admissible memory left after the requirement
    pub headroom_mb: u64,
}

/// Pre-flight check: query the device and admit or refuse the run
///
/// Runs once, never retried. A query failure is surfaced as
/// `TelemetryQueryFailed` because admission cannot be decided without it.
pub fn check_admission(
    budget: &ResourceBudget,
    total_streams: u32,
    device: &dyn GpuDevice,
) -> BenchResult<AdmissionReport> {
    let memory = device.query_memory()?;

    tracing::info!(
        device = device.name(),
        total_streams,
        required_mb = budget.required(total_streams),
        free_mb = memory.free_mb,
        safety_margin_mb = budget.safety_margin_mb,
        "Running admission check"
    );

    match budget.admit(total_streams, &memory) {
        Ok(report) => {
            tracing::info!(headroom_mb = report.headroom_mb, "Admission check passed");
            Ok(report)
        }
        Err(e) => {
            tracing::warn!(
                max_streams_per_pool = budget.max_streams_per_pool(memory.free_mb),
                "Admission refused, at most max_streams_per_pool streams per pool fit"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(free_mb: u64) -> DeviceMemory {
        DeviceMemory {
            total_mb: 24_564,
            used_mb: 24_564 - free_mb,
            free_mb,
        }
    }

    #[test]
    fn test_estimate_is_linear() {
        let budget = ResourceBudget::per_stream(170);
        assert_eq!(budget.estimate(0), 0);
        assert_eq!(budget.estimate(1), 170);
        assert_eq!(budget.estimate(100), 17_000);
        for n in 0..200 {
            assert_eq!(budget.estimate(n + 1) - budget.estimate(n), 170);
            assert_eq!(budget.estimate(n), u64::from(n) * 170);
        }
    }

    #[test]
    fn test_required_adds_overhead_once() {
        let budget = ResourceBudget::per_stream(170).with_overhead(512);
        assert_eq!(budget.required(0), 512);
        assert_eq!(budget.required(10), 2_212);
    }

    #[test]
    fn test_admission_refuses_oversized_run() {
        let budget = ResourceBudget::per_stream(170);
        assert_eq!(budget.estimate(50), 8_500);

        match budget.admit(50, &memory(5_000)) {
            Err(BenchError::ResourceInsufficient {
                required_mb,
                free_mb,
                ..
            }) => {
                assert_eq!(required_mb, 8_500);
                assert_eq!(free_mb, 5_000);
            }
            other => panic!("expected ResourceInsufficient, got {other:?}"),
        }
    }

    #[test]
    fn test_admission_respects_safety_margin() {
        let budget = ResourceBudget::per_stream(100).with_safety_margin(1_000);

        let report = budget.admit(40, &memory(5_000)).unwrap();
        assert_eq!(report.required_mb, 4_000);
        assert_eq!(report.headroom_mb, 0);

        assert!(budget.admit(41, &memory(5_000)).is_err());
    }

    #[test]
    fn test_margin_larger_than_free_memory() {
        let budget = ResourceBudget::per_stream(1).with_safety_margin(10_000);
        assert!(budget.admit(1, &memory(5_000)).is_err());
        assert_eq!(budget.max_streams_per_pool(5_000), 0);
    }

    struct FixedMemory(u64);

    impl GpuDevice for FixedMemory {
        fn name(&self) -> &str {
            "fixed"
        }

        fn query_memory(&self) -> BenchResult<DeviceMemory> {
            Ok(memory(self.0))
        }

        fn query_metrics(&self) -> BenchResult<crate::telemetry::DeviceMetrics> {
            Err(BenchError::telemetry("not sampled"))
        }

        fn reset(&self) -> BenchResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_check_admission_queries_device() {
        let budget = ResourceBudget::default();
        let fit = budget.max_streams_per_pool(20_000) as u32;

        let report = check_admission(&budget, fit * 2, &FixedMemory(20_000)).unwrap();
        assert_eq!(report.total_streams, fit * 2);
        assert_eq!(report.free_mb, 20_000);

        let err = check_admission(&budget, (fit + 1) * 2, &FixedMemory(20_000)).unwrap_err();
        assert!(matches!(err, BenchError::ResourceInsufficient { free_mb: 20_000, .. }));
    }

    #[test]
    fn test_max_streams_per_pool() {
        let budget = ResourceBudget::default();
        // (20000 - 1024 - 512) / 170 / 2
        assert_eq!(budget.max_streams_per_pool(20_000), 54);
    }
}
