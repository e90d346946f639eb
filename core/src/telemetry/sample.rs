//! Telemetry value types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Device memory totals in MB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemory {
    /// Total device memory
    pub total_mb: u64,
    /// Memory in use
    pub used_mb: u64,
    /// Memory free
    pub free_mb: u64,
}

/// One successful device reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetrics {
    /// GPU utilization, percent
    pub gpu_util_percent: f64,
    /// Memory in use, MB
    pub mem_used_mb: u64,
    /// Total memory, MB
    pub mem_total_mb: u64,
    /// Temperature, °C
    pub temp_c: f64,
    /// Power draw, W; `None` when the board does not report it
    pub power_w: Option<f64>,
    /// Active encoder sessions; `None` when not reported
    pub encoder_sessions: Option<u32>,
}

impl DeviceMetrics {
    /// Memory in use as a percentage of total
    pub fn memory_percent(&self) -> f64 {
        if self.mem_total_mb == 0 {
            return 0.0;
        }
        self.mem_used_mb as f64 / self.mem_total_mb as f64 * 100.0
    }
}

/// One telemetry tick
///
/// `metrics` is `None` when the device query failed; the tick is kept so the
/// series shows the gap instead of silently skipping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Wall-clock time of the tick
    pub timestamp: DateTime<Local>,
    /// Reading, or `None` for a gap
    pub metrics: Option<DeviceMetrics>,
}

impl TelemetrySample {
    /// A successful reading taken now
    pub fn reading(metrics: DeviceMetrics) -> Self {
        Self {
            timestamp: Local::now(),
            metrics: Some(metrics),
        }
    }

    /// A gap marker taken now
    pub fn gap() -> Self {
        Self {
            timestamp: Local::now(),
            metrics: None,
        }
    }

    /// Whether this tick is a gap
    pub fn is_gap(&self) -> bool {
        self.metrics.is_none()
    }
}
