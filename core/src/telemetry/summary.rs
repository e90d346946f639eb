//! Running aggregates over the telemetry series

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

/// Utilization above which a sample counts as "busy"
pub const HIGH_UTILIZATION_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Default)]
struct Series {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Series {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Incremental accumulator fed by the sampler
#[derive(Debug, Clone, Default)]
pub struct TelemetryAccumulator {
    samples: usize,
    gaps: usize,
    busy: usize,
    util: Series,
    mem_percent: Series,
    mem_used_mb: u64,
    temp: Series,
    power: Series,
    encoder_sessions: Option<u32>,
}

impl TelemetryAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample in
    pub fn record(&mut self, sample: &TelemetrySample) {
        self.samples += 1;

        let Some(m) = &sample.metrics else {
            self.gaps += 1;
            return;
        };

        self.util.push(m.gpu_util_percent);
        if m.gpu_util_percent > HIGH_UTILIZATION_PERCENT {
            self.busy += 1;
        }
        self.mem_percent.push(m.memory_percent());
        self.mem_used_mb = self.mem_used_mb.max(m.mem_used_mb);
        self.temp.push(m.temp_c);
        if let Some(power) = m.power_w {
            self.power.push(power);
        }
        if let Some(sessions) = m.encoder_sessions {
            self.encoder_sessions = Some(self.encoder_sessions.unwrap_or(0).max(sessions));
        }
    }

    /// Snapshot of the aggregates
    pub fn summary(&self) -> TelemetrySummary {
        let readings = self.samples - self.gaps;
        TelemetrySummary {
            samples: self.samples,
            gaps: self.gaps,
            avg_gpu_util_percent: self.util.avg(),
            min_gpu_util_percent: self.util.min,
            max_gpu_util_percent: self.util.max,
            high_util_fraction: if readings == 0 {
                0.0
            } else {
                self.busy as f64 / readings as f64
            },
            avg_mem_percent: self.mem_percent.avg(),
            max_mem_percent: self.mem_percent.max,
            max_mem_used_mb: self.mem_used_mb,
            avg_temp_c: self.temp.avg(),
            max_temp_c: self.temp.max,
            avg_power_w: (self.power.count > 0).then(|| self.power.avg()),
            max_power_w: (self.power.count > 0).then_some(self.power.max),
            max_encoder_sessions: self.encoder_sessions,
        }
    }
}

/// Aggregated telemetry for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Ticks taken, gaps included
    pub samples: usize,
    /// Ticks whose query failed
    pub gaps: usize,
    /// Mean GPU utilization
    pub avg_gpu_util_percent: f64,
    /// Lowest GPU utilization
    pub min_gpu_util_percent: f64,
    /// Highest GPU utilization
    pub max_gpu_util_percent: f64,
    /// Share of readings above 50 % utilization
    pub high_util_fraction: f64,
    /// Mean memory use, percent
    pub avg_mem_percent: f64,
    /// Peak memory use, percent
    pub max_mem_percent: f64,
    /// Peak memory use, MB
    pub max_mem_used_mb: u64,
    /// Mean temperature
    pub avg_temp_c: f64,
    /// Peak temperature
    pub max_temp_c: f64,
    /// Mean power draw, when reported
    pub avg_power_w: Option<f64>,
    /// Peak power draw, when reported
    pub max_power_w: Option<f64>,
    /// Peak concurrent encoder sessions, when reported
    pub max_encoder_sessions: Option<u32>,
}

impl TelemetrySummary {
    /// Whether at least one real reading exists
    pub fn has_readings(&self) -> bool {
        self.samples > self.gaps
    }
}
