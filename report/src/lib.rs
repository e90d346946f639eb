//! Report generation for capacity-test runs
//!
//! This crate turns a [`RunReport`](nvenc_capacity_core::RunReport) into the
//! run's on-disk reports:
//!
//! - `test_summary.txt`: human readable summary
//! - `analysis_report.json`: full machine readable analysis

#![warn(missing_docs)]
#![warn(clippy::all)]

mod json;
mod summary;

pub use json::JsonExporter;
pub use summary::{render_summary, write_summary};

/// Report writing errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Filesystem error
    #[error("failed to write report {path}: {source}")]
    Io {
        /// Report path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type ReportResult<T> = std::result::Result<T, ReportError>;

pub(crate) fn create_file(path: &std::path::Path) -> ReportResult<std::fs::File> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::File::create(path).map_err(io_err)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::PathBuf;

    use chrono::Local;
    use nvenc_capacity_core::analyzer::{LogSummary, PoolOutputStats, SpeedStats};
    use nvenc_capacity_core::{
        AdmissionReport, PoolId, PoolOutcome, PoolSignal, PoolState, RunReport, StreamRange,
        TelemetrySummary, TestConfig, TestResult,
    };

    pub fn run_report(valid_second_pool: u32) -> RunReport {
        let pools = vec![
            PoolOutputStats {
                pool: PoolId::Nvenc1,
                expected: 50,
                successful: 50,
                failed: 0,
                output_bytes: 300 * 1024 * 1024,
                segments: 750,
            },
            PoolOutputStats {
                pool: PoolId::Nvenc2,
                expected: 50,
                successful: valid_second_pool,
                failed: 50 - valid_second_pool,
                output_bytes: 200 * 1024 * 1024,
                segments: u64::from(valid_second_pool) * 15,
            },
        ];

        RunReport {
            started_at: Local::now(),
            finished_at: Local::now(),
            config: TestConfig::default(),
            device: "nvidia-smi:0".to_string(),
            admission: Some(AdmissionReport {
                total_streams: 100,
                required_mb: 17_512,
                free_mb: 23_000,
                total_mb: 24_564,
                headroom_mb: 4_464,
            }),
            test_elapsed_secs: 61.2,
            interrupted: false,
            pools: vec![
                PoolOutcome {
                    pool: PoolId::Nvenc1,
                    range: StreamRange { start: 1, end: 50 },
                    state: PoolState::Completed,
                    pid: Some(4242),
                    exit_code: Some(0),
                    exit_signal: None,
                    timed_out: false,
                    signals_sent: vec![],
                    runtime_secs: Some(60.4),
                    error: None,
                    log_path: PathBuf::from("logs/nvenc1_process.log"),
                },
                PoolOutcome {
                    pool: PoolId::Nvenc2,
                    range: StreamRange { start: 51, end: 100 },
                    state: PoolState::Killed,
                    pid: Some(4250),
                    exit_code: None,
                    exit_signal: Some(9),
                    timed_out: true,
                    signals_sent: vec![PoolSignal::Terminate, PoolSignal::Kill],
                    runtime_secs: Some(71.2),
                    error: Some("pipeline for nvenc2 was force-killed".to_string()),
                    log_path: PathBuf::from("logs/nvenc2_process.log"),
                },
            ],
            telemetry: TelemetrySummary {
                samples: 62,
                gaps: 2,
                avg_gpu_util_percent: 71.5,
                min_gpu_util_percent: 3.0,
                max_gpu_util_percent: 98.0,
                high_util_fraction: 0.9,
                avg_mem_percent: 70.0,
                max_mem_percent: 74.2,
                max_mem_used_mb: 18_230,
                avg_temp_c: 63.0,
                max_temp_c: 71.0,
                avg_power_w: Some(210.0),
                max_power_w: Some(288.5),
                max_encoder_sessions: Some(100),
            },
            telemetry_csv: PathBuf::from("logs/gpu_monitoring.csv"),
            result: TestResult::from_pools(pools),
            logs: vec![LogSummary {
                pool: PoolId::Nvenc1,
                path: PathBuf::from("logs/nvenc1_process.log"),
                readable: true,
                size_bytes: 20_480,
                has_errors: false,
                warnings: 2,
                dropped_frames: 4,
                speed: Some(SpeedStats {
                    samples: 30,
                    avg: 1.01,
                    min: 0.97,
                    max: 1.04,
                }),
            }],
        }
    }
}
