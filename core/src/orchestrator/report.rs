//! Run report returned by the orchestrator

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::analyzer::{performance_score, Classification, LogSummary, PerformanceScore, TestResult};
use crate::config::TestConfig;
use crate::pool::PoolOutcome;
use crate::resources::AdmissionReport;
use crate::telemetry::TelemetrySummary;

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started (before pre-flight)
    pub started_at: DateTime<Local>,
    /// When analysis finished
    pub finished_at: DateTime<Local>,
    /// Effective configuration
    pub config: TestConfig,
    /// Device identifier
    pub device: String,
    /// Admission check result; `None` when the check was disabled
    pub admission: Option<AdmissionReport>,
    /// Seconds on the test clock (from both pools running to both terminal)
    pub test_elapsed_secs: f64,
    /// Whether the run was cut short by an operator interrupt
    pub interrupted: bool,
    /// Per-pool process outcomes
    pub pools: Vec<PoolOutcome>,
    /// Telemetry aggregates
    pub telemetry: TelemetrySummary,
    /// Telemetry CSV path
    pub telemetry_csv: PathBuf,
    /// Output verdict
    pub result: TestResult,
    /// Per-pool process log analysis
    pub logs: Vec<LogSummary>,
}

impl RunReport {
    /// Whether the run counts as a success (PASS and not interrupted)
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.result.classification.is_success()
    }

    /// Verdict shorthand
    pub fn classification(&self) -> Classification {
        self.result.classification
    }

    /// Overall performance grade from the outputs and telemetry
    pub fn performance(&self) -> PerformanceScore {
        performance_score(&self.result, &self.telemetry)
    }
}
