//! Result analysis: output manifests, process logs and the performance grade
//!
//! Runs only after both pools are terminal. The verdict comes from the
//! output tree alone; pool exit states, logs and the grade are reported
//! alongside it but never change the classification.

mod grade;
mod logs;
mod outputs;

pub use grade::{performance_score, Grade, PerformanceScore};
pub use logs::{analyze_log, LogSummary, SpeedStats};
pub use outputs::{
    Classification, PoolOutputStats, ResultAnalyzer, TestResult, MARGINAL_THRESHOLD,
    PASS_THRESHOLD, SEGMENT_EXTENSION,
};

#[cfg(test)]
mod tests;
