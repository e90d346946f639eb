//! Overall performance grade
//!
//! A 0-100 score from four banded components, mapped to a letter grade.
//! The verdict ([`Classification`](super::Classification)) is independent of
//! it; the grade only summarises how comfortably the device carried the load.
//!
//! | Component            | Points | Bands                                  |
//! |----------------------|--------|----------------------------------------|
//! | GPU utilization avg  | 25     | ≥80: 25, ≥60: 20, ≥40: 15, ≥20: 10     |
//! | Mean pool success    | 35     | ≥95: 35, ≥90: 30, ≥80: 25, ≥70: 20     |
//! | Concurrent streams   | 25     | ≥100: 25, ≥75: 20, ≥50: 15, ≥25: 10    |
//! | Peak temperature     | 15     | ≤75: 15, ≤80: 12, ≤85: 8               |
//!
//! Utilization and temperature only count when telemetry has real readings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySummary;

use super::outputs::TestResult;

const UTILIZATION_POINTS: u32 = 25;
const SUCCESS_POINTS: u32 = 35;
const STREAMS_POINTS: u32 = 25;
const THERMAL_POINTS: u32 = 15;

/// Letter grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// ≥ 90 %
    #[serde(rename = "A+")]
    APlus,
    /// ≥ 80 %
    A,
    /// ≥ 70 %
    #[serde(rename = "B+")]
    BPlus,
    /// ≥ 60 %
    B,
    /// ≥ 50 %
    C,
    /// below 50 %
    D,
}

impl Grade {
    /// Grade for a score percentage
    pub fn from_percent(percent: f64) -> Self {
        match percent {
            p if p >= 90.0 => Grade::APlus,
            p if p >= 80.0 => Grade::A,
            p if p >= 70.0 => Grade::BPlus,
            p if p >= 60.0 => Grade::B,
            p if p >= 50.0 => Grade::C,
            _ => Grade::D,
        }
    }

    /// Letter form (`A+`, `B`, ...)
    pub fn letter(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    /// Short verbal rating
    pub fn description(&self) -> &'static str {
        match self {
            Grade::APlus => "Excellent",
            Grade::A => "Very Good",
            Grade::BPlus => "Good",
            Grade::B => "Fair",
            Grade::C => "Needs Improvement",
            Grade::D => "Poor",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.letter(), self.description())
    }
}

/// Score breakdown and resulting grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    /// Points earned
    pub score: u32,
    /// Points available given the data at hand
    pub max_score: u32,
    /// `score / max_score` as a percentage
    pub percent: f64,
    /// Letter grade
    pub grade: Grade,
    /// Concurrent streams the score was computed with
    pub concurrent_streams: u32,
}

/// Score a run from its output result and telemetry
///
/// Concurrent streams are the peak encoder session count when the device
/// reports it, otherwise the number of valid outputs.
pub fn performance_score(result: &TestResult, telemetry: &TelemetrySummary) -> PerformanceScore {
    let mut score = 0;
    let mut max_score = 0;

    if telemetry.has_readings() {
        score += utilization_points(telemetry.avg_gpu_util_percent);
        max_score += UTILIZATION_POINTS;
    }

    let mean_success = if result.pools.is_empty() {
        result.success_percent()
    } else {
        result.pools.iter().map(|p| p.success_rate() * 100.0).sum::<f64>() / result.pools.len() as f64
    };
    score += success_points(mean_success);
    max_score += SUCCESS_POINTS;

    let concurrent_streams = telemetry.max_encoder_sessions.unwrap_or(result.valid);
    score += streams_points(concurrent_streams);
    max_score += STREAMS_POINTS;

    if telemetry.has_readings() {
        score += thermal_points(telemetry.max_temp_c);
        max_score += THERMAL_POINTS;
    }

    let percent = f64::from(score) / f64::from(max_score) * 100.0;
    PerformanceScore {
        score,
        max_score,
        percent,
        grade: Grade::from_percent(percent),
        concurrent_streams,
    }
}

fn utilization_points(avg_percent: f64) -> u32 {
    match avg_percent {
        u if u >= 80.0 => 25,
        u if u >= 60.0 => 20,
        u if u >= 40.0 => 15,
        u if u >= 20.0 => 10,
        _ => 0,
    }
}

fn success_points(percent: f64) -> u32 {
    match percent {
        s if s >= 95.0 => 35,
        s if s >= 90.0 => 30,
        s if s >= 80.0 => 25,
        s if s >= 70.0 => 20,
        _ => 0,
    }
}

fn streams_points(streams: u32) -> u32 {
    match streams {
        100.. => 25,
        75..=99 => 20,
        50..=74 => 15,
        25..=49 => 10,
        _ => 0,
    }
}

fn thermal_points(max_temp_c: f64) -> u32 {
    match max_temp_c {
        t if t <= 75.0 => 15,
        t if t <= 80.0 => 12,
        t if t <= 85.0 => 8,
        _ => 0,
    }
}
