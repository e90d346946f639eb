//! Output artifact scan and PASS/MARGINAL/FAIL classification

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::partition::{PoolId, StreamJob};

/// File extension of HLS media segments
pub const SEGMENT_EXTENSION: &str = "ts";

/// Success rate at or above which a run passes
pub const PASS_THRESHOLD: f64 = 0.95;

/// Success rate at or above which a run is marginal
pub const MARGINAL_THRESHOLD: f64 = 0.85;

/// Run verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// ≥ 95 % of the expected outputs are valid
    Pass,
    /// 85–95 % valid
    Marginal,
    /// < 85 % valid
    Fail,
}

impl Classification {
    /// Classify a success rate in `[0, 1]`
    pub fn from_rate(rate: f64) -> Self {
        if rate >= PASS_THRESHOLD {
            Classification::Pass
        } else if rate >= MARGINAL_THRESHOLD {
            Classification::Marginal
        } else {
            Classification::Fail
        }
    }

    /// Whether the verdict counts as success
    pub fn is_success(&self) -> bool {
        *self == Classification::Pass
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Pass => f.write_str("PASS"),
            Classification::Marginal => f.write_str("MARGINAL"),
            Classification::Fail => f.write_str("FAIL"),
        }
    }
}

/// Output statistics of one pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOutputStats {
    /// Pool identity
    pub pool: PoolId,
    /// Streams assigned to the pool
    pub expected: u32,
    /// Streams with a non-empty manifest
    pub successful: u32,
    /// Streams without one
    pub failed: u32,
    /// Bytes written under the successful stream directories
    pub output_bytes: u64,
    /// `.ts` segments under the successful stream directories
    #[serde(default)]
    pub segments: u64,
}

impl PoolOutputStats {
    /// Success rate of this pool alone
    pub fn success_rate(&self) -> f64 {
        if self.expected == 0 {
            0.0
        } else {
            f64::from(self.successful) / f64::from(self.expected)
        }
    }

    /// Mean segments per valid playlist, 0 without playlists
    pub fn avg_segments_per_playlist(&self) -> f64 {
        avg_segments(self.segments, self.successful)
    }
}

fn avg_segments(segments: u64, playlists: u32) -> f64 {
    if playlists == 0 {
        0.0
    } else {
        segments as f64 / f64::from(playlists)
    }
}

/// Final run result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Outputs expected across both pools
    pub expected: u32,
    /// Outputs found valid
    pub valid: u32,
    /// `valid / expected`, 0 when nothing was expected
    pub success_rate: f64,
    /// Verdict
    pub classification: Classification,
    /// Aggregate output size
    pub output_bytes: u64,
    /// Aggregate segment count; each valid output contributes one playlist
    #[serde(default)]
    pub segments: u64,
    /// Per-pool breakdown
    pub pools: Vec<PoolOutputStats>,
}

impl TestResult {
    /// Result from bare counts
    ///
    /// `expected == 0` is always a `Fail`: there is nothing to pass with.
    pub fn from_counts(expected: u32, valid: u32) -> Self {
        let valid = valid.min(expected);
        let success_rate = if expected == 0 {
            0.0
        } else {
            f64::from(valid) / f64::from(expected)
        };
        let classification = if expected == 0 {
            Classification::Fail
        } else {
            Classification::from_rate(success_rate)
        };

        Self {
            expected,
            valid,
            success_rate,
            classification,
            output_bytes: 0,
            segments: 0,
            pools: Vec::new(),
        }
    }

    /// Result from per-pool statistics
    pub fn from_pools(pools: Vec<PoolOutputStats>) -> Self {
        let expected = pools.iter().map(|p| p.expected).sum();
        let valid = pools.iter().map(|p| p.successful).sum();
        let mut result = Self::from_counts(expected, valid);
        result.output_bytes = pools.iter().map(|p| p.output_bytes).sum();
        result.segments = pools.iter().map(|p| p.segments).sum();
        result.pools = pools;
        result
    }

    /// Success rate as a percentage
    pub fn success_percent(&self) -> f64 {
        self.success_rate * 100.0
    }

    /// Aggregate output size in MiB
    pub fn output_mib(&self) -> f64 {
        self.output_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Mean segments per valid playlist across both pools
    pub fn avg_segments_per_playlist(&self) -> f64 {
        avg_segments(self.segments, self.valid)
    }
}

/// Scans the output tree for valid stream manifests
#[derive(Debug, Clone)]
pub struct ResultAnalyzer {
    manifest_name: String,
}

impl ResultAnalyzer {
    /// Analyzer looking for `manifest_name` in each stream directory
    pub fn new(manifest_name: impl Into<String>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
        }
    }

    /// Scan both jobs' outputs
    pub fn analyze(&self, jobs: &[StreamJob]) -> TestResult {
        let pools = jobs.iter().map(|job| self.scan_pool(job)).collect();
        let result = TestResult::from_pools(pools);

        tracing::info!(
            expected = result.expected,
            valid = result.valid,
            success_percent = result.success_percent(),
            segments = result.segments,
            classification = %result.classification,
            "Output analysis complete"
        );
        result
    }

    /// Scan one pool's stream directories
    pub fn scan_pool(&self, job: &StreamJob) -> PoolOutputStats {
        let mut successful = 0;
        let mut usage = DirUsage::default();

        for index in job.range.iter() {
            let manifest = job.manifest_path(index, &self.manifest_name);
            if is_valid_manifest(&manifest) {
                successful += 1;
                usage.add(&job.stream_dir(index));
            } else {
                tracing::debug!(pool = %job.pool, stream = index, "Missing or empty manifest");
            }
        }

        let expected = job.expected_outputs();
        PoolOutputStats {
            pool: job.pool,
            expected,
            successful,
            failed: expected - successful,
            output_bytes: usage.bytes,
            segments: usage.segments,
        }
    }
}

fn is_valid_manifest(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// File bytes and HLS segments found below a directory
#[derive(Debug, Default)]
struct DirUsage {
    bytes: u64,
    segments: u64,
}

impl DirUsage {
    /// Walk `dir` recursively; unreadable entries count as zero
    fn add(&mut self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => self.add(&entry.path()),
                Ok(ft) if ft.is_file() => {
                    self.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                    if entry.path().extension().is_some_and(|ext| ext == SEGMENT_EXTENSION) {
                        self.segments += 1;
                    }
                }
                _ => {}
            }
        }
    }
}
