//! Test configuration types
//!
//! Configuration is layered: [`TestConfig::default`] → optional JSON file →
//! environment ([`TestConfig::apply_env`]) → explicit CLI values. The result
//! is checked once by [`TestConfig::validate`] before anything touches the
//! device or the filesystem.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::partition::{InputPattern, MAX_STREAMS_PER_POOL, POOL_COUNT};
use crate::resources::ResourceBudget;

/// Environment variable overriding streams per pool
pub const ENV_STREAMS_PER_NVENC: &str = "STREAMS_PER_NVENC";
/// Environment variable overriding the test duration in seconds
pub const ENV_TEST_DURATION: &str = "TEST_DURATION";
/// Environment variable overriding the output root
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
/// Environment variable overriding the input directory
pub const ENV_INPUT_DIR: &str = "INPUT_DIR";
/// Environment variable overriding the log directory
pub const ENV_LOG_DIR: &str = "LOG_DIR";

/// Manifest file name every stream directory must contain
pub const MANIFEST_NAME: &str = "playlist.m3u8";

/// Named stream-count presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPreset {
    /// 25 streams per pool
    Conservative,
    /// 50 streams per pool
    Standard,
    /// 75 streams per pool
    Aggressive,
    /// 100 streams per pool
    Maximum,
}

impl StreamPreset {
    /// Streams per pool for the preset
    pub fn streams_per_pool(&self) -> u32 {
        match self {
            StreamPreset::Conservative => 25,
            StreamPreset::Standard => 50,
            StreamPreset::Aggressive => 75,
            StreamPreset::Maximum => 100,
        }
    }
}

/// A stream-count argument: either a preset name or an explicit number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCount {
    /// Named preset
    Preset(StreamPreset),
    /// Explicit streams per pool
    Explicit(u32),
}

impl StreamCount {
    /// Resolved streams per pool
    pub fn streams_per_pool(&self) -> u32 {
        match self {
            StreamCount::Preset(preset) => preset.streams_per_pool(),
            StreamCount::Explicit(n) => *n,
        }
    }
}

impl FromStr for StreamCount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "conservative" => return Ok(StreamCount::Preset(StreamPreset::Conservative)),
            "standard" => return Ok(StreamCount::Preset(StreamPreset::Standard)),
            "aggressive" => return Ok(StreamCount::Preset(StreamPreset::Aggressive)),
            "maximum" => return Ok(StreamCount::Preset(StreamPreset::Maximum)),
            _ => {}
        }

        let n: u32 = s.parse().map_err(|_| {
            ConfigError::InvalidStreamCount(format!(
                "'{s}' is neither a number nor one of conservative, standard, aggressive, maximum"
            ))
        })?;
        if n < 1 || n > MAX_STREAMS_PER_POOL {
            return Err(ConfigError::InvalidStreamCount(format!(
                "{n} is outside 1-{MAX_STREAMS_PER_POOL}"
            )));
        }
        Ok(StreamCount::Explicit(n))
    }
}

impl fmt::Display for StreamCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamCount::Preset(preset) => {
                write!(f, "{:?} ({})", preset, preset.streams_per_pool())
            }
            StreamCount::Explicit(n) => write!(f, "{n}"),
        }
    }
}

/// Encode parameters handed to the command builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeProfile {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Target bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Output frame rate
    pub framerate: u32,
    /// HLS segment length in seconds
    pub segment_duration_secs: u32,
    /// Encoder preset identifier (e.g. NVENC "p1")
    pub preset: String,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            bitrate_kbps: 2500,
            framerate: 30,
            segment_duration_secs: 4,
            preset: "p1".to_string(),
        }
    }
}

impl EncodeProfile {
    /// `WIDTHxHEIGHT`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Filesystem locations of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Output root; each pool writes to `<output_dir>/<pool>`
    pub output_dir: PathBuf,
    /// Directory holding the input streams
    pub input_dir: PathBuf,
    /// Directory for process logs, telemetry and the summary
    pub log_dir: PathBuf,
    /// Input file pattern inside `input_dir`
    pub input_pattern: InputPattern,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            input_dir: PathBuf::from("input"),
            log_dir: PathBuf::from("logs"),
            input_pattern: InputPattern::default(),
        }
    }
}

impl PathsConfig {
    /// `logs/<pool>_process.log`
    pub fn process_log(&self, pool_name: &str) -> PathBuf {
        self.log_dir.join(format!("{pool_name}_process.log"))
    }

    /// `logs/gpu_monitoring.csv`
    pub fn telemetry_csv(&self) -> PathBuf {
        self.log_dir.join("gpu_monitoring.csv")
    }

    /// `logs/test_summary.txt`
    pub fn summary_txt(&self) -> PathBuf {
        self.log_dir.join("test_summary.txt")
    }

    /// `logs/analysis_report.json`
    pub fn analysis_json(&self) -> PathBuf {
        self.log_dir.join("analysis_report.json")
    }
}

/// Supervision intervals, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between launching pool 1 and pool 2
    pub launch_stagger_ms: u64,
    /// Pool status polling interval
    pub poll_interval_ms: u64,
    /// Interval between elapsed/remaining progress reports
    pub progress_interval_ms: u64,
    /// Wait between graceful and forced termination
    pub termination_grace_ms: u64,
    /// Telemetry sampling interval
    pub telemetry_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            launch_stagger_ms: 2_000,
            poll_interval_ms: 500,
            progress_interval_ms: 10_000,
            termination_grace_ms: 10_000,
            telemetry_interval_ms: 1_000,
        }
    }
}

impl TimingConfig {
    /// Upper bound on the launch stagger
    pub const MAX_STAGGER_MS: u64 = 10_000;

    /// Launch stagger
    pub fn launch_stagger(&self) -> Duration {
        Duration::from_millis(self.launch_stagger_ms)
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Progress report interval
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Termination grace window
    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    /// Telemetry interval
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    /// Millisecond-scale timings for tests and dry runs
    pub fn fast() -> Self {
        Self {
            launch_stagger_ms: 10,
            poll_interval_ms: 10,
            progress_interval_ms: 50,
            termination_grace_ms: 200,
            telemetry_interval_ms: 20,
        }
    }
}

/// Test configuration
///
/// Defines one capacity run: how many streams each pool encodes, for how
/// long, with which encode profile, and under which memory budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Streams encoded by each of the two pools
    pub streams_per_pool: u32,

    /// Test duration cutoff in seconds
    pub duration_secs: u64,

    /// Filesystem layout
    pub paths: PathsConfig,

    /// Encode profile
    pub encode: EncodeProfile,

    /// Memory budget for the admission check
    pub budget: ResourceBudget,

    /// Supervision timings
    pub timing: TimingConfig,

    /// Refuse to launch when an input file is missing
    pub require_inputs: bool,

    /// Run the memory admission check before launch
    pub admission_check: bool,

    /// Attempt a device reset during cleanup
    pub reset_device_on_cleanup: bool,

    /// Draw a terminal progress bar while pools run
    pub show_progress: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            streams_per_pool: StreamPreset::Standard.streams_per_pool(),
            duration_secs: 60,
            paths: PathsConfig::default(),
            encode: EncodeProfile::default(),
            budget: ResourceBudget::default(),
            timing: TimingConfig::default(),
            require_inputs: true,
            admission_check: true,
            reset_device_on_cleanup: false,
            show_progress: false,
        }
    }
}

impl TestConfig {
    /// Create a config with the given streams per pool
    pub fn new(streams_per_pool: u32) -> Self {
        Self {
            streams_per_pool,
            ..Default::default()
        }
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))
    }

    /// Set the test duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = duration.as_secs();
        self
    }

    /// Set the filesystem layout
    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    /// Set the memory budget
    pub fn with_budget(mut self, budget: ResourceBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the supervision timings
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Total streams across both pools
    pub fn total_streams(&self) -> u32 {
        self.streams_per_pool.saturating_mul(POOL_COUNT as u32)
    }

    /// Test duration cutoff
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Apply `STREAMS_PER_NVENC`, `TEST_DURATION`, `OUTPUT_DIR`, `INPUT_DIR`
    /// and `LOG_DIR` from `lookup`
    ///
    /// Pass `|k| std::env::var(k).ok()` for the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_STREAMS_PER_NVENC) {
            self.streams_per_pool = raw.parse::<StreamCount>()?.streams_per_pool();
        }
        if let Some(raw) = lookup(ENV_TEST_DURATION) {
            self.duration_secs = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidDuration(format!("{ENV_TEST_DURATION}='{raw}' is not a number"))
            })?;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_INPUT_DIR) {
            self.paths.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.paths.log_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streams_per_pool < 1 || self.streams_per_pool > MAX_STREAMS_PER_POOL {
            return Err(ConfigError::InvalidStreamCount(format!(
                "streams per pool must be 1-{MAX_STREAMS_PER_POOL}, got {}",
                self.streams_per_pool
            )));
        }

        if self.duration_secs == 0 {
            return Err(ConfigError::InvalidDuration(
                "test duration must be at least 1 second".into(),
            ));
        }

        if self.timing.poll_interval_ms == 0 || self.timing.telemetry_interval_ms == 0 {
            return Err(ConfigError::InvalidTiming(
                "poll and telemetry intervals must be positive".into(),
            ));
        }

        if self.timing.launch_stagger_ms > TimingConfig::MAX_STAGGER_MS {
            return Err(ConfigError::InvalidTiming(format!(
                "launch stagger must not exceed {} ms",
                TimingConfig::MAX_STAGGER_MS
            )));
        }

        if self.encode.width == 0 || self.encode.height == 0 || self.encode.framerate == 0 {
            return Err(ConfigError::InvalidEncodeProfile(
                "resolution and framerate must be positive".into(),
            ));
        }

        if self.budget.per_stream_mb == 0 {
            return Err(ConfigError::InvalidBudget(
                "per-stream memory cost must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid streams-per-pool value
    #[error("Invalid stream count: {0}")]
    InvalidStreamCount(String),

    /// Invalid duration
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Invalid timing parameters
    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    /// Invalid encode profile
    #[error("Invalid encode profile: {0}")]
    InvalidEncodeProfile(String),

    /// Invalid memory budget
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    /// Config file could not be read or parsed
    #[error("Invalid config file: {0}")]
    File(String),
}
