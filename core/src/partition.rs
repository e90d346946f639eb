//! Job partitioning across the two encoder pools
//!
//! A run of `2 × n` streams is split into two contiguous, inclusive ranges:
//! `nvenc1` takes `[1, n]` and `nvenc2` takes `[n + 1, 2n]`. Each range becomes
//! one [`StreamJob`], which is handed to exactly one pipeline process.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Number of encoder pools in a run
pub const POOL_COUNT: usize = 2;

/// Upper bound on streams per pool for a single run
pub const MAX_STREAMS_PER_POOL: u32 = 100;

/// Placeholder replaced by the zero-padded stream index in input patterns
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// Identity of one of the two encoder pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolId {
    /// First pool, encoder context 0
    Nvenc1,
    /// Second pool, encoder context 1
    Nvenc2,
}

impl PoolId {
    /// Both pools, in launch order
    pub const ALL: [PoolId; POOL_COUNT] = [PoolId::Nvenc1, PoolId::Nvenc2];

    /// Directory and log-file name of the pool
    pub fn name(&self) -> &'static str {
        match self {
            PoolId::Nvenc1 => "nvenc1",
            PoolId::Nvenc2 => "nvenc2",
        }
    }

    /// Hardware encoder index the pool is labelled with (0 or 1)
    pub fn encoder_index(&self) -> u8 {
        match self {
            PoolId::Nvenc1 => 0,
            PoolId::Nvenc2 => 1,
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive range of 1-based stream indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRange {
    /// First stream index
    pub start: u32,
    /// Last stream index (inclusive)
    pub end: u32,
}

impl StreamRange {
    /// Number of streams covered
    pub fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `index` falls inside the range
    pub fn contains(&self, index: u32) -> bool {
        index >= self.start && index <= self.end
    }

    /// Iterate over the stream indices
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for StreamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Format a stream index the way file and directory names use it (`007`)
pub fn stream_label(index: u32) -> String {
    format!("{index:03}")
}

/// Input locator: a path pattern containing `{index}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputPattern(String);

impl InputPattern {
    /// Create a pattern; it must contain the `{index}` placeholder
    pub fn new(pattern: impl Into<String>) -> BenchResult<Self> {
        let pattern = pattern.into();
        if !pattern.contains(INDEX_PLACEHOLDER) {
            return Err(BenchError::config(format!(
                "input pattern '{pattern}' has no {INDEX_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self(pattern))
    }

    /// The raw pattern string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the pattern for one stream, relative to `input_dir`
    pub fn resolve(&self, input_dir: &Path, index: u32) -> PathBuf {
        input_dir.join(self.0.replace(INDEX_PLACEHOLDER, &stream_label(index)))
    }
}

impl TryFrom<String> for InputPattern {
    type Error = BenchError;

    fn try_from(pattern: String) -> BenchResult<Self> {
        Self::new(pattern)
    }
}

impl From<InputPattern> for String {
    fn from(pattern: InputPattern) -> Self {
        pattern.0
    }
}

impl Default for InputPattern {
    fn default() -> Self {
        Self("test_stream_{index}.mp4".to_string())
    }
}

/// One pool's share of the workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamJob {
    /// Owning pool
    pub pool: PoolId,
    /// Streams this job encodes
    pub range: StreamRange,
    /// Directory holding the input files
    pub input_dir: PathBuf,
    /// Input file pattern
    pub input_pattern: InputPattern,
    /// Pool output root (`<output>/<pool>`)
    pub output_dir: PathBuf,
}

impl StreamJob {
    /// Input path of every stream in the job
    pub fn input_paths(&self) -> Vec<(u32, PathBuf)> {
        self.range
            .iter()
            .map(|index| (index, self.input_pattern.resolve(&self.input_dir, index)))
            .collect()
    }

    /// Output directory of one stream (`<output>/<pool>/stream<NNN>`)
    pub fn stream_dir(&self, index: u32) -> PathBuf {
        self.output_dir.join(format!("stream{}", stream_label(index)))
    }

    /// Expected manifest path of one stream
    pub fn manifest_path(&self, index: u32, manifest_name: &str) -> PathBuf {
        self.stream_dir(index).join(manifest_name)
    }

    /// Number of outputs this job is expected to produce
    pub fn expected_outputs(&self) -> u32 {
        self.range.len()
    }

    /// Fail with `MissingInput` on the first input that does not exist
    pub fn validate_inputs(&self) -> BenchResult<()> {
        for (index, path) in self.input_paths() {
            if !path.is_file() {
                return Err(BenchError::MissingInput { index, path });
            }
        }
        Ok(())
    }
}

/// Split `streams_per_pool × 2` streams into the two pool jobs
///
/// Deterministic and stateless. Fails with `InvalidPartition` when
/// `streams_per_pool` is outside `1..=MAX_STREAMS_PER_POOL`.
pub fn partition(
    streams_per_pool: u32,
    input_dir: &Path,
    input_pattern: &InputPattern,
    output_root: &Path,
) -> BenchResult<[StreamJob; POOL_COUNT]> {
    let ranges = partition_ranges(streams_per_pool)?;
    Ok(PoolId::ALL.map(|pool| StreamJob {
        pool,
        range: ranges[pool.encoder_index() as usize],
        input_dir: input_dir.to_path_buf(),
        input_pattern: input_pattern.clone(),
        output_dir: output_root.join(pool.name()),
    }))
}

/// The two ranges alone, without any path information
pub fn partition_ranges(streams_per_pool: u32) -> BenchResult<[StreamRange; POOL_COUNT]> {
    if streams_per_pool < 1 {
        return Err(BenchError::partition(
            "streams per pool must be at least 1",
        ));
    }
    if streams_per_pool > MAX_STREAMS_PER_POOL {
        return Err(BenchError::partition(format!(
            "streams per pool must be at most {MAX_STREAMS_PER_POOL}, got {streams_per_pool}"
        )));
    }

    Ok([
        StreamRange {
            start: 1,
            end: streams_per_pool,
        },
        StreamRange {
            start: streams_per_pool + 1,
            end: streams_per_pool * 2,
        },
    ])
}
