//! Pipeline process log scan

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::partition::PoolId;

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"speed=\s*([0-9]+(?:\.[0-9]+)?)x").expect("built-in speed regex must compile")
    })
}

fn drop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"drop=\s*([0-9]+)").expect("built-in drop regex must compile"))
}

/// Encoding speed relative to realtime, from `speed=N.NNx` progress lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedStats {
    /// Progress lines seen
    pub samples: usize,
    /// Mean speed
    pub avg: f64,
    /// Lowest speed
    pub min: f64,
    /// Highest speed
    pub max: f64,
}

/// What a pool's process log says about the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Pool the log belongs to
    pub pool: PoolId,
    /// Log path
    pub path: PathBuf,
    /// Whether the log could be read
    pub readable: bool,
    /// Log size in bytes
    pub size_bytes: u64,
    /// Log mentions "error" or "failed"
    pub has_errors: bool,
    /// Occurrences of "warning"
    pub warnings: usize,
    /// Highest `drop=` counter reported
    pub dropped_frames: u64,
    /// Speed statistics, when any progress line was seen
    pub speed: Option<SpeedStats>,
}

impl LogSummary {
    /// Summary of an unreadable or absent log
    fn unreadable(pool: PoolId, path: &Path) -> Self {
        Self {
            pool,
            path: path.to_path_buf(),
            readable: false,
            size_bytes: 0,
            has_errors: false,
            warnings: 0,
            dropped_frames: 0,
            speed: None,
        }
    }
}

/// Read and summarize one process log
pub fn analyze_log(pool: PoolId, path: &Path) -> LogSummary {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(pool = %pool, path = %path.display(), error = %e, "Process log not readable");
            return LogSummary::unreadable(pool, path);
        }
    };

    let mut summary = summarize(pool, path, &String::from_utf8_lossy(&bytes));
    summary.size_bytes = bytes.len() as u64;
    summary
}

fn summarize(pool: PoolId, path: &Path, content: &str) -> LogSummary {
    let lower = content.to_lowercase();

    let speeds: Vec<f64> = speed_re()
        .captures_iter(content)
        .filter_map(|cap| cap[1].parse().ok())
        .collect();

    let speed = if speeds.is_empty() {
        None
    } else {
        let min = speeds.iter().copied().fold(f64::INFINITY, f64::min);
        let max = speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(SpeedStats {
            samples: speeds.len(),
            avg: speeds.iter().sum::<f64>() / speeds.len() as f64,
            min,
            max,
        })
    };

    let dropped_frames = drop_re()
        .captures_iter(content)
        .filter_map(|cap| cap[1].parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    LogSummary {
        pool,
        path: path.to_path_buf(),
        readable: true,
        size_bytes: content.len() as u64,
        has_errors: lower.contains("error") || lower.contains("failed"),
        warnings: lower.matches("warning").count(),
        dropped_frames,
        speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFMPEG_LOG: &str = "\
frame=  120 fps= 30 q=23.0 size=N/A time=00:00:04.00 bitrate=N/A dup=0 drop=0 speed=1.02x
[hls @ 0x55] Warning: segment duration exceeded
frame=  240 fps= 30 q=23.0 size=N/A time=00:00:08.00 bitrate=N/A dup=0 drop=3 speed=0.98x
frame=  360 fps= 30 q=23.0 size=N/A time=00:00:12.00 bitrate=N/A dup=0 drop=2 speed=1.00x
";

    #[test]
    fn test_progress_lines() {
        let summary = summarize(PoolId::Nvenc1, Path::new("nvenc1.log"), FFMPEG_LOG);
        let speed = summary.speed.unwrap();
        assert_eq!(speed.samples, 3);
        assert_eq!(speed.min, 0.98);
        assert_eq!(speed.max, 1.02);
        assert!((speed.avg - 1.0).abs() < 1e-9);
        assert_eq!(summary.dropped_frames, 3);
        assert_eq!(summary.warnings, 1);
        assert!(!summary.has_errors);
    }

    #[test]
    fn test_error_mentions() {
        let summary = summarize(
            PoolId::Nvenc2,
            Path::new("nvenc2.log"),
            "OpenEncodeSessionEx failed: out of memory (10)\n",
        );
        assert!(summary.has_errors);
        assert!(summary.speed.is_none());
        assert_eq!(summary.dropped_frames, 0);
    }

    #[test]
    fn test_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let summary = analyze_log(PoolId::Nvenc1, &dir.path().join("absent.log"));
        assert!(!summary.readable);
        assert_eq!(summary.size_bytes, 0);
    }

    #[test]
    fn test_log_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvenc1_process.log");
        std::fs::write(&path, FFMPEG_LOG).unwrap();

        let summary = analyze_log(PoolId::Nvenc1, &path);
        assert!(summary.readable);
        assert_eq!(summary.size_bytes, FFMPEG_LOG.len() as u64);
    }
}
