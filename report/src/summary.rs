//! Human readable `test_summary.txt`

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use nvenc_capacity_core::RunReport;

use crate::{create_file, ReportError, ReportResult};

const RULE: &str = "==================================================";

/// Render the summary text for a run
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    // fmt::Write on a String cannot fail
    let _ = write_summary_text(&mut out, report);
    out
}

/// Write the summary to `path`
pub fn write_summary(report: &RunReport, path: &Path) -> ReportResult<()> {
    let mut file = create_file(path)?;
    file.write_all(render_summary(report).as_bytes())
        .map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn write_summary_text(out: &mut String, report: &RunReport) -> std::fmt::Result {
    let config = &report.config;
    let result = &report.result;

    writeln!(out, "{RULE}")?;
    writeln!(out, "DUAL NVENC CONCURRENT CAPACITY TEST")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Started:            {}", report.started_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Finished:           {}", report.finished_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Device:             {}", report.device)?;
    writeln!(out, "Streams per NVENC:  {}", config.streams_per_pool)?;
    writeln!(out, "Total streams:      {}", config.total_streams())?;
    writeln!(out, "Duration cutoff:    {}s", config.duration_secs)?;
    writeln!(out, "Test clock:         {:.1}s", report.test_elapsed_secs)?;
    writeln!(
        out,
        "Encode profile:     {} @ {}k, {} fps, {}s segments, preset {}",
        config.encode.resolution(),
        config.encode.bitrate_kbps,
        config.encode.framerate,
        config.encode.segment_duration_secs,
        config.encode.preset
    )?;
    if report.interrupted {
        writeln!(out, "Interrupted:        yes")?;
    }
    writeln!(out)?;

    writeln!(out, "MEMORY ADMISSION")?;
    match &report.admission {
        Some(admission) => {
            writeln!(out, "  Required:         {} MB", admission.required_mb)?;
            writeln!(out, "  Free at start:    {} MB of {} MB", admission.free_mb, admission.total_mb)?;
            writeln!(out, "  Headroom:         {} MB", admission.headroom_mb)?;
        }
        None => writeln!(out, "  skipped")?,
    }
    writeln!(out)?;

    writeln!(out, "POOLS")?;
    for pool in &report.pools {
        write!(
            out,
            "  {}: streams {} -> {}",
            pool.pool, pool.range, pool.state
        )?;
        if let Some(code) = pool.exit_code {
            write!(out, " (exit {code})")?;
        } else if let Some(signal) = pool.exit_signal {
            write!(out, " (signal {signal})")?;
        }
        if pool.timed_out {
            write!(out, ", timed out")?;
        }
        if !pool.signals_sent.is_empty() {
            let signals: Vec<String> = pool.signals_sent.iter().map(ToString::to_string).collect();
            write!(out, ", sent {}", signals.join("+"))?;
        }
        writeln!(out)?;
        if let Some(error) = &pool.error {
            writeln!(out, "    error: {error}")?;
        }
    }
    writeln!(out)?;

    writeln!(out, "OUTPUT")?;
    for stats in &result.pools {
        writeln!(
            out,
            "  {}: {}/{} streams ({:.1}%), {:.1} MB, {} segments",
            stats.pool,
            stats.successful,
            stats.expected,
            stats.success_rate() * 100.0,
            stats.output_bytes as f64 / (1024.0 * 1024.0),
            stats.segments
        )?;
    }
    writeln!(out, "  Total output:     {:.1} MB", result.output_mib())?;
    writeln!(
        out,
        "  HLS output:       {} playlists, {} segments, {:.1} segments per playlist",
        result.valid,
        result.segments,
        result.avg_segments_per_playlist()
    )?;
    writeln!(out)?;

    let telemetry = &report.telemetry;
    writeln!(out, "GPU TELEMETRY ({} samples, {} gaps)", telemetry.samples, telemetry.gaps)?;
    if telemetry.has_readings() {
        writeln!(
            out,
            "  Utilization:      {:.1}% avg, {:.1}% max, {:.0}% of samples above 50%",
            telemetry.avg_gpu_util_percent,
            telemetry.max_gpu_util_percent,
            telemetry.high_util_fraction * 100.0
        )?;
        writeln!(
            out,
            "  VRAM:             {:.1}% avg, {:.1}% max ({} MB)",
            telemetry.avg_mem_percent, telemetry.max_mem_percent, telemetry.max_mem_used_mb
        )?;
        writeln!(
            out,
            "  Temperature:      {:.1}°C avg, {:.0}°C max",
            telemetry.avg_temp_c, telemetry.max_temp_c
        )?;
        if let (Some(avg), Some(max)) = (telemetry.avg_power_w, telemetry.max_power_w) {
            writeln!(out, "  Power:            {avg:.1}W avg, {max:.1}W max")?;
        }
        if let Some(sessions) = telemetry.max_encoder_sessions {
            writeln!(out, "  Encoder sessions: {sessions} max")?;
        }
    } else {
        writeln!(out, "  no readings")?;
    }
    writeln!(out)?;

    if !report.logs.is_empty() {
        writeln!(out, "PROCESS LOGS")?;
        for log in &report.logs {
            if !log.readable {
                writeln!(out, "  {}: unreadable", log.pool)?;
                continue;
            }
            write!(
                out,
                "  {}: {:.1} KB, {} warnings, {} dropped frames",
                log.pool,
                log.size_bytes as f64 / 1024.0,
                log.warnings,
                log.dropped_frames
            )?;
            if let Some(speed) = &log.speed {
                write!(out, ", speed {:.2}x avg ({:.2}-{:.2})", speed.avg, speed.min, speed.max)?;
            }
            if log.has_errors {
                write!(out, ", errors reported")?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }

    let performance = report.performance();
    writeln!(out, "OVERALL ASSESSMENT")?;
    writeln!(out, "  Performance grade: {}", performance.grade)?;
    writeln!(
        out,
        "  Score:             {}/{} ({:.1}%)",
        performance.score, performance.max_score, performance.percent
    )?;
    writeln!(out)?;

    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "RESULT: {} ({}/{} streams, {:.1}%)",
        result.classification,
        result.valid,
        result.expected,
        result.success_percent()
    )?;
    writeln!(out, "{RULE}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::run_report;

    #[test]
    fn test_summary_contents() {
        let text = render_summary(&run_report(46));

        assert!(text.contains("Streams per NVENC:  50"));
        assert!(text.contains("nvenc2: streams [51, 100] -> KILLED (signal 9), timed out, sent SIGTERM+SIGKILL"));
        assert!(text.contains("nvenc2: 46/50 streams (92.0%), 200.0 MB, 690 segments"));
        assert!(text.contains("Total output:     500.0 MB"));
        assert!(text.contains("HLS output:       96 playlists, 1440 segments, 15.0 segments per playlist"));
        assert!(text.contains("Performance grade: A+ (Excellent)"));
        assert!(text.contains("Score:             95/100 (95.0%)"));
        assert!(text.contains("Encoder sessions: 100 max"));
        assert!(text.contains("speed 1.01x avg (0.97-1.04)"));
        assert!(text.trim_end().lines().rev().nth(1).unwrap().starts_with("RESULT: PASS (96/100"));
    }

    #[test]
    fn test_summary_without_admission_or_readings() {
        let mut report = run_report(30);
        report.admission = None;
        report.telemetry.gaps = report.telemetry.samples;
        report.interrupted = true;

        let text = render_summary(&report);
        assert!(text.contains("MEMORY ADMISSION\n  skipped"));
        assert!(text.contains("no readings"));
        // mean pool success 80 % -> 25, 100 encoder sessions -> 25
        assert!(text.contains("Score:             50/60 (83.3%)"));
        assert!(text.contains("Performance grade: A (Very Good)"));
        assert!(text.contains("Interrupted:        yes"));
        assert!(text.contains("RESULT: FAIL (80/100"));
    }

    #[test]
    fn test_write_summary_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("test_summary.txt");
        write_summary(&run_report(50), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("RESULT: PASS"));
    }
}
