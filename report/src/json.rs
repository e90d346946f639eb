//! JSON export of the run analysis (`analysis_report.json`)

use std::io::Write;
use std::path::Path;

use nvenc_capacity_core::RunReport;
use serde_json::{json, Value};

use crate::{create_file, ReportError, ReportResult};

/// Writes the machine readable analysis report
pub struct JsonExporter;

impl JsonExporter {
    /// Build the report document
    pub fn to_value(report: &RunReport) -> ReportResult<Value> {
        let config = &report.config;
        let result = &report.result;

        let mut per_pool = Vec::with_capacity(result.pools.len());
        for stats in &result.pools {
            let outcome = report.pools.iter().find(|o| o.pool == stats.pool);
            per_pool.push(json!({
                "pool": stats.pool,
                "expected": stats.expected,
                "successful": stats.successful,
                "failed": stats.failed,
                "success_rate_percent": stats.success_rate() * 100.0,
                "output_bytes": stats.output_bytes,
                "segments": stats.segments,
                "avg_segments_per_playlist": stats.avg_segments_per_playlist(),
                "process": serde_json::to_value(outcome)?,
            }));
        }

        Ok(json!({
            "test_config": {
                "streams_per_nvenc": config.streams_per_pool,
                "total_streams": config.total_streams(),
                "duration_secs": config.duration_secs,
                "resolution": config.encode.resolution(),
                "bitrate_kbps": config.encode.bitrate_kbps,
                "framerate": config.encode.framerate,
                "segment_duration_secs": config.encode.segment_duration_secs,
                "preset": config.encode.preset,
                "device": report.device,
            },
            "timing": {
                "started_at": report.started_at.to_rfc3339(),
                "finished_at": report.finished_at.to_rfc3339(),
                "test_elapsed_secs": report.test_elapsed_secs,
                "interrupted": report.interrupted,
            },
            "admission": serde_json::to_value(&report.admission)?,
            "results": {
                "expected_streams": result.expected,
                "valid_streams": result.valid,
                "success_rate_percent": result.success_percent(),
                "classification": result.classification,
                "total_output_bytes": result.output_bytes,
                "total_output_mb": result.output_mib(),
                "success": report.is_success(),
            },
            "output_generation": {
                "playlists": result.valid,
                "segments": result.segments,
                "avg_segments_per_playlist": result.avg_segments_per_playlist(),
                "total_output_mb": result.output_mib(),
            },
            "performance": serde_json::to_value(report.performance())?,
            "per_pool": per_pool,
            "gpu_telemetry": serde_json::to_value(&report.telemetry)?,
            "telemetry_csv": report.telemetry_csv.display().to_string(),
            "logs": serde_json::to_value(&report.logs)?,
        }))
    }

    /// Export the report to `path`
    pub fn export(report: &RunReport, path: &Path) -> ReportResult<()> {
        let output = Self::to_value(report)?;

        let mut file = create_file(path)?;
        serde_json::to_writer_pretty(&mut file, &output)?;
        file.write_all(b"\n").map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::run_report;

    #[test]
    fn test_json_document_shape() {
        let value = JsonExporter::to_value(&run_report(46)).unwrap();

        assert_eq!(value["test_config"]["total_streams"], 100);
        assert_eq!(value["test_config"]["resolution"], "1280x720");
        assert_eq!(value["results"]["valid_streams"], 96);
        assert_eq!(value["results"]["classification"], "PASS");
        assert_eq!(value["results"]["success"], true);
        assert_eq!(value["admission"]["required_mb"], 17_512);

        let pools = value["per_pool"].as_array().unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[1]["pool"], "nvenc2");
        assert_eq!(pools[1]["successful"], 46);
        assert_eq!(pools[1]["process"]["state"], "killed");
        assert_eq!(pools[1]["process"]["signals_sent"][1], "kill");

        assert_eq!(value["gpu_telemetry"]["max_encoder_sessions"], 100);
        assert_eq!(value["output_generation"]["segments"], 1440);
        assert_eq!(value["output_generation"]["avg_segments_per_playlist"], 15.0);
        assert_eq!(pools[1]["segments"], 690);
        assert_eq!(value["performance"]["score"], 95);
        assert_eq!(value["performance"]["grade"], "A+");
        assert_eq!(value["logs"][0]["speed"]["samples"], 30);
    }

    #[test]
    fn test_json_failed_run() {
        let mut report = run_report(10);
        report.admission = None;

        let value = JsonExporter::to_value(&report).unwrap();
        assert_eq!(value["results"]["classification"], "FAIL");
        assert_eq!(value["results"]["success"], false);
        assert!(value["admission"].is_null());
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis_report.json");
        JsonExporter::export(&run_report(50), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["results"]["valid_streams"], 100);
        assert_eq!(parsed["per_pool"][0]["success_rate_percent"], 100.0);
    }
}
