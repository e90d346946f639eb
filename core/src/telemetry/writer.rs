//! Incremental CSV writer for `gpu_monitoring.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::error::BenchResult;
use crate::telemetry::TelemetrySample;

/// Column header of the telemetry CSV
pub const TELEMETRY_HEADER: [&str; 7] = [
    "timestamp",
    "gpu_util_percent",
    "mem_used_mb",
    "mem_total_mb",
    "mem_percent",
    "temp_c",
    "power_w",
];

/// Value written for every metric of a gap sample
pub const GAP_MARKER: &str = "NA";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes one row per sample and flushes it immediately
///
/// Each row is on disk as soon as [`TelemetryCsvWriter::write_sample`]
/// returns, so an interrupted run still leaves a usable series.
pub struct TelemetryCsvWriter {
    wtr: Writer<File>,
    rows: usize,
}

impl TelemetryCsvWriter {
    /// Create (truncate) the CSV at `path` and write the header
    pub fn create(path: &Path) -> BenchResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut wtr = Writer::from_writer(file);
        wtr.write_record(TELEMETRY_HEADER)?;
        wtr.flush()?;
        Ok(Self { wtr, rows: 0 })
    }

    /// Append one sample
    pub fn write_sample(&mut self, sample: &TelemetrySample) -> BenchResult<()> {
        let timestamp = sample.timestamp.format(TIMESTAMP_FORMAT).to_string();

        match &sample.metrics {
            Some(m) => {
                let power = m
                    .power_w
                    .map(|p| format!("{p:.2}"))
                    .unwrap_or_else(|| GAP_MARKER.to_string());
                self.wtr.write_record([
                    timestamp,
                    format!("{:.0}", m.gpu_util_percent),
                    m.mem_used_mb.to_string(),
                    m.mem_total_mb.to_string(),
                    format!("{:.2}", m.memory_percent()),
                    format!("{:.0}", m.temp_c),
                    power,
                ])?;
            }
            None => {
                let mut record = vec![timestamp];
                record.extend(std::iter::repeat(GAP_MARKER.to_string()).take(6));
                self.wtr.write_record(record)?;
            }
        }

        self.wtr.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, excluding the header
    pub fn rows(&self) -> usize {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::DeviceMetrics;

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("gpu_monitoring.csv");

        let mut writer = TelemetryCsvWriter::create(&path).unwrap();
        writer
            .write_sample(&TelemetrySample::reading(DeviceMetrics {
                gpu_util_percent: 72.0,
                mem_used_mb: 6_000,
                mem_total_mb: 24_000,
                temp_c: 61.0,
                power_w: Some(150.0),
                encoder_sessions: None,
            }))
            .unwrap();
        writer.write_sample(&TelemetrySample::gap()).unwrap();
        assert_eq!(writer.rows(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,gpu_util_percent,mem_used_mb,mem_total_mb,mem_percent,temp_c,power_w"
        );
        assert!(lines[1].ends_with(",72,6000,24000,25.00,61,150.00"));
        assert!(lines[2].ends_with(",NA,NA,NA,NA,NA,NA"));
    }

    #[test]
    fn test_rows_visible_before_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu_monitoring.csv");

        let mut writer = TelemetryCsvWriter::create(&path).unwrap();
        writer.write_sample(&TelemetrySample::gap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        drop(writer);
    }
}
