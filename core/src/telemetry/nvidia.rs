//! `nvidia-smi` backed [`GpuDevice`]

use std::process::Command;

use crate::error::{BenchError, BenchResult};
use crate::telemetry::{DeviceMemory, DeviceMetrics};
use crate::traits::GpuDevice;

const QUERY_FIELDS: &str = "utilization.gpu,memory.used,memory.total,memory.free,\
                            temperature.gpu,power.draw,encoder.stats.sessionCount";

/// GPU queried through the `nvidia-smi` CLI
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    binary: String,
    index: u32,
    name: String,
}

impl NvidiaSmi {
    /// Device `index` through the `nvidia-smi` on `PATH`
    pub fn new(index: u32) -> Self {
        Self::with_binary("nvidia-smi", index)
    }

    /// Device `index` through a specific `nvidia-smi` binary
    pub fn with_binary(binary: impl Into<String>, index: u32) -> Self {
        let binary = binary.into();
        Self {
            name: format!("nvidia-smi:{index}"),
            binary,
            index,
        }
    }

    fn query(&self) -> BenchResult<SmiRow> {
        let output = Command::new(&self.binary)
            .arg(format!("--query-gpu={QUERY_FIELDS}"))
            .arg("--format=csv,noheader,nounits")
            .arg("-i")
            .arg(self.index.to_string())
            .output()
            .map_err(|e| BenchError::telemetry(format!("failed to execute {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BenchError::telemetry(format!(
                "{} exited with {}: {stderr}",
                self.binary, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_query_output(&stdout)
    }
}

impl GpuDevice for NvidiaSmi {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_memory(&self) -> BenchResult<DeviceMemory> {
        let row = self.query()?;
        Ok(DeviceMemory {
            total_mb: row.mem_total_mb,
            used_mb: row.mem_used_mb,
            free_mb: row.mem_free_mb,
        })
    }

    fn query_metrics(&self) -> BenchResult<DeviceMetrics> {
        Ok(self.query()?.into_metrics())
    }

    fn reset(&self) -> BenchResult<()> {
        let output = Command::new(&self.binary)
            .args(["-r", "-i"])
            .arg(self.index.to_string())
            .output()
            .map_err(|e| BenchError::cleanup("device reset", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BenchError::cleanup("device reset", stderr));
        }
        Ok(())
    }
}

/// One parsed `--query-gpu` row
#[derive(Debug, Clone, PartialEq)]
struct SmiRow {
    gpu_util_percent: f64,
    mem_used_mb: u64,
    mem_total_mb: u64,
    mem_free_mb: u64,
    temp_c: f64,
    power_w: Option<f64>,
    encoder_sessions: Option<u32>,
}

impl SmiRow {
    fn into_metrics(self) -> DeviceMetrics {
        DeviceMetrics {
            gpu_util_percent: self.gpu_util_percent,
            mem_used_mb: self.mem_used_mb,
            mem_total_mb: self.mem_total_mb,
            temp_c: self.temp_c,
            power_w: self.power_w,
            encoder_sessions: self.encoder_sessions,
        }
    }
}

fn parse_query_output(raw: &str) -> BenchResult<SmiRow> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| BenchError::telemetry("nvidia-smi returned no rows"))?;

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 7 {
        return Err(BenchError::telemetry(format!(
            "unexpected nvidia-smi output: '{line}'"
        )));
    }

    Ok(SmiRow {
        gpu_util_percent: required(fields[0], "utilization.gpu")?,
        mem_used_mb: required(fields[1], "memory.used")?,
        mem_total_mb: required(fields[2], "memory.total")?,
        mem_free_mb: required(fields[3], "memory.free")?,
        temp_c: required(fields[4], "temperature.gpu")?,
        power_w: optional(fields[5]),
        encoder_sessions: optional(fields[6]),
    })
}

fn is_unavailable(field: &str) -> bool {
    field.is_empty() || field.starts_with("[N/A]") || field.eq_ignore_ascii_case("n/a")
}

fn required<T: std::str::FromStr>(field: &str, what: &str) -> BenchResult<T> {
    if is_unavailable(field) {
        return Err(BenchError::telemetry(format!("{what} not available")));
    }
    field
        .parse()
        .map_err(|_| BenchError::telemetry(format!("invalid {what} value '{field}'")))
}

fn optional<T: std::str::FromStr>(field: &str) -> Option<T> {
    if is_unavailable(field) {
        None
    } else {
        field.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_row() {
        let row = parse_query_output("87, 9120, 24564, 15444, 64, 182.35, 17\n").unwrap();
        assert_eq!(row.gpu_util_percent, 87.0);
        assert_eq!(row.mem_used_mb, 9_120);
        assert_eq!(row.mem_free_mb, 15_444);
        assert_eq!(row.power_w, Some(182.35));
        assert_eq!(row.encoder_sessions, Some(17));
    }

    #[test]
    fn test_parse_unavailable_optional_fields() {
        let row = parse_query_output("3, 512, 8192, 7680, 41, [N/A], [N/A]").unwrap();
        assert_eq!(row.power_w, None);
        assert_eq!(row.encoder_sessions, None);
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        assert!(parse_query_output("").is_err());
        assert!(parse_query_output("1, 2, 3").is_err());
        assert!(parse_query_output("[N/A], 512, 8192, 7680, 41, 90, 1").is_err());
        assert!(parse_query_output("x, 512, 8192, 7680, 41, 90, 1").is_err());
    }

    #[test]
    fn test_missing_binary_is_query_failure() {
        let device = NvidiaSmi::with_binary("/nonexistent/nvidia-smi", 0);
        assert_eq!(device.name(), "nvidia-smi:0");
        assert!(matches!(
            device.query_metrics(),
            Err(BenchError::TelemetryQueryFailed(_))
        ));
        assert!(matches!(
            device.reset(),
            Err(BenchError::CleanupStepFailed { .. })
        ));
    }
}
