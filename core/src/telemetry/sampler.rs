//! Periodic device sampling task

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{BenchError, BenchResult};
use crate::telemetry::{TelemetryAccumulator, TelemetryCsvWriter, TelemetrySample, TelemetrySummary};
use crate::traits::GpuDevice;

/// Samples a [`GpuDevice`] at a fixed interval into the telemetry CSV
///
/// The sampler runs independently of pool state: a pool failing or finishing
/// never stops it, only [`SamplerHandle::stop`] (or dropping the handle) does.
pub struct TelemetrySampler {
    device: Arc<dyn GpuDevice>,
    interval: Duration,
    csv_path: PathBuf,
}

impl TelemetrySampler {
    /// Create a sampler writing to `csv_path`
    pub fn new(device: Arc<dyn GpuDevice>, interval: Duration, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            device,
            interval,
            csv_path: csv_path.into(),
        }
    }

    /// Create the CSV and start sampling on the current runtime
    pub fn spawn(self) -> BenchResult<SamplerHandle> {
        let writer = TelemetryCsvWriter::create(&self.csv_path)?;
        let (stop_tx, stop_rx) = oneshot::channel();

        tracing::info!(
            device = self.device.name(),
            interval_ms = self.interval.as_millis() as u64,
            path = %self.csv_path.display(),
            "Telemetry sampler started"
        );

        let task = tokio::spawn(self.run(writer, stop_rx));
        Ok(SamplerHandle {
            stop_tx: Some(stop_tx),
            task: Some(task),
            summary: None,
        })
    }

    async fn run(self, mut writer: TelemetryCsvWriter, mut stop_rx: oneshot::Receiver<()>) -> TelemetrySummary {
        let mut acc = TelemetryAccumulator::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => break,

                _ = ticker.tick() => {
                    let sample = tokio::select! {
                        biased;
                        _ = &mut stop_rx => break,
                        sample = self.sample_once() => sample,
                    };

                    acc.record(&sample);
                    if let Err(e) = writer.write_sample(&sample) {
                        tracing::warn!(error = %e, "Failed to write telemetry row");
                    }
                }
            }
        }

        let summary = acc.summary();
        tracing::info!(
            samples = summary.samples,
            gaps = summary.gaps,
            rows = writer.rows(),
            "Telemetry sampler stopped"
        );
        summary
    }

    async fn sample_once(&self) -> TelemetrySample {
        let device = Arc::clone(&self.device);
        let result = tokio::task::spawn_blocking(move || device.query_metrics())
            .await
            .unwrap_or_else(|e| Err(BenchError::telemetry(format!("query task failed: {e}"))));

        match result {
            Ok(metrics) => {
                tracing::debug!(
                    gpu_util = metrics.gpu_util_percent,
                    mem_used_mb = metrics.mem_used_mb,
                    mem_percent = metrics.memory_percent(),
                    temp_c = metrics.temp_c,
                    power_w = ?metrics.power_w,
                    encoder_sessions = ?metrics.encoder_sessions,
                    "GPU sample"
                );
                TelemetrySample::reading(metrics)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry query failed, recording gap");
                TelemetrySample::gap()
            }
        }
    }
}

/// Owner of a running sampler
pub struct SamplerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<TelemetrySummary>>,
    summary: Option<TelemetrySummary>,
}

impl SamplerHandle {
    /// Whether the sampling task is still alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop sampling and return the aggregates
    ///
    /// Idempotent: later calls return the summary of the first.
    pub async fn stop(&mut self) -> TelemetrySummary {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let summary = match task.await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(error = %e, "Telemetry task ended abnormally");
                    TelemetrySummary::default()
                }
            };
            self.summary = Some(summary);
        }

        self.summary.clone().unwrap_or_default()
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{DeviceMemory, DeviceMetrics};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every other query
    struct FlakyDevice {
        calls: AtomicUsize,
    }

    impl GpuDevice for FlakyDevice {
        fn name(&self) -> &str {
            "flaky"
        }

        fn query_memory(&self) -> BenchResult<DeviceMemory> {
            Err(BenchError::telemetry("not used"))
        }

        fn query_metrics(&self) -> BenchResult<DeviceMetrics> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 1 {
                return Err(BenchError::telemetry("driver busy"));
            }
            Ok(DeviceMetrics {
                gpu_util_percent: 55.0,
                mem_used_mb: 1_000,
                mem_total_mb: 8_000,
                temp_c: 50.0,
                power_w: None,
                encoder_sessions: Some(2),
            })
        }

        fn reset(&self) -> BenchResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sampler_records_gaps_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu_monitoring.csv");
        let device = Arc::new(FlakyDevice {
            calls: AtomicUsize::new(0),
        });

        let mut handle = TelemetrySampler::new(device, Duration::from_millis(10), &path)
            .spawn()
            .unwrap();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(120)).await;

        let started = std::time::Instant::now();
        let summary = handle.stop().await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!handle.is_running());

        assert!(summary.samples >= 2, "only {} samples", summary.samples);
        assert!(summary.gaps >= 1);
        assert!(summary.has_readings());

        let rows = std::fs::read_to_string(&path).unwrap().lines().count() - 1;
        assert_eq!(rows, summary.samples);

        let again = handle.stop().await;
        assert_eq!(again, summary);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_stops_within_one_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu_monitoring.csv");
        let interval = Duration::from_secs(1);
        let device = Arc::new(FlakyDevice {
            calls: AtomicUsize::new(0),
        });

        let mut handle = TelemetrySampler::new(device, interval, &path).spawn().unwrap();

        // stop half way between two ticks
        tokio::time::sleep(interval * 5 / 2).await;

        let started = tokio::time::Instant::now();
        let summary = handle.stop().await;
        assert!(started.elapsed() <= interval);
        assert!(!handle.is_running());
        assert!(summary.samples >= 1);

        tokio::time::sleep(interval * 3).await;
        let rows = std::fs::read_to_string(&path).unwrap().lines().count() - 1;
        assert_eq!(rows, summary.samples, "sample written after stop");
    }

    #[tokio::test]
    async fn test_sampler_rejects_unwritable_csv() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let device = Arc::new(FlakyDevice {
            calls: AtomicUsize::new(0),
        });
        let result = TelemetrySampler::new(device, Duration::from_millis(10), blocker.join("gpu.csv")).spawn();
        assert!(result.is_err());
    }
}
