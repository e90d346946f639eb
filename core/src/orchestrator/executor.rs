//! Orchestrator execution logic

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::analyzer::{analyze_log, ResultAnalyzer};
use crate::config::{TestConfig, MANIFEST_NAME};
use crate::error::{BenchError, BenchResult};
use crate::partition::{partition, StreamJob, POOL_COUNT};
use crate::pipeline::{PipelineCommand, PipelineRequest};
use crate::pool::{EncoderPool, PoolState};
use crate::resources::{check_admission, AdmissionReport};
use crate::telemetry::TelemetrySampler;
use crate::traits::{CommandBuilder, GpuDevice};

use super::cleanup::RunScope;
use super::progress::RunProgress;
use super::report::RunReport;

/// How the supervision phase ended
struct Supervision {
    test_elapsed: Duration,
    interrupted: bool,
}

/// Orchestrator drives one capacity run
///
/// Pre-flight (partition, input check, admission, command building) happens
/// before anything is launched; a failure there returns an error with no
/// process started. After launch, failures are recorded per pool and the run
/// always ends with analysis and cleanup.
pub struct Orchestrator {
    /// Test configuration
    pub(crate) config: TestConfig,

    /// Device under test
    pub(crate) device: Arc<dyn GpuDevice>,

    /// Pipeline command builder
    pub(crate) command_builder: Arc<dyn CommandBuilder>,

    /// Shutdown signal sender
    pub(crate) shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: TestConfig,
        device: Arc<dyn GpuDevice>,
        command_builder: Arc<dyn CommandBuilder>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            device,
            command_builder,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Request an early stop: running pools are terminated, then the run
    /// is analyzed and cleaned up as usual
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get the test configuration
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Run the test
    pub async fn run(&self) -> BenchResult<RunReport> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let started_at = Local::now();

        tracing::info!(
            streams_per_pool = self.config.streams_per_pool,
            total_streams = self.config.total_streams(),
            duration_secs = self.config.duration_secs,
            device = self.device.name(),
            builder = self.command_builder.name(),
            "Starting capacity test"
        );

        // Pre-flight: nothing is launched if any of these fail
        let jobs = self.plan_jobs()?;
        let admission = self.admission().await?;
        let commands = self.build_commands(&jobs)?;
        self.prepare_dirs(&jobs)?;

        let pools = jobs
            .iter()
            .map(|job| EncoderPool::new(job.clone(), self.config.paths.process_log(job.pool.name())))
            .collect();
        let timing = &self.config.timing;
        let mut scope = RunScope::new(
            pools,
            Arc::clone(&self.device),
            timing.termination_grace(),
            timing.poll_interval(),
            self.config.reset_device_on_cleanup,
        );

        let csv_path = self.config.paths.telemetry_csv();
        match TelemetrySampler::new(Arc::clone(&self.device), timing.telemetry_interval(), &csv_path)
            .spawn()
        {
            Ok(handle) => scope.attach_sampler(handle),
            Err(e) => tracing::warn!(error = %e, "Telemetry sampler unavailable, continuing without it"),
        }

        let supervision = self.supervise(&mut scope, &commands, &mut shutdown_rx).await;

        let telemetry = scope.stop_sampler().await;
        let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs);
        let logs = scope
            .pools()
            .iter()
            .map(|pool| analyze_log(pool.id(), pool.log_path()))
            .collect();
        let pools = scope.pools().iter().map(EncoderPool::outcome).collect();

        scope.cleanup().await;

        tracing::info!(
            classification = %result.classification,
            valid = result.valid,
            expected = result.expected,
            interrupted = supervision.interrupted,
            "Capacity test finished"
        );

        Ok(RunReport {
            started_at,
            finished_at: Local::now(),
            config: self.config.clone(),
            device: self.device.name().to_string(),
            admission,
            test_elapsed_secs: supervision.test_elapsed.as_secs_f64(),
            interrupted: supervision.interrupted,
            pools,
            telemetry,
            telemetry_csv: csv_path,
            result,
            logs,
        })
    }

    /// Run with Ctrl+C signal handling
    ///
    /// An interrupt terminates running pools; cleanup still runs exactly once.
    pub async fn run_with_signal_handling(&self) -> BenchResult<RunReport> {
        let shutdown_tx = self.shutdown_tx.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Received Ctrl+C, stopping pools...");
                    let _ = shutdown_tx.send(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;

        signal_handle.abort();

        result
    }

    // ------------------------------------------------------------------------
    // Pre-flight
    // ------------------------------------------------------------------------

    fn plan_jobs(&self) -> BenchResult<[StreamJob; POOL_COUNT]> {
        let paths = &self.config.paths;
        let jobs = partition(
            self.config.streams_per_pool,
            &paths.input_dir,
            &paths.input_pattern,
            &paths.output_dir,
        )?;

        for job in &jobs {
            tracing::info!(pool = %job.pool, streams = %job.range, "Partitioned workload");
            if self.config.require_inputs {
                job.validate_inputs()?;
            }
        }
        Ok(jobs)
    }

    async fn admission(&self) -> BenchResult<Option<AdmissionReport>> {
        if !self.config.admission_check {
            tracing::warn!("Admission check disabled, skipping memory pre-flight");
            return Ok(None);
        }

        let device = Arc::clone(&self.device);
        let budget = self.config.budget;
        let total = self.config.total_streams();
        let report = tokio::task::spawn_blocking(move || check_admission(&budget, total, device.as_ref()))
            .await
            .map_err(|e| BenchError::telemetry(format!("admission query task failed: {e}")))??;
        Ok(Some(report))
    }

    fn build_commands(&self, jobs: &[StreamJob]) -> BenchResult<Vec<PipelineCommand>> {
        jobs.iter()
            .map(|job| {
                let request = PipelineRequest {
                    job: job.clone(),
                    profile: self.config.encode.clone(),
                    duration: self.config.duration(),
                };
                let command = self.command_builder.build(&request)?;
                tracing::debug!(pool = %job.pool, command = %command.display(), "Built pipeline command");
                Ok(command)
            })
            .collect()
    }

    fn prepare_dirs(&self, jobs: &[StreamJob]) -> BenchResult<()> {
        std::fs::create_dir_all(&self.config.paths.log_dir)?;
        for job in jobs {
            // Stale manifests from an earlier run would be counted as valid
            if job.output_dir.exists() {
                tracing::debug!(path = %job.output_dir.display(), "Removing previous pool output");
                std::fs::remove_dir_all(&job.output_dir)?;
            }
            std::fs::create_dir_all(&job.output_dir)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Supervision
    // ------------------------------------------------------------------------

    async fn supervise(
        &self,
        scope: &mut RunScope,
        commands: &[PipelineCommand],
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Supervision {
        let timing = &self.config.timing;
        let mut interrupted = false;

        for (i, (pool, command)) in scope.pools.iter_mut().zip(commands).enumerate() {
            if i > 0 && !timing.launch_stagger().is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(timing.launch_stagger()) => {}
                }
            }
            if let Err(e) = pool.launch(command) {
                tracing::warn!(error = %e, "Pool failed to launch, the other pool continues");
            }
        }

        let clock = Instant::now();
        let cutoff = self.config.duration();

        if interrupted {
            tracing::warn!("Interrupted during launch");
            self.escalate(scope).await;
            return Supervision {
                test_elapsed: clock.elapsed(),
                interrupted,
            };
        }

        let running = scope
            .pools
            .iter()
            .filter(|p| p.state() == PoolState::Running)
            .count();
        tracing::info!(running, cutoff_secs = cutoff.as_secs(), "Test clock started");

        let progress = RunProgress::new(cutoff, self.config.show_progress);
        let mut ticker = tokio::time::interval(timing.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_report = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    interrupted = true;
                    tracing::warn!("Interrupted, terminating running pools");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let mut all_terminal = true;
            for pool in scope.pools.iter_mut() {
                all_terminal &= pool.poll().is_terminal();
            }

            let elapsed = clock.elapsed();
            progress.tick(elapsed);

            if all_terminal {
                tracing::info!(elapsed_secs = elapsed.as_secs(), "Both pools finished");
                break;
            }

            if elapsed >= cutoff {
                for pool in scope.pools.iter().filter(|p| p.state() == PoolState::Running) {
                    let err = BenchError::TimedOut {
                        pool: pool.id(),
                        after: cutoff,
                    };
                    tracing::warn!(error = %err, "Cutoff reached");
                }
                break;
            }

            if last_report.elapsed() >= timing.progress_interval() {
                progress.report(elapsed, &scope.pools);
                last_report = Instant::now();
            }
        }

        self.escalate(scope).await;
        progress.report(clock.elapsed(), &scope.pools);
        progress.finish(if interrupted { "interrupted" } else { "done" });

        Supervision {
            test_elapsed: clock.elapsed(),
            interrupted,
        }
    }

    /// Graceful termination of every running pool, then forced termination
    /// of whatever outlives the grace window
    async fn escalate(&self, scope: &mut RunScope) {
        let timing = &self.config.timing;

        let mut signalled = 0;
        for pool in scope.pools.iter_mut() {
            if pool.begin_termination() {
                signalled += 1;
            }
        }
        if signalled == 0 {
            return;
        }

        let deadline = Instant::now() + timing.termination_grace();
        loop {
            let mut waiting = false;
            for pool in scope.pools.iter_mut() {
                waiting |= pool.poll() == PoolState::TimedOut;
            }
            if !waiting || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(timing.poll_interval()).await;
        }

        for pool in scope.pools.iter_mut() {
            pool.force_kill().await;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("device", &self.device.name())
            .field("command_builder", &self.command_builder.name())
            .finish()
    }
}
