//! Encoder pool process supervision

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::Child;

use crate::error::{BenchError, BenchResult};
use crate::partition::{PoolId, StreamJob};
use crate::pipeline::PipelineCommand;
use crate::pool::{PoolOutcome, PoolSignal, PoolState};

/// Upper bound on waiting for the kernel to reap a SIGKILLed process
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// One encoder pool: a job bound to a single pipeline process
///
/// The process is spawned as leader of its own process group, so termination
/// signals reach every helper the pipeline forks. State only moves forward;
/// once terminal, no further signal is ever sent.
pub struct EncoderPool {
    job: StreamJob,
    log_path: PathBuf,
    state: PoolState,
    child: Option<Child>,
    pid: Option<u32>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    exit_code: Option<i32>,
    exit_signal: Option<i32>,
    timed_out: bool,
    signals_sent: Vec<PoolSignal>,
    error: Option<String>,
}

impl EncoderPool {
    /// Create a pending pool for `job`, logging to `log_path`
    pub fn new(job: StreamJob, log_path: impl Into<PathBuf>) -> Self {
        Self {
            job,
            log_path: log_path.into(),
            state: PoolState::Pending,
            child: None,
            pid: None,
            started_at: None,
            ended_at: None,
            exit_code: None,
            exit_signal: None,
            timed_out: false,
            signals_sent: Vec::new(),
            error: None,
        }
    }

    /// Pool identity
    pub fn id(&self) -> PoolId {
        self.job.pool
    }

    /// Assigned workload
    pub fn job(&self) -> &StreamJob {
        &self.job
    }

    /// Current state (as of the last poll)
    pub fn state(&self) -> PoolState {
        self.state
    }

    /// OS process id once spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Signals sent so far, in order
    pub fn signals_sent(&self) -> &[PoolSignal] {
        &self.signals_sent
    }

    /// Process log path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Spawn the pipeline process: `Pending → Running`
    ///
    /// On spawn failure the pool moves to `Failed` and the error is returned;
    /// the other pool is unaffected.
    pub fn launch(&mut self, command: &PipelineCommand) -> BenchResult<()> {
        if self.state != PoolState::Pending {
            return Err(BenchError::config(format!(
                "{} cannot be launched from state {}",
                self.id(),
                self.state
            )));
        }

        match self.spawn(command) {
            Ok(child) => {
                self.pid = child.id();
                self.child = Some(child);
                self.started_at = Some(Instant::now());
                self.state = PoolState::Running;
                tracing::info!(
                    pool = %self.id(),
                    pid = ?self.pid,
                    streams = %self.job.range,
                    log = %self.log_path.display(),
                    "Pipeline launched"
                );
                Ok(())
            }
            Err(source) => {
                self.state = PoolState::Failed;
                self.error = Some(format!("launch failed: {source}"));
                tracing::error!(
                    pool = %self.id(),
                    program = %command.program.display(),
                    error = %source,
                    "Pipeline launch failed"
                );
                Err(BenchError::PipelineLaunchFailed {
                    pool: self.id(),
                    source,
                })
            }
        }
    }

    fn spawn(&self, command: &PipelineCommand) -> std::io::Result<Child> {
        let log = open_log(&self.log_path)?;
        let stderr = log.try_clone()?;

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(pool = %self.id(), command = %command.display(), "Spawning pipeline");
        cmd.spawn()
    }

    /// Non-blocking status check; moves a live pool to its terminal state
    /// when the process has exited
    pub fn poll(&mut self) -> PoolState {
        if !self.state.is_alive() {
            return self.state;
        }

        let Some(child) = self.child.as_mut() else {
            return self.state;
        };

        match child.try_wait() {
            Ok(Some(status)) => self.finish(status),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pool = %self.id(), error = %e, "Failed to poll pipeline status");
            }
        }
        self.state
    }

    /// Cutoff elapsed: `Running → TimedOut` and send graceful termination
    ///
    /// Returns `false` when the pool was not running (nothing sent).
    pub fn begin_termination(&mut self) -> bool {
        if self.poll() != PoolState::Running {
            return false;
        }

        self.timed_out = true;
        self.state = PoolState::TimedOut;
        tracing::warn!(
            pool = %self.id(),
            pid = ?self.pid,
            "Pipeline still running at cutoff, sending graceful termination"
        );
        self.signal(PoolSignal::Terminate);
        true
    }

    /// Forced termination of a pool that ignored the graceful signal
    ///
    /// No-op for pools that are terminal or never sent SIGTERM.
    pub async fn force_kill(&mut self) -> PoolState {
        if self.poll() != PoolState::TimedOut || self.signals_sent.contains(&PoolSignal::Kill) {
            return self.state;
        }

        tracing::warn!(pool = %self.id(), pid = ?self.pid, "Grace window elapsed, force-killing pipeline");
        self.signal(PoolSignal::Kill);

        let Some(child) = self.child.as_mut() else {
            return self.state;
        };
        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                self.finish(status);
            }
            Ok(Err(e)) => {
                tracing::warn!(pool = %self.id(), error = %e, "Failed to reap killed pipeline");
                self.mark_killed();
            }
            Err(_) => {
                tracing::warn!(pool = %self.id(), "Killed pipeline was not reaped in time");
                self.mark_killed();
            }
        }
        self.state
    }

    /// Full escalation for one pool: graceful, wait `grace`, then forced
    ///
    /// Used by cleanup. Safe to call on terminal pools and repeatedly.
    pub async fn terminate(&mut self, grace: Duration, poll_interval: Duration) -> PoolState {
        if !self.state.is_alive() {
            return self.state;
        }

        if self.state == PoolState::Running {
            self.begin_termination();
        }

        let deadline = Instant::now() + grace;
        while self.poll() == PoolState::TimedOut && Instant::now() < deadline {
            tokio::time::sleep(poll_interval).await;
        }

        self.force_kill().await
    }

    /// Snapshot of the pool for reporting
    pub fn outcome(&self) -> PoolOutcome {
        PoolOutcome {
            pool: self.id(),
            range: self.job.range,
            state: self.state,
            pid: self.pid,
            exit_code: self.exit_code,
            exit_signal: self.exit_signal,
            timed_out: self.timed_out,
            signals_sent: self.signals_sent.clone(),
            runtime_secs: self.runtime().map(|d| d.as_secs_f64()),
            error: self.error.clone(),
            log_path: self.log_path.clone(),
        }
    }

    /// Time between spawn and exit (or now, while alive)
    pub fn runtime(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    fn finish(&mut self, status: ExitStatus) {
        self.ended_at = Some(Instant::now());
        self.exit_code = status.code();
        self.exit_signal = exit_signal(&status);

        let killed = self.signals_sent.contains(&PoolSignal::Kill);
        let stopped_by_us = self.signals_sent.contains(&PoolSignal::Terminate)
            && self.exit_signal == Some(SIGTERM);

        self.state = if killed && !status.success() {
            PoolState::Killed
        } else if status.success() || stopped_by_us {
            PoolState::Completed
        } else {
            PoolState::Failed
        };

        match self.state {
            PoolState::Completed => {
                tracing::info!(
                    pool = %self.id(),
                    exit_code = ?self.exit_code,
                    timed_out = self.timed_out,
                    runtime_secs = ?self.runtime().map(|d| d.as_secs()),
                    "Pipeline completed"
                );
            }
            PoolState::Killed => {
                self.error = Some(BenchError::Killed { pool: self.id() }.to_string());
                tracing::warn!(pool = %self.id(), "Pipeline force-killed");
            }
            _ => {
                let err = BenchError::PipelineExitedNonZero {
                    pool: self.id(),
                    code: self.exit_code,
                };
                tracing::error!(
                    pool = %self.id(),
                    exit_code = ?self.exit_code,
                    signal = ?self.exit_signal,
                    log = %self.log_path.display(),
                    "Pipeline failed"
                );
                self.error = Some(err.to_string());
            }
        }

        self.child = None;
    }

    fn mark_killed(&mut self) {
        self.ended_at = Some(Instant::now());
        self.state = PoolState::Killed;
        self.error = Some(BenchError::Killed { pool: self.id() }.to_string());
    }

    fn signal(&mut self, signal: PoolSignal) {
        let Some(pid) = self.pid else {
            return;
        };
        self.signals_sent.push(signal);
        tracing::debug!(pool = %self.id(), pid, %signal, "Signalling process group");

        #[cfg(unix)]
        {
            let sig = match signal {
                PoolSignal::Terminate => libc::SIGTERM,
                PoolSignal::Kill => libc::SIGKILL,
            };
            // SAFETY: pid is the leader of the group created by process_group(0)
            let rc = unsafe { libc::killpg(pid as libc::pid_t, sig) };
            if rc != 0 {
                tracing::debug!(
                    pool = %self.id(),
                    error = %std::io::Error::last_os_error(),
                    "killpg failed"
                );
            }
        }

        #[cfg(not(unix))]
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

impl Drop for EncoderPool {
    fn drop(&mut self) {
        if self.child.is_some() && self.state.is_alive() {
            tracing::warn!(pool = %self.id(), "Pool dropped while alive, killing process group");
            self.signal(PoolSignal::Kill);
            if let Some(child) = self.child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

impl std::fmt::Debug for EncoderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderPool")
            .field("pool", &self.id())
            .field("range", &self.job.range)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .field("signals_sent", &self.signals_sent)
            .finish()
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
const SIGTERM: i32 = libc::SIGTERM;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
