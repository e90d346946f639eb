//! Process-level tests for encoder pools, driven by `/bin/sh` scripts

use super::*;
use crate::partition::{partition, InputPattern, PoolId, StreamJob};
use crate::pipeline::PipelineCommand;

use std::path::Path;
use std::time::{Duration, Instant};

// ============================================================================
// Helpers
// ============================================================================

fn job(dir: &Path) -> StreamJob {
    let [first, _] = partition(2, dir, &InputPattern::default(), &dir.join("output")).unwrap();
    first
}

fn sh(script: &str) -> PipelineCommand {
    PipelineCommand::new("/bin/sh").args(["-c", script])
}

async fn wait_terminal(pool: &mut EncoderPool, limit: Duration) -> PoolState {
    let deadline = Instant::now() + limit;
    while !pool.poll().is_terminal() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.state()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_successful_exit_completes() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs/nvenc1_process.log");
    let mut pool = EncoderPool::new(job(dir.path()), &log);
    assert_eq!(pool.state(), PoolState::Pending);

    pool.launch(&sh("echo frame=100 speed=1.2x; echo oops >&2")).unwrap();
    assert!(pool.pid().is_some());

    assert_eq!(wait_terminal(&mut pool, Duration::from_secs(5)).await, PoolState::Completed);

    let outcome = pool.outcome();
    assert_eq!(outcome.pool, PoolId::Nvenc1);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.signals_sent.is_empty());
    assert!(outcome.succeeded());

    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("speed=1.2x"));
    assert!(content.contains("oops"));
}

#[tokio::test]
async fn test_non_zero_exit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));

    pool.launch(&sh("exit 3")).unwrap();
    assert_eq!(wait_terminal(&mut pool, Duration::from_secs(5)).await, PoolState::Failed);

    let outcome = pool.outcome();
    assert_eq!(outcome.exit_code, Some(3));
    assert!(outcome.error.unwrap().contains("exit code 3"));
}

#[tokio::test]
async fn test_spawn_failure_is_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));

    let err = pool
        .launch(&PipelineCommand::new("/nonexistent/pipeline"))
        .unwrap_err();
    assert!(matches!(err, crate::BenchError::PipelineLaunchFailed { pool: PoolId::Nvenc1, .. }));
    assert_eq!(pool.state(), PoolState::Failed);
    assert!(pool.pid().is_none());

    // A failed pool cannot be relaunched
    assert!(pool.launch(&sh("true")).is_err());
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_graceful_termination_completes() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));
    pool.launch(&sh("sleep 30")).unwrap();

    assert!(pool.begin_termination());
    assert_eq!(pool.state(), PoolState::TimedOut);

    let state = pool
        .terminate(Duration::from_secs(5), Duration::from_millis(10))
        .await;
    assert_eq!(state, PoolState::Completed);
    assert_eq!(pool.signals_sent(), &[PoolSignal::Terminate]);
    assert!(pool.outcome().timed_out);
}

#[tokio::test]
async fn test_ignored_termination_escalates_to_kill() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));
    pool.launch(&sh("trap '' TERM; sleep 30")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let state = pool
        .terminate(Duration::from_millis(300), Duration::from_millis(10))
        .await;

    assert_eq!(state, PoolState::Killed);
    assert_eq!(pool.signals_sent(), &[PoolSignal::Terminate, PoolSignal::Kill]);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(pool.outcome().error.unwrap().contains("force-killed"));
}

#[tokio::test]
async fn test_terminal_pool_is_never_signalled() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));
    pool.launch(&sh("true")).unwrap();
    wait_terminal(&mut pool, Duration::from_secs(5)).await;

    assert!(!pool.begin_termination());
    pool.terminate(Duration::from_millis(50), Duration::from_millis(10))
        .await;
    pool.terminate(Duration::from_millis(50), Duration::from_millis(10))
        .await;

    assert_eq!(pool.state(), PoolState::Completed);
    assert!(pool.signals_sent().is_empty());
}

#[tokio::test]
async fn test_pending_pool_terminate_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let mut pool = EncoderPool::new(job(dir.path()), dir.path().join("p.log"));

    let state = pool
        .terminate(Duration::from_millis(50), Duration::from_millis(10))
        .await;
    assert_eq!(state, PoolState::Pending);
    assert!(pool.signals_sent().is_empty());
    assert_eq!(pool.outcome().runtime_secs, None);
}
