//! Run-scoped resources and their teardown

use std::sync::Arc;
use std::time::Duration;

use crate::error::BenchError;
use crate::pool::EncoderPool;
use crate::telemetry::{SamplerHandle, TelemetrySummary};
use crate::traits::GpuDevice;

/// Everything a run acquires: both pools and the sampler
///
/// [`RunScope::cleanup`] tears it all down exactly once. If the scope is
/// dropped without it (panic, cancelled future), the pools and the sampler
/// handle kill their own processes and task on drop.
pub struct RunScope {
    pub(crate) pools: Vec<EncoderPool>,
    sampler: Option<SamplerHandle>,
    device: Arc<dyn GpuDevice>,
    grace: Duration,
    poll_interval: Duration,
    reset_device: bool,
    cleaned: bool,
}

impl RunScope {
    /// Create a scope owning `pools`
    pub fn new(
        pools: Vec<EncoderPool>,
        device: Arc<dyn GpuDevice>,
        grace: Duration,
        poll_interval: Duration,
        reset_device: bool,
    ) -> Self {
        Self {
            pools,
            sampler: None,
            device,
            grace,
            poll_interval,
            reset_device,
            cleaned: false,
        }
    }

    /// Attach the running sampler
    pub fn attach_sampler(&mut self, sampler: SamplerHandle) {
        self.sampler = Some(sampler);
    }

    /// Pools owned by the scope
    pub fn pools(&self) -> &[EncoderPool] {
        &self.pools
    }

    /// Whether cleanup already ran
    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Stop the sampler, if any; idempotent
    pub async fn stop_sampler(&mut self) -> TelemetrySummary {
        match self.sampler.as_mut() {
            Some(sampler) => sampler.stop().await,
            None => TelemetrySummary::default(),
        }
    }

    /// Tear down the run
    ///
    /// Stops the sampler, terminates every non-terminal pool (graceful, then
    /// forced) and optionally resets the device. Never fails: step errors are
    /// logged and swallowed. Second and later calls do nothing.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            tracing::debug!("Cleanup already done");
            return;
        }
        self.cleaned = true;
        tracing::info!("Cleaning up");

        self.stop_sampler().await;

        for pool in &mut self.pools {
            if pool.state().is_alive() {
                let state = pool.terminate(self.grace, self.poll_interval).await;
                tracing::info!(pool = %pool.id(), %state, "Pool terminated during cleanup");
            }
        }

        if self.reset_device {
            self.reset_device().await;
        }

        tracing::info!("Cleanup complete");
    }

    async fn reset_device(&self) {
        let device = Arc::clone(&self.device);
        let result = tokio::task::spawn_blocking(move || device.reset())
            .await
            .unwrap_or_else(|e| Err(BenchError::cleanup("device reset", e.to_string())));

        match result {
            Ok(()) => tracing::info!(device = self.device.name(), "Device reset"),
            Err(e) => tracing::warn!(
                device = self.device.name(),
                error = %e,
                "Device reset failed, continuing"
            ),
        }
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        if !self.cleaned {
            tracing::warn!("Run scope dropped without cleanup, pools will kill their process groups on drop");
        }
    }
}
