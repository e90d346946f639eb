//! Builder pattern for Orchestrator construction

use std::sync::Arc;
use std::time::Duration;

use crate::config::{TestConfig, TimingConfig};
use crate::error::{BenchError, BenchResult};
use crate::traits::{CommandBuilder, GpuDevice};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .streams_per_pool(50)
///     .duration(Duration::from_secs(60))
///     .device(Arc::new(NvidiaSmi::new(0)))
///     .command_builder(Arc::new(ExternalScriptBuilder::new("./encode.sh")))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: TestConfig,
    device: Option<Arc<dyn GpuDevice>>,
    command_builder: Option<Arc<dyn CommandBuilder>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: TestConfig::default(),
            device: None,
            command_builder: None,
        }
    }

    /// Set the full test configuration
    pub fn config(mut self, config: TestConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the streams per pool
    pub fn streams_per_pool(mut self, streams: u32) -> Self {
        self.config.streams_per_pool = streams;
        self
    }

    /// Set the test duration
    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration_secs = duration.as_secs();
        self
    }

    /// Set the supervision timings
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    /// Set the device under test
    pub fn device(mut self, device: Arc<dyn GpuDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the pipeline command builder
    pub fn command_builder(mut self, builder: Arc<dyn CommandBuilder>) -> Self {
        self.command_builder = Some(builder);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the device or command builder are not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let device = self
            .device
            .ok_or_else(|| BenchError::missing_config("device"))?;

        let command_builder = self
            .command_builder
            .ok_or_else(|| BenchError::missing_config("command_builder"))?;

        self.config
            .validate()
            .map_err(|e| BenchError::config(e.to_string()))?;

        Ok(Orchestrator::new(self.config, device, command_builder))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
