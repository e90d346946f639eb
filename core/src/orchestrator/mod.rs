//! Orchestrator for capacity-run lifecycle management
//!
//! The Orchestrator coordinates one complete run:
//! - Pre-flight: partition, input check, memory admission, command building
//! - Launching both pools with a bounded stagger
//! - Polling pools against the test-duration cutoff
//! - Escalating termination (graceful, then forced) for overdue pools
//! - Stopping telemetry, analyzing outputs, and cleaning up exactly once
//!
//! # Example
//!
//! ```ignore
//! use nvenc_capacity_core::{ExternalScriptBuilder, NvidiaSmi, OrchestratorBuilder};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(config)
//!     .device(Arc::new(NvidiaSmi::new(0)))
//!     .command_builder(Arc::new(ExternalScriptBuilder::new("./encode.sh")))
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod cleanup;
mod executor;
mod progress;
mod report;

pub use builder::OrchestratorBuilder;
pub use cleanup::RunScope;
pub use executor::Orchestrator;
pub use progress::RunProgress;
pub use report::RunReport;
