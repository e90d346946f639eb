//! Encoder pools
//!
//! An [`EncoderPool`] owns one pipeline process and walks it through the
//! [`PoolState`] machine. Pools never observe each other: the orchestrator
//! polls both and decides when to escalate termination.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = EncoderPool::new(job, "logs/nvenc1_process.log");
//! pool.launch(&command)?;
//! while !pool.poll().is_terminal() {
//!     tokio::time::sleep(Duration::from_millis(500)).await;
//! }
//! println!("{}", pool.outcome().state);
//! ```

mod executor;
mod outcome;
mod state;

pub use executor::EncoderPool;
pub use outcome::PoolOutcome;
pub use state::{PoolSignal, PoolState};

#[cfg(all(test, unix))]
mod tests;
