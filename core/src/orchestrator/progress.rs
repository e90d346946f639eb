//! Elapsed-vs-cutoff progress reporting

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::pool::{EncoderPool, PoolState};

/// Terminal progress bar plus the periodic elapsed/remaining log line
pub struct RunProgress {
    bar: ProgressBar,
    cutoff: Duration,
}

impl RunProgress {
    /// Progress over `cutoff`; hidden unless `visible`
    pub fn new(cutoff: Duration, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(cutoff.as_secs().max(1))
        } else {
            ProgressBar::hidden()
        };

        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}s {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }

        Self { bar, cutoff }
    }

    /// Advance the bar to `elapsed`
    pub fn tick(&self, elapsed: Duration) {
        self.bar.set_position(elapsed.as_secs().min(self.cutoff.as_secs()));
    }

    /// Log elapsed/remaining time and pool states
    pub fn report(&self, elapsed: Duration, pools: &[EncoderPool]) {
        let remaining = self.cutoff.saturating_sub(elapsed);
        let states = describe_states(pools);
        self.bar.set_message(states.clone());

        tracing::info!(
            elapsed_secs = elapsed.as_secs(),
            remaining_secs = remaining.as_secs(),
            pools = %states,
            "Test in progress"
        );
    }

    /// Finish the bar with a closing message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

fn describe_states(pools: &[EncoderPool]) -> String {
    pools
        .iter()
        .map(|p| format!("{}={}", p.id(), short_state(p.state())))
        .collect::<Vec<_>>()
        .join(" ")
}

fn short_state(state: PoolState) -> &'static str {
    match state {
        PoolState::Pending => "pending",
        PoolState::Running => "running",
        PoolState::TimedOut => "stopping",
        PoolState::Completed => "done",
        PoolState::Failed => "failed",
        PoolState::Killed => "killed",
    }
}
