//! Idle-cycle bookkeeping for the sync loop.
//!
//! Empty polls are counted silently; the first active cycle after a run of
//! idle ones emits a single summary and resets the count.

use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSummary {
    pub idle_cycles: u64,
    pub idle_duration: Duration,
}

impl IdleSummary {
    /// Idle duration in milliseconds, saturating at `u64::MAX`
    pub fn idle_millis(&self) -> u64 {
        u64::try_from(self.idle_duration.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Default)]
pub struct IdleTracker {
    idle_cycles: u64,
    idle_since: Option<Instant>,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_idle(&mut self) {
        if self.idle_cycles == 0 {
            self.idle_since = Some(Instant::now());
        }
        self.idle_cycles += 1;
    }

    /// `Some` only when at least one idle cycle preceded this active one
    pub fn record_active(&mut self) -> Option<IdleSummary> {
        if self.idle_cycles == 0 {
            return None;
        }

        let summary = IdleSummary {
            idle_cycles: self.idle_cycles,
            idle_duration: self
                .idle_since
                .take()
                .map(|since| since.elapsed())
                .unwrap_or_default(),
        };
        self.idle_cycles = 0;

        info!(
            idle_cycles = summary.idle_cycles,
            idle_ms = summary.idle_millis(),
            "Resuming after idle period"
        );
        Some(summary)
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }
}
