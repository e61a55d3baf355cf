//! # Sync Task Loop
//!
//! `Polling -> Processing -> Polling` until shutdown. Each iteration fetches
//! at most one payload through [`TaskReceiver::receive_with_backoff`], runs
//! the pipeline for it, and updates the idle tracker. Transport errors are
//! logged, counted and followed by a fixed sleep; the loop itself never exits
//! on a processing error.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::idle::{IdleSummary, IdleTracker};
use super::pipeline::{ExecutionPipeline, PipelineReport};
use crate::config::PollingConfig;
use crate::error::ExecutorError;
use crate::logging::log_error;
use crate::messaging::{TaskCodec, TaskReceiver};
use crate::shutdown::ShutdownSignal;

/// Loop counters, readable while the loop runs
#[derive(Debug, Default)]
pub struct LoopStats {
    pub iterations: AtomicU64,
    pub tasks_processed: AtomicU64,
    pub idle_cycles: AtomicU64,
    pub decode_failures: AtomicU64,
    pub errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatsSnapshot {
    pub iterations: u64,
    pub tasks_processed: u64,
    pub idle_cycles: u64,
    pub decode_failures: u64,
    pub errors: u64,
}

impl LoopStats {
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            idle_cycles: self.idle_cycles.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// What a single iteration did
#[derive(Debug)]
pub enum IterationOutcome {
    Processed {
        report: Box<PipelineReport>,
        idle_summary: Option<IdleSummary>,
    },
    /// The receiver returned nothing within its backoff window
    Idle,
    /// A payload arrived but was not a task; counted as idle
    DecodeFailed(ExecutorError),
    /// Receiving failed outright
    TransportError(ExecutorError),
}

impl IterationOutcome {
    /// Sleep to apply before the next iteration
    fn pause(&self, polling: &PollingConfig) -> Option<Duration> {
        match self {
            Self::Processed { .. } => None,
            Self::Idle | Self::DecodeFailed(_) => Some(polling.idle_sleep()),
            Self::TransportError(_) => Some(polling.error_sleep()),
        }
    }
}

pub struct TaskLoop {
    name: String,
    receiver: Arc<dyn TaskReceiver>,
    pipeline: ExecutionPipeline,
    polling: PollingConfig,
    idle: IdleTracker,
    stats: Arc<LoopStats>,
}

impl TaskLoop {
    pub fn new(
        name: impl Into<String>,
        receiver: Arc<dyn TaskReceiver>,
        pipeline: ExecutionPipeline,
        polling: PollingConfig,
    ) -> Self {
        Self {
            name: name.into(),
            receiver,
            pipeline,
            polling,
            idle: IdleTracker::new(),
            stats: Arc::new(LoopStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        Arc::clone(&self.stats)
    }

    /// One fetch-process cycle, without the trailing sleep
    pub async fn run_once(&mut self) -> IterationOutcome {
        self.stats.iterations.fetch_add(1, Ordering::Relaxed);

        let payload = match self.receiver.receive_with_backoff().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.record_idle();
                return IterationOutcome::Idle;
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                let e = ExecutorError::from(e);
                log_error("task_loop", "receive_with_backoff", &e.chain(), Some(&self.name));
                return IterationOutcome::TransportError(e);
            }
        };

        let task = match TaskCodec::decode(&payload) {
            Ok(task) => task,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                let e = ExecutorError::from(e);
                warn!(executor = %self.name, error = %e.chain(), "Dropping undecodable payload");
                self.record_idle();
                return IterationOutcome::DecodeFailed(e);
            }
        };

        let report = self.pipeline.run(&task).await;
        self.stats.tasks_processed.fetch_add(1, Ordering::Relaxed);
        let idle_summary = self.idle.record_active();

        IterationOutcome::Processed {
            report: Box::new(report),
            idle_summary,
        }
    }

    /// Run until `shutdown` is triggered. Shutdown is checked between
    /// iterations; an in-flight task always finishes.
    pub async fn run(&mut self, shutdown: ShutdownSignal) -> LoopStatsSnapshot {
        info!(executor = %self.name, "▶️ Starting sync task loop");

        while !shutdown.is_triggered() {
            let outcome = self.run_once().await;

            if let Some(pause) = outcome.pause(&self.polling) {
                tokio::select! {
                    _ = shutdown.triggered() => {}
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        let stats = self.stats.snapshot();
        info!(
            executor = %self.name,
            iterations = stats.iterations,
            tasks_processed = stats.tasks_processed,
            idle_cycles = stats.idle_cycles,
            decode_failures = stats.decode_failures,
            errors = stats.errors,
            "⏹️ Sync task loop stopped"
        );
        stats
    }

    fn record_idle(&mut self) {
        self.stats.idle_cycles.fetch_add(1, Ordering::Relaxed);
        self.idle.record_idle();
        debug!(executor = %self.name, idle_cycles = self.idle.idle_cycles(), "No task available");
    }
}
