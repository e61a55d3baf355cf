//! # Async Event Loop
//!
//! Push-driven alternative to the sync loop. The subscription delivers raw
//! payloads to [`TaskPayloadHandler`], possibly concurrently; every decoded
//! task gets one pipeline pass. Payloads that are not tasks follow the
//! configured [`NonTaskPayloadPolicy`].

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::pipeline::ExecutionPipeline;
use crate::config::NonTaskPayloadPolicy;
use crate::error::{ExecutorError, Result};
use crate::messaging::{PayloadHandler, TaskCodec, TaskSubscription};
use crate::models::{PredictionData, PredictionSeries, TimeRange};
use crate::shutdown::ShutdownSignal;

pub const DEGRADED_PREDICTION_NAME: &str = "unparsed-payload";
pub const DEGRADED_SERIES_NAME: &str = "raw_payload";

#[derive(Debug, Default)]
pub struct EventLoopStats {
    pub received: AtomicU64,
    pub tasks_processed: AtomicU64,
    pub rejected: AtomicU64,
    pub degraded: AtomicU64,
}

impl EventLoopStats {
    pub fn get_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn get_tasks_processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Relaxed)
    }

    pub fn get_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn get_degraded(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }
}

/// Degraded record for a payload that could not be decoded as a task
pub fn degraded_prediction(payload: &[u8]) -> PredictionData {
    let now = Utc::now();
    PredictionData::new(
        DEGRADED_PREDICTION_NAME,
        TimeRange::new(now, now),
        vec![PredictionSeries::new(
            DEGRADED_SERIES_NAME,
            Vec::new(),
            vec![String::from_utf8_lossy(payload).into_owned()],
        )],
    )
}

pub struct TaskPayloadHandler {
    pipeline: ExecutionPipeline,
    policy: NonTaskPayloadPolicy,
    stats: Arc<EventLoopStats>,
}

impl TaskPayloadHandler {
    pub fn new(pipeline: ExecutionPipeline, policy: NonTaskPayloadPolicy) -> Self {
        Self {
            pipeline,
            policy,
            stats: Arc::new(EventLoopStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<EventLoopStats> {
        Arc::clone(&self.stats)
    }

    async fn handle_non_task(&self, payload: &[u8], cause: ExecutorError) -> Result<()> {
        match self.policy {
            NonTaskPayloadPolicy::Reject => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %cause.chain(), "Rejecting non-task payload");
                Ok(())
            }
            NonTaskPayloadPolicy::Degraded => {
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                warn!(error = %cause.chain(), "Storing non-task payload as degraded prediction");
                self.pipeline
                    .storage()
                    .put_predictions(&degraded_prediction(payload))
                    .await
            }
        }
    }
}

#[async_trait]
impl PayloadHandler for TaskPayloadHandler {
    async fn handle(&self, payload: Vec<u8>) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        match TaskCodec::decode(&payload) {
            Ok(task) => {
                self.pipeline.run(&task).await;
                self.stats.tasks_processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                if let Err(store_error) = self.handle_non_task(&payload, e.into()).await {
                    error!(error = %store_error.chain(), "Could not store degraded prediction");
                }
            }
        }
    }
}

pub struct EventLoop {
    name: String,
    subscription: Arc<dyn TaskSubscription>,
    handler: Arc<TaskPayloadHandler>,
}

impl EventLoop {
    pub fn new(
        name: impl Into<String>,
        subscription: Arc<dyn TaskSubscription>,
        pipeline: ExecutionPipeline,
        policy: NonTaskPayloadPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            subscription,
            handler: Arc::new(TaskPayloadHandler::new(pipeline, policy)),
        }
    }

    pub fn stats(&self) -> Arc<EventLoopStats> {
        self.handler.stats()
    }

    /// Consume until shutdown; returns after in-flight handlers finish
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<()> {
        info!(executor = %self.name, "▶️ Starting async event loop");

        let handler: Arc<dyn PayloadHandler> = self.handler.clone();
        self.subscription.consume(handler, shutdown).await?;

        let stats = self.stats();
        info!(
            executor = %self.name,
            received = stats.get_received(),
            tasks_processed = stats.get_tasks_processed(),
            rejected = stats.get_rejected(),
            degraded = stats.get_degraded(),
            "⏹️ Async event loop stopped"
        );
        Ok(())
    }
}
