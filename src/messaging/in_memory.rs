//! # In-Memory Task Queue
//!
//! Process-local queue implementing both transport shapes. Used as the
//! default queue variant and throughout the tests.
//!
//! ## Usage
//!
//! ```rust
//! use prediction_executor::config::ReceiveBackoffConfig;
//! use prediction_executor::messaging::InMemoryTaskQueue;
//!
//! let queue = InMemoryTaskQueue::new("tasks", ReceiveBackoffConfig::default());
//! queue.send(b"payload".to_vec()).unwrap();
//! assert_eq!(queue.len(), 1);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::codec::TaskCodec;
use super::errors::{MessagingError, MessagingResult};
use super::queue::{PayloadHandler, TaskReceiver, TaskSubscription};
use crate::config::{QueueConfig, ReceiveBackoffConfig};
use crate::models::Task;
use crate::shutdown::ShutdownSignal;

const MEMORY_SCHEME: &str = "memory";
const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// Message wrapper for in-memory storage with metadata
#[derive(Debug, Clone)]
pub struct InMemoryMessage {
    pub id: i64,
    pub payload: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct InMemoryTaskQueue {
    queue_name: String,
    messages: Mutex<VecDeque<InMemoryMessage>>,
    next_id: AtomicI64,
    capacity: usize,
    max_message_bytes: usize,
    backoff: ReceiveBackoffConfig,
    closed: AtomicBool,
    available: Notify,
}

impl InMemoryTaskQueue {
    pub fn new(queue_name: impl Into<String>, backoff: ReceiveBackoffConfig) -> Self {
        Self {
            queue_name: queue_name.into(),
            messages: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
            capacity: DEFAULT_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            backoff,
            closed: AtomicBool::new(false),
            available: Notify::new(),
        }
    }

    /// Build a queue from a `memory://<queue_name>` connection string
    pub fn from_config(config: &QueueConfig) -> MessagingResult<Self> {
        let connection_string = config
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                MessagingError::configuration("queue", "No connection string specified")
            })?;

        let parsed = url::Url::parse(connection_string).map_err(|e| {
            MessagingError::configuration("queue", format!("Invalid connection string: {e}"))
        })?;
        if parsed.scheme() != MEMORY_SCHEME {
            return Err(MessagingError::configuration(
                "queue",
                format!(
                    "Unsupported queue scheme '{}', expected '{MEMORY_SCHEME}'",
                    parsed.scheme()
                ),
            ));
        }
        let queue_name = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .unwrap_or("tasks")
            .to_string();

        Ok(Self::new(queue_name, config.receive_backoff.clone())
            .with_limits(config.capacity, config.max_message_bytes))
    }

    pub fn with_limits(mut self, capacity: usize, max_message_bytes: usize) -> Self {
        self.capacity = capacity;
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn send(&self, payload: Vec<u8>) -> MessagingResult<i64> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::queue_closed(&self.queue_name));
        }
        if payload.len() > self.max_message_bytes {
            return Err(MessagingError::MessageTooLarge {
                size_bytes: payload.len(),
                limit_bytes: self.max_message_bytes,
            });
        }

        let message_id = {
            let mut messages = self.messages.lock();
            if messages.len() >= self.capacity {
                return Err(MessagingError::QueueCapacityExceeded {
                    queue_name: self.queue_name.clone(),
                    current_count: messages.len(),
                    limit_count: self.capacity,
                });
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            messages.push_back(InMemoryMessage {
                id,
                payload,
                enqueued_at: Utc::now(),
            });
            id
        };

        self.available.notify_one();
        debug!(queue = %self.queue_name, message_id, "📤 Message enqueued");
        Ok(message_id)
    }

    pub fn send_task(&self, task: &Task) -> MessagingResult<i64> {
        let payload = TaskCodec::encode(task)?;
        self.send(payload)
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Stop accepting messages. Remaining messages can still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_waiters();
        info!(queue = %self.queue_name, "Queue closed");
    }

    fn pop(&self) -> Option<InMemoryMessage> {
        self.messages.lock().pop_front()
    }

    /// Wait until a message is available; `None` once closed and drained
    async fn next_message(&self) -> Option<InMemoryMessage> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.pop() {
                return Some(message);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TaskReceiver for InMemoryTaskQueue {
    async fn receive_with_backoff(&self) -> MessagingResult<Option<Vec<u8>>> {
        let attempts = self.backoff.max_attempts.max(1);

        for attempt in 0..attempts {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.pop() {
                debug!(
                    queue = %self.queue_name,
                    message_id = message.id,
                    attempt,
                    "📥 Received message"
                );
                return Ok(Some(message.payload));
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(MessagingError::queue_closed(&self.queue_name));
            }

            // Wake early if something is enqueued during the backoff delay
            let delay = self.backoff.delay_for_attempt(attempt);
            let _ = tokio::time::timeout(delay, notified).await;
        }

        Ok(self.pop().map(|message| message.payload))
    }
}

#[async_trait]
impl TaskSubscription for InMemoryTaskQueue {
    async fn consume(
        &self,
        handler: Arc<dyn PayloadHandler>,
        shutdown: ShutdownSignal,
    ) -> MessagingResult<()> {
        info!(queue = %self.queue_name, "Starting in-memory subscription");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!(queue = %self.queue_name, "Subscription received shutdown signal");
                    break;
                }
                message = self.next_message() => match message {
                    Some(message) => {
                        let handler = Arc::clone(&handler);
                        in_flight.spawn(async move { handler.handle(message.payload).await });
                    }
                    None => {
                        warn!(queue = %self.queue_name, "Queue closed, ending subscription");
                        break;
                    }
                },
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    error!(queue = %self.queue_name, error = %e, "Payload handler panicked");
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            debug!(queue = %self.queue_name, pending, "Waiting for in-flight handlers");
        }
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!(queue = %self.queue_name, error = %e, "Payload handler panicked");
            }
        }

        info!(queue = %self.queue_name, "Subscription stopped");
        Ok(())
    }
}
