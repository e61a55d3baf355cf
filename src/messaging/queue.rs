//! # Task Queue Seams
//!
//! The executor consumes tasks through one of two transport shapes:
//!
//! - **pull** ([`TaskReceiver`]): the sync loop asks for one payload at a time;
//!   the receiver does its own bounded backoff and answers with a payload or
//!   nothing.
//! - **push** ([`TaskSubscription`]): the transport delivers payloads to a
//!   [`PayloadHandler`], possibly concurrently, until shutdown.

use async_trait::async_trait;
use std::sync::Arc;

use super::errors::MessagingResult;
use crate::shutdown::ShutdownSignal;

#[async_trait]
pub trait TaskReceiver: Send + Sync {
    /// Wait (bounded) for the next payload. `Ok(None)` means the queue stayed
    /// empty for the whole backoff window.
    async fn receive_with_backoff(&self) -> MessagingResult<Option<Vec<u8>>>;
}

/// Callback invoked once per delivered payload
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>);
}

#[async_trait]
pub trait TaskSubscription: Send + Sync {
    /// Deliver payloads to `handler` until `shutdown` fires. Returns only
    /// after every in-flight handler invocation has completed.
    async fn consume(
        &self,
        handler: Arc<dyn PayloadHandler>,
        shutdown: ShutdownSignal,
    ) -> MessagingResult<()>;
}
