//! # Messaging Module
//!
//! Queue-facing side of the executor: the task wire codec, the pull/push
//! transport traits, and the in-memory queue implementation.

pub mod codec;
pub mod errors;
pub mod in_memory;
pub mod queue;

pub use codec::{DecodeError, TaskCodec};
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::{InMemoryMessage, InMemoryTaskQueue};
pub use queue::{PayloadHandler, TaskReceiver, TaskSubscription};
