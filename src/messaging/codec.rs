//! # Task Codec
//!
//! Tasks travel through the queue as opaque byte payloads. The wire form is
//! the JSON encoding of [`Task`] with RFC 3339 timestamps.

use thiserror::Error;

use crate::models::Task;

/// A payload that could not be turned back into a [`Task`]
#[derive(Error, Debug)]
#[error("Could not decode task payload of {payload_len} bytes")]
pub struct DecodeError {
    pub payload_len: usize,
    #[source]
    source: serde_json::Error,
}

impl DecodeError {
    pub fn cause(&self) -> &serde_json::Error {
        &self.source
    }
}

pub struct TaskCodec;

impl TaskCodec {
    pub fn encode(task: &Task) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(task)
    }

    /// Decode a payload. Pure: never panics, never touches shared state.
    pub fn decode(payload: &[u8]) -> Result<Task, DecodeError> {
        serde_json::from_slice(payload).map_err(|source| DecodeError {
            payload_len: payload.len(),
            source,
        })
    }
}
