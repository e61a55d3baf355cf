//! # Task Model
//!
//! A task names one unit of work: "produce predictions for `model_name` in
//! `project_name` over `[from_time, to_time)`". Tasks are created by an
//! upstream scheduler, arrive as queue payloads, and are processed at most
//! once by this worker. They are never persisted here.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ExecutorError, Result};

/// Unit of prediction work received from the task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub project_name: String,
    pub model_name: String,
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
}

impl Task {
    pub fn new(
        project_name: impl Into<String>,
        model_name: impl Into<String>,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            model_name: model_name.into(),
            from_time,
            to_time,
        }
    }

    /// The half-open interval this task covers
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.from_time, self.to_time)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task({}/{}, {})",
            self.project_name,
            self.model_name,
            self.time_range()
        )
    }
}

/// Half-open time interval `[from_time, to_time)`
///
/// Ordering of the bounds is not enforced on construction; callers that care
/// use [`TimeRange::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from_time: DateTime<Utc>, to_time: DateTime<Utc>) -> Self {
        Self { from_time, to_time }
    }

    pub fn validate(&self) -> Result<()> {
        if self.from_time > self.to_time {
            return Err(ExecutorError::invalid_input(
                "time_range",
                format!("from_time {} is after to_time {}", self.from_time, self.to_time),
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> chrono::Duration {
        self.to_time - self.from_time
    }

    pub fn is_empty(&self) -> bool {
        self.from_time >= self.to_time
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from_time <= instant && instant < self.to_time
    }

    pub fn rfc3339_from(&self) -> String {
        self.from_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn rfc3339_to(&self) -> String {
        self.to_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeRange({} -> {})", self.from_time, self.to_time)
    }
}
