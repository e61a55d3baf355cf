//! Prediction results produced by the backend and handed to storage.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::TimeRange;

/// One result table from the backend, e.g. the anomaly output of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSeries {
    pub series_name: String,
    /// Row-major values; each row has one value per column label
    pub table: Vec<Vec<f64>>,
    pub column_labels: Vec<String>,
}

impl PredictionSeries {
    pub fn new(
        series_name: impl Into<String>,
        table: Vec<Vec<f64>>,
        column_labels: Vec<String>,
    ) -> Self {
        Self {
            series_name: series_name.into(),
            table,
            column_labels,
        }
    }

    pub fn row_count(&self) -> usize {
        self.table.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionData {
    pub name: String,
    pub time_range: TimeRange,
    pub data: Vec<PredictionSeries>,
}

impl PredictionData {
    pub fn new(name: impl Into<String>, time_range: TimeRange, data: Vec<PredictionSeries>) -> Self {
        Self {
            name: name.into(),
            time_range,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for PredictionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PredictionData({}, {}, result={})",
            self.name,
            self.time_range,
            self.data.len()
        )
    }
}
