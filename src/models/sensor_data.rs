//! Sensor data fed into predictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::TimeRange;

/// A single sensor tag, identified by name and the asset it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorTag {
    pub name: String,
    pub asset: String,
}

impl SensorTag {
    pub fn new(name: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset: asset.into(),
        }
    }
}

/// Which tags a sensor-data fetch should cover
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDataSpec {
    pub tag_list: Vec<SensorTag>,
}

/// One named numeric series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSeries {
    pub name: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl SensorSeries {
    pub fn new(name: impl Into<String>, points: Vec<(DateTime<Utc>, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sensor readings for a time range, in series order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub time_range: TimeRange,
    pub data: Vec<SensorSeries>,
}

impl SensorData {
    pub fn new(time_range: TimeRange, data: Vec<SensorSeries>) -> Self {
        Self { time_range, data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(SensorSeries::is_empty)
    }

    pub fn point_count(&self) -> usize {
        self.data.iter().map(SensorSeries::len).sum()
    }
}

impl fmt::Display for SensorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorData({}, series={})",
            self.time_range,
            self.data.len()
        )
    }
}
