//! # Sensor Data Providers
//!
//! Source of the input series a prediction runs over. Physical retrieval is
//! out of scope for this crate; the providers here are synthetic.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

use crate::config::{SensorDataConfig, SensorDataKind};
use crate::error::Result;
use crate::models::{SensorData, SensorDataSpec, SensorSeries, SensorTag, TimeRange};

#[async_trait]
pub trait SensorDataProvider: Send + Sync {
    async fn get_data_for_range(
        &self,
        spec: &SensorDataSpec,
        time_range: &TimeRange,
    ) -> Result<SensorData>;
}

/// Build the configured provider
pub fn build_provider(config: &SensorDataConfig) -> Arc<dyn SensorDataProvider> {
    match config.kind {
        SensorDataKind::Mock => Arc::new(MockSensorDataProvider::from_config(config)),
        SensorDataKind::Empty => Arc::new(EmptySensorDataProvider),
    }
}

/// Deterministic synthetic readings spread evenly across the range
#[derive(Debug, Clone)]
pub struct MockSensorDataProvider {
    tags: Vec<SensorTag>,
    points_per_series: usize,
}

impl MockSensorDataProvider {
    pub fn new(tags: Vec<SensorTag>, points_per_series: usize) -> Self {
        Self {
            tags,
            points_per_series: points_per_series.max(1),
        }
    }

    pub fn from_config(config: &SensorDataConfig) -> Self {
        let tags = if config.tags.is_empty() {
            (0..config.series_count)
                .map(|i| SensorTag::new(format!("mock-tag-{i}"), "mock-asset"))
                .collect()
        } else {
            config.tags.clone()
        };
        Self::new(tags, config.points_per_series)
    }
}

#[async_trait]
impl SensorDataProvider for MockSensorDataProvider {
    /// Uses the requested tags when given, otherwise the configured ones
    async fn get_data_for_range(
        &self,
        spec: &SensorDataSpec,
        time_range: &TimeRange,
    ) -> Result<SensorData> {
        let tags = if spec.tag_list.is_empty() {
            &self.tags
        } else {
            &spec.tag_list
        };

        let span_ms = time_range.duration().num_milliseconds().max(0);
        let step_ms = span_ms / self.points_per_series as i64;

        let data = tags
            .iter()
            .enumerate()
            .map(|(index, tag)| {
                let points = (0..self.points_per_series)
                    .map(|i| {
                        let at = time_range.from_time + Duration::milliseconds(step_ms * i as i64);
                        let value = ((at.timestamp() as f64 / 600.0) + index as f64).cos();
                        (at, value)
                    })
                    .collect();
                SensorSeries::new(tag.name.clone(), points)
            })
            .collect();

        Ok(SensorData::new(*time_range, data))
    }
}

/// Returns sensor data without any series
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySensorDataProvider;

#[async_trait]
impl SensorDataProvider for EmptySensorDataProvider {
    async fn get_data_for_range(
        &self,
        _spec: &SensorDataSpec,
        time_range: &TimeRange,
    ) -> Result<SensorData> {
        Ok(SensorData::new(*time_range, Vec::new()))
    }
}
