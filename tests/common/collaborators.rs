//! Test doubles for the executor's collaborator seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prediction_executor::error::{ExecutorError, Result};
use prediction_executor::messaging::{MessagingError, MessagingResult, TaskReceiver};
use prediction_executor::models::{
    PredictionData, SensorData, SensorDataSpec, SensorSeries, TimeRange,
};
use prediction_executor::prediction::{ClientArgs, ClientFactory, ClientHandle, MockPredictionClient};
use prediction_executor::sensor_data::SensorDataProvider;
use prediction_executor::storage::PredictionStorageProvider;

/// Fixed number of series with a fixed number of points each
pub struct FixedSensorData {
    pub series: usize,
    pub points: usize,
    pub calls: AtomicUsize,
}

impl FixedSensorData {
    pub fn new(series: usize, points: usize) -> Self {
        Self {
            series,
            points,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SensorDataProvider for FixedSensorData {
    async fn get_data_for_range(
        &self,
        _spec: &SensorDataSpec,
        time_range: &TimeRange,
    ) -> Result<SensorData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let data = (0..self.series)
            .map(|s| {
                let points = (0..self.points)
                    .map(|p| (time_range.from_time, (s * self.points + p) as f64))
                    .collect();
                SensorSeries::new(format!("tag-{s}"), points)
            })
            .collect();
        Ok(SensorData::new(*time_range, data))
    }
}

pub struct FailingSensorData;

#[async_trait]
impl SensorDataProvider for FailingSensorData {
    async fn get_data_for_range(
        &self,
        _spec: &SensorDataSpec,
        _time_range: &TimeRange,
    ) -> Result<SensorData> {
        Err(ExecutorError::collaborator(
            "sensor_data",
            "get_data_for_range",
            "historian unavailable",
        ))
    }
}

/// Records every `put_predictions` call; can be told to fail
#[derive(Default)]
pub struct RecordingStorage {
    pub calls: Mutex<Vec<PredictionData>>,
    pub fail: bool,
}

impl RecordingStorage {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn stored(&self) -> Vec<PredictionData> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PredictionStorageProvider for RecordingStorage {
    async fn put_predictions(&self, prediction_data: &PredictionData) -> Result<()> {
        self.calls.lock().push(prediction_data.clone());
        if self.fail {
            return Err(ExecutorError::collaborator(
                "storage",
                "put_predictions",
                "disk full",
            ));
        }
        Ok(())
    }
}

/// Counts constructions; optionally slow to widen race windows
#[derive(Default)]
pub struct CountingFactory {
    pub constructions: AtomicUsize,
    pub delay: Option<Duration>,
    pub seen: Mutex<Vec<ClientArgs>>,
}

impl CountingFactory {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl ClientFactory for CountingFactory {
    fn create(&self, args: &ClientArgs) -> Result<ClientHandle> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.constructions.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(args.clone());
        Ok(Arc::new(MockPredictionClient::new(
            args.project.clone(),
            vec!["model-a".to_string()],
        )))
    }
}

/// Replays a script of receive results, then reports an empty queue
#[derive(Default)]
pub struct ScriptedReceiver {
    script: Mutex<VecDeque<MessagingResult<Option<Vec<u8>>>>>,
    pub receives: AtomicUsize,
}

impl ScriptedReceiver {
    pub fn new(script: Vec<MessagingResult<Option<Vec<u8>>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            receives: AtomicUsize::new(0),
        }
    }

    pub fn transport_error() -> MessagingResult<Option<Vec<u8>>> {
        Err(MessagingError::queue_operation("tasks", "receive", "connection reset"))
    }
}

#[async_trait]
impl TaskReceiver for ScriptedReceiver {
    async fn receive_with_backoff(&self) -> MessagingResult<Option<Vec<u8>>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(Ok(None))
    }
}
