//! # Execution Pipeline
//!
//! One best-effort pass over a task:
//!
//! 1. **FetchSensorData**: sensor readings for the task's time range
//! 2. **ExecutePrediction**: run the configured backend over them
//! 3. **StorePrediction**: hand the result to storage
//!
//! Each stage contains its own failures and reports a [`StageOutcome`]. All
//! three stages run for every task; a stage whose input is missing either
//! fails with `InvalidInput` (prediction) or is skipped (storage). Nothing is
//! retried here; a task gets exactly one attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::ExecutorError;
use crate::logging::log_task_operation;
use crate::models::{PredictionData, SensorData, SensorDataSpec, Task};
use crate::prediction::PredictionExecutionProvider;
use crate::sensor_data::SensorDataProvider;
use crate::storage::PredictionStorageProvider;

/// Result of one pipeline stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    /// The stage had nothing to do
    Skipped,
    Failed(ExecutorError),
}

impl<T> StageOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ExecutorError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of every stage for one task
#[derive(Debug)]
pub struct PipelineReport {
    pub task: Task,
    pub sensor_data: StageOutcome<SensorData>,
    pub prediction: StageOutcome<PredictionData>,
    pub storage: StageOutcome<()>,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// A prediction was produced and stored
    pub fn is_success(&self) -> bool {
        self.storage.is_completed()
    }

    pub fn failures(&self) -> Vec<(&'static str, &ExecutorError)> {
        [
            ("fetch_sensor_data", self.sensor_data.error()),
            ("execute_prediction", self.prediction.error()),
            ("store_prediction", self.storage.error()),
        ]
        .into_iter()
        .filter_map(|(stage, error)| error.map(|e| (stage, e)))
        .collect()
    }
}

#[derive(Clone)]
pub struct ExecutionPipeline {
    sensor_data: Arc<dyn SensorDataProvider>,
    predictor: Arc<dyn PredictionExecutionProvider>,
    storage: Arc<dyn PredictionStorageProvider>,
    sensor_spec: SensorDataSpec,
}

impl std::fmt::Debug for ExecutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPipeline")
            .field("sensor_spec", &self.sensor_spec)
            .finish_non_exhaustive()
    }
}

impl ExecutionPipeline {
    pub fn new(
        sensor_data: Arc<dyn SensorDataProvider>,
        predictor: Arc<dyn PredictionExecutionProvider>,
        storage: Arc<dyn PredictionStorageProvider>,
    ) -> Self {
        Self {
            sensor_data,
            predictor,
            storage,
            sensor_spec: SensorDataSpec::default(),
        }
    }

    pub fn with_sensor_spec(mut self, sensor_spec: SensorDataSpec) -> Self {
        self.sensor_spec = sensor_spec;
        self
    }

    pub fn storage(&self) -> &Arc<dyn PredictionStorageProvider> {
        &self.storage
    }

    /// Run all three stages for `task`
    pub async fn run(&self, task: &Task) -> PipelineReport {
        let started = Instant::now();
        info!(task = %task, "🚀 Processing task");

        let sensor_data = self.fetch_sensor_data(task).await;
        let prediction = self.execute_prediction(task, sensor_data.value()).await;
        let storage = self.store_prediction(task, prediction.value()).await;

        let report = PipelineReport {
            task: task.clone(),
            sensor_data,
            prediction,
            storage,
            elapsed: started.elapsed(),
        };

        log_task_operation(
            "pipeline",
            Some(&task.project_name),
            Some(&task.model_name),
            if report.is_success() { "stored" } else { "incomplete" },
            Some(&format!(
                "sensor_data={} prediction={} storage={} elapsed_ms={}",
                report.sensor_data.label(),
                report.prediction.label(),
                report.storage.label(),
                report.elapsed.as_millis()
            )),
        );
        report
    }

    pub async fn fetch_sensor_data(&self, task: &Task) -> StageOutcome<SensorData> {
        let time_range = task.time_range();
        match self
            .sensor_data
            .get_data_for_range(&self.sensor_spec, &time_range)
            .await
        {
            Ok(data) => {
                debug!(task = %task, sensor_data = %data, points = data.point_count(), "Fetched sensor data");
                StageOutcome::Completed(data)
            }
            Err(e) => {
                let e = as_collaborator_failure(e, "sensor_data", "get_data_for_range");
                error!(task = %task, stage = "fetch_sensor_data", error = %e.chain(), "Could not fetch sensor data");
                StageOutcome::Failed(e)
            }
        }
    }

    pub async fn execute_prediction(
        &self,
        task: &Task,
        sensor_data: Option<&SensorData>,
    ) -> StageOutcome<PredictionData> {
        let sensor_data = match Self::check_preconditions(task, sensor_data) {
            Ok(sensor_data) => sensor_data,
            Err(e) => {
                warn!(task = %task, stage = "execute_prediction", error = %e, "Prediction preconditions not met");
                return StageOutcome::Failed(e);
            }
        };

        match self.predictor.execute_prediction(task, sensor_data).await {
            Ok(prediction) => {
                debug!(task = %task, prediction = %prediction, "Prediction executed");
                StageOutcome::Completed(prediction)
            }
            Err(e) => {
                error!(
                    task = %task,
                    stage = "execute_prediction",
                    kind = e.kind(),
                    error = %e.chain(),
                    "Could not execute prediction"
                );
                StageOutcome::Failed(e)
            }
        }
    }

    /// Storage is not called at all when there is nothing to store
    pub async fn store_prediction(
        &self,
        task: &Task,
        prediction: Option<&PredictionData>,
    ) -> StageOutcome<()> {
        let Some(prediction) = prediction else {
            debug!(task = %task, "No prediction to store");
            return StageOutcome::Skipped;
        };

        match self.storage.put_predictions(prediction).await {
            Ok(()) => {
                debug!(task = %task, prediction = %prediction, "Prediction stored");
                StageOutcome::Completed(())
            }
            Err(e) => {
                let e = as_collaborator_failure(e, "storage", "put_predictions");
                error!(task = %task, stage = "store_prediction", error = %e.chain(), "Could not store prediction data");
                StageOutcome::Failed(e)
            }
        }
    }

    fn check_preconditions<'a>(
        task: &Task,
        sensor_data: Option<&'a SensorData>,
    ) -> Result<&'a SensorData, ExecutorError> {
        if task.project_name.trim().is_empty() {
            return Err(ExecutorError::invalid_input(
                "execute_prediction",
                "project_name is empty",
            ));
        }
        if task.model_name.trim().is_empty() {
            return Err(ExecutorError::invalid_input(
                "execute_prediction",
                "model_name is empty",
            ));
        }
        sensor_data.ok_or_else(|| {
            ExecutorError::invalid_input("execute_prediction", "no sensor data available")
        })
    }
}

fn as_collaborator_failure(
    error: ExecutorError,
    collaborator: &str,
    operation: &str,
) -> ExecutorError {
    match error {
        ExecutorError::CollaboratorFailure { .. } => error,
        other => ExecutorError::collaborator(collaborator, operation, other.chain()),
    }
}
