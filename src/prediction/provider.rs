//! Prediction execution providers selectable through `predictor.type`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::registry::ClientRegistry;
use super::PredictionExecutionProvider;
use crate::error::{ExecutorError, Result};
use crate::models::{PredictionData, SensorData, Task};

/// Runs predictions through the project's registered client
///
/// Used for both the model-server and the mock backends; only the registry's
/// client factory differs.
#[derive(Debug, Clone)]
pub struct RegistryPredictionProvider {
    registry: Arc<ClientRegistry>,
}

impl RegistryPredictionProvider {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }
}

#[async_trait]
impl PredictionExecutionProvider for RegistryPredictionProvider {
    async fn execute_prediction(
        &self,
        task: &Task,
        sensor_data: &SensorData,
    ) -> Result<PredictionData> {
        let client = self.registry.lookup_by_project(&task.project_name)?;
        let time_range = sensor_data.time_range;

        debug!(
            project = %task.project_name,
            model = %task.model_name,
            range = %time_range,
            "Executing prediction"
        );

        let result = client
            .predict(time_range.from_time, time_range.to_time)
            .await
            .map_err(|e| match e {
                ExecutorError::CollaboratorFailure { .. } => e,
                other => ExecutorError::collaborator("prediction_client", "predict", other.to_string()),
            })?;

        if result.is_empty() {
            return Err(ExecutorError::empty_result(
                &task.project_name,
                &task.model_name,
            ));
        }

        Ok(PredictionData::new(&task.model_name, time_range, result))
    }
}

/// Backend that never produces predictions
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPredictionProvider;

#[async_trait]
impl PredictionExecutionProvider for NullPredictionProvider {
    async fn execute_prediction(
        &self,
        task: &Task,
        _sensor_data: &SensorData,
    ) -> Result<PredictionData> {
        Err(ExecutorError::empty_result(
            &task.project_name,
            &task.model_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, PredictorConfig, PredictorKind};
    use crate::models::TimeRange;
    use crate::prediction::MockClientFactory;
    use chrono::{Duration, TimeZone, Utc};

    fn task(project: &str) -> Task {
        let from = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        Task::new(project, "turbine-7", from, from + Duration::hours(1))
    }

    fn provider() -> RegistryPredictionProvider {
        let registry = Arc::new(ClientRegistry::new(
            Arc::new(MockClientFactory::default()),
            AuthConfig::default(),
        ));
        registry
            .allocate(&PredictorConfig::new(PredictorKind::Mock).with_projects(["wind-farm-1"]))
            .unwrap();
        RegistryPredictionProvider::new(registry)
    }

    #[tokio::test]
    async fn test_prediction_named_after_model() {
        let task = task("wind-farm-1");
        let sensor_data = SensorData::new(task.time_range(), Vec::new());

        let prediction = provider()
            .execute_prediction(&task, &sensor_data)
            .await
            .unwrap();
        assert_eq!(prediction.name, "turbine-7");
        assert_eq!(prediction.time_range, sensor_data.time_range);
        assert!(!prediction.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let task = task("elsewhere");
        let sensor_data = SensorData::new(task.time_range(), Vec::new());
        assert!(matches!(
            provider().execute_prediction(&task, &sensor_data).await,
            Err(ExecutorError::ClientNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_backend_result() {
        let task = task("wind-farm-1");
        let at = task.from_time;
        let sensor_data = SensorData::new(TimeRange::new(at, at), Vec::new());
        assert!(matches!(
            provider().execute_prediction(&task, &sensor_data).await,
            Err(ExecutorError::EmptyResult { .. })
        ));
    }

    #[tokio::test]
    async fn test_null_provider() {
        let task = task("wind-farm-1");
        let sensor_data = SensorData::new(task.time_range(), Vec::new());
        assert!(NullPredictionProvider
            .execute_prediction(&task, &sensor_data)
            .await
            .is_err());
    }
}
