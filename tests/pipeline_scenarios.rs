//! End-to-end pipeline passes over recording collaborators.

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use prediction_executor::error::ExecutorError;
use prediction_executor::executor::ExecutionPipeline;
use prediction_executor::models::SensorData;
use prediction_executor::prediction::{
    MockClientFactory, NullPredictionProvider, PredictionExecutionProvider,
    RegistryPredictionProvider,
};
use prediction_executor::sensor_data::SensorDataProvider;

fn pipeline_with(
    sensor_data: Arc<dyn SensorDataProvider>,
    storage: Arc<RecordingStorage>,
    projects: &[&str],
) -> ExecutionPipeline {
    let registry = registry_with(Arc::new(MockClientFactory::default()), projects);
    ExecutionPipeline::new(
        sensor_data,
        Arc::new(RegistryPredictionProvider::new(registry)),
        storage,
    )
}

#[tokio::test]
async fn test_wind_farm_scenario_stores_once() {
    let sensor_data = Arc::new(FixedSensorData::new(2, 10));
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = pipeline_with(sensor_data.clone(), storage.clone(), &["wind-farm-1"]);

    let task = scenario_task();
    let report = pipeline.run(&task).await;

    let fetched = report.sensor_data.value().unwrap();
    assert_eq!(fetched.data.len(), 2);
    assert_eq!(fetched.point_count(), 20);

    let prediction = report.prediction.value().unwrap();
    assert_eq!(prediction.name, "turbine-7");
    assert!(!prediction.data.is_empty());
    assert_eq!(prediction.time_range, task.time_range());

    assert_eq!(storage.call_count(), 1);
    assert_eq!(&storage.stored()[0], prediction);
    assert_eq!(sensor_data.calls.load(Ordering::SeqCst), 1);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_empty_project_is_invalid_and_never_stored() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = pipeline_with(
        Arc::new(FixedSensorData::new(2, 10)),
        storage.clone(),
        &["wind-farm-1"],
    );

    let mut task = scenario_task();
    task.project_name = String::new();
    let report = pipeline.run(&task).await;

    assert!(matches!(
        report.prediction.error(),
        Some(ExecutorError::InvalidInput { .. })
    ));
    assert!(report.storage.is_skipped());
    assert_eq!(storage.call_count(), 0);
}

#[tokio::test]
async fn test_unregistered_project_is_client_not_found() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = pipeline_with(
        Arc::new(FixedSensorData::new(2, 10)),
        storage.clone(),
        &["wind-farm-1"],
    );

    let mut task = scenario_task();
    task.project_name = "solar-park-3".to_string();
    let report = pipeline.run(&task).await;

    assert!(matches!(
        report.prediction.error(),
        Some(ExecutorError::ClientNotFound { project }) if project == "solar-park-3"
    ));
    assert_eq!(storage.call_count(), 0);
}

#[tokio::test]
async fn test_sensor_failure_does_not_abort_pipeline() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = pipeline_with(Arc::new(FailingSensorData), storage.clone(), &["wind-farm-1"]);

    let report = pipeline.run(&scenario_task()).await;

    assert!(report.sensor_data.is_failed());
    // Prediction still ran and failed on the missing input
    assert!(matches!(
        report.prediction.error(),
        Some(ExecutorError::InvalidInput { .. })
    ));
    assert!(report.storage.is_skipped());
    assert_eq!(storage.call_count(), 0);

    let stages: Vec<&str> = report.failures().iter().map(|(stage, _)| *stage).collect();
    assert_eq!(stages, vec!["fetch_sensor_data", "execute_prediction"]);
}

#[tokio::test]
async fn test_storage_failure_is_reported_not_raised() {
    let storage = Arc::new(RecordingStorage::failing());
    let pipeline = pipeline_with(
        Arc::new(FixedSensorData::new(1, 3)),
        storage.clone(),
        &["wind-farm-1"],
    );

    let report = pipeline.run(&scenario_task()).await;

    assert!(report.prediction.is_completed());
    assert!(matches!(
        report.storage.error(),
        Some(ExecutorError::CollaboratorFailure { collaborator, .. }) if collaborator == "storage"
    ));
    assert_eq!(storage.call_count(), 1);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_empty_backend_result() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = pipeline_with(
        Arc::new(FixedSensorData::new(2, 10)),
        storage.clone(),
        &["wind-farm-1"],
    );

    // A zero-width range makes the mock backend return nothing
    let mut task = scenario_task();
    task.to_time = task.from_time;
    let report = pipeline.run(&task).await;

    assert!(matches!(
        report.prediction.error(),
        Some(ExecutorError::EmptyResult { .. })
    ));
    assert_eq!(storage.call_count(), 0);
}

#[tokio::test]
async fn test_null_predictor_never_stores() {
    let storage = Arc::new(RecordingStorage::default());
    let pipeline = ExecutionPipeline::new(
        Arc::new(FixedSensorData::new(2, 10)),
        Arc::new(NullPredictionProvider),
        storage.clone(),
    );

    let report = pipeline.run(&scenario_task()).await;
    assert!(report.prediction.is_failed());
    assert_eq!(storage.call_count(), 0);
}

#[tokio::test]
async fn test_provider_used_directly_matches_pipeline() {
    let registry = registry_with(Arc::new(MockClientFactory::default()), &["wind-farm-1"]);
    let provider = RegistryPredictionProvider::new(registry);
    let task = scenario_task();

    let prediction = provider
        .execute_prediction(&task, &SensorData::new(task.time_range(), Vec::new()))
        .await
        .unwrap();
    assert_eq!(prediction.name, task.model_name);
}
