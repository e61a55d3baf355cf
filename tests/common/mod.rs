#![allow(dead_code)]

pub mod collaborators;
pub mod strategies;

pub use collaborators::*;
pub use strategies::*;

use chrono::{DateTime, Duration, TimeZone, Utc};
use prediction_executor::config::{AuthConfig, PredictorConfig, PredictorKind};
use prediction_executor::models::Task;
use prediction_executor::prediction::{ClientFactory, ClientRegistry};
use std::sync::Arc;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

/// wind-farm-1 / turbine-7 over one hour starting at `t0`
pub fn scenario_task() -> Task {
    Task::new("wind-farm-1", "turbine-7", t0(), t0() + Duration::seconds(3600))
}

pub fn registry_with(factory: Arc<dyn ClientFactory>, projects: &[&str]) -> Arc<ClientRegistry> {
    let registry = Arc::new(ClientRegistry::new(factory, AuthConfig::default()));
    registry
        .allocate(
            &PredictorConfig::new(PredictorKind::Mock)
                .with_host("models.example.com")
                .with_projects(projects.iter().copied()),
        )
        .unwrap();
    registry
}
