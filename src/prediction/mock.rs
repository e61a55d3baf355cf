//! Synthetic prediction client for local runs and tests. No network access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::registry::ClientArgs;
use super::{ClientFactory, ClientHandle, PredictionClient};
use crate::error::Result;
use crate::models::PredictionSeries;

const DEFAULT_MODEL: &str = "mock-model";
const ROWS_PER_PREDICTION: usize = 4;
const COLUMNS: [&str; 2] = ["total-anomaly-scaled", "total-anomaly-unscaled"];

#[derive(Debug, Clone)]
pub struct MockPredictionClient {
    project: String,
    models: Vec<String>,
}

impl MockPredictionClient {
    pub fn new(project: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            project: project.into(),
            models,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[async_trait]
impl PredictionClient for MockPredictionClient {
    fn project(&self) -> &str {
        &self.project
    }

    /// One series per model; an empty or inverted range yields nothing
    async fn predict(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PredictionSeries>> {
        if from >= to {
            return Ok(Vec::new());
        }

        let step = (to - from).num_seconds() as f64 / ROWS_PER_PREDICTION as f64;
        let seed = from.timestamp() as f64;
        let columns: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();

        Ok(self
            .models
            .iter()
            .enumerate()
            .map(|(index, model)| {
                let table = (0..ROWS_PER_PREDICTION)
                    .map(|row| {
                        let t = seed + step * row as f64;
                        let scaled = ((t / 3600.0) + index as f64).sin().abs();
                        vec![scaled, scaled * 10.0]
                    })
                    .collect();
                PredictionSeries::new(model.clone(), table, columns.clone())
            })
            .collect())
    }

    async fn get_metadata(&self) -> Result<HashMap<String, serde_json::Value>> {
        Ok(self
            .models
            .iter()
            .map(|model| {
                (
                    model.clone(),
                    json!({ "project": self.project, "source": "mock" }),
                )
            })
            .collect())
    }
}

/// Builds [`MockPredictionClient`]s. A configured target becomes the only model.
#[derive(Debug, Clone)]
pub struct MockClientFactory {
    default_models: Vec<String>,
}

impl Default for MockClientFactory {
    fn default() -> Self {
        Self {
            default_models: vec![DEFAULT_MODEL.to_string()],
        }
    }
}

impl MockClientFactory {
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_models: models.into_iter().map(Into::into).collect(),
        }
    }
}

impl ClientFactory for MockClientFactory {
    fn create(&self, args: &ClientArgs) -> Result<ClientHandle> {
        let models = match &args.target {
            Some(target) => vec![target.clone()],
            None => self.default_models.clone(),
        };
        Ok(Arc::new(MockPredictionClient::new(args.project.clone(), models)))
    }
}
