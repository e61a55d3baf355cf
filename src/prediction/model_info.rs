//! Model discovery through the client registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use super::registry::ClientRegistry;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub project: String,
    pub info: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ModelInfoProvider {
    registry: Arc<ClientRegistry>,
}

impl ModelInfoProvider {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Every model of every listed project that has a registered client.
    /// Projects without a client are logged and skipped.
    pub async fn get_models(&self, projects: &[String]) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();

        for project in projects {
            let client = match self.registry.lookup_by_project(project) {
                Ok(client) => client,
                Err(e) => {
                    error!(project = %project, error = %e, "No client found for project");
                    continue;
                }
            };

            let mut metadata: Vec<(String, serde_json::Value)> =
                client.get_metadata().await?.into_iter().collect();
            metadata.sort_by(|a, b| a.0.cmp(&b.0));

            models.extend(metadata.into_iter().map(|(name, info)| ModelInfo {
                name,
                project: project.clone(),
                info,
            }));
        }

        Ok(models)
    }

    /// Per-model details are not tracked; always empty
    pub fn get_model_info(&self, _model_name: &str) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, PredictorConfig, PredictorKind};
    use crate::prediction::MockClientFactory;

    #[tokio::test]
    async fn test_get_models_skips_unknown_projects() {
        let registry = Arc::new(ClientRegistry::new(
            Arc::new(MockClientFactory::with_models(["m2", "m1"])),
            AuthConfig::default(),
        ));
        registry
            .allocate(&PredictorConfig::new(PredictorKind::Mock).with_projects(["p1"]))
            .unwrap();

        let provider = ModelInfoProvider::new(registry);
        let models = provider
            .get_models(&["p1".to_string(), "missing".to_string()])
            .await
            .unwrap();

        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["m1", "m2"]);
        assert!(models.iter().all(|m| m.project == "p1"));
        assert!(provider.get_model_info("m1").is_empty());
    }
}
