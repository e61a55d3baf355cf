//! # Prediction Backends
//!
//! Everything between a decoded task plus its sensor data and a
//! [`PredictionData`] result:
//!
//! - [`PredictionClient`]: one backend client, scoped to a single project
//! - [`ClientRegistry`]: process-wide cache of clients keyed by fingerprint
//!   and by project
//! - [`PredictionExecutionProvider`]: what the pipeline calls
//! - [`ModelInfoProvider`]: model listing via the same registry

pub mod mock;
pub mod model_info;
pub mod model_server;
pub mod provider;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{PredictionData, PredictionSeries, SensorData, Task};

pub use mock::{MockClientFactory, MockPredictionClient};
pub use model_info::{ModelInfo, ModelInfoProvider};
pub use model_server::{ModelServerClient, ModelServerClientFactory};
pub use provider::{NullPredictionProvider, RegistryPredictionProvider};
pub use registry::{fingerprint, ClientArgs, ClientKey, ClientRegistry, RegistryStats};

/// A backend client bound to one project
#[async_trait]
pub trait PredictionClient: Send + Sync {
    /// Project this client was constructed for
    fn project(&self) -> &str;

    /// Run predictions for every model the client targets over `[from, to)`
    async fn predict(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PredictionSeries>>;

    /// Model name to model metadata for this client's project
    async fn get_metadata(&self) -> Result<HashMap<String, serde_json::Value>>;
}

impl std::fmt::Debug for dyn PredictionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionClient")
            .field("project", &self.project())
            .finish()
    }
}

pub type ClientHandle = Arc<dyn PredictionClient>;

/// Builds clients for the registry. Construction must not block on I/O; it
/// runs while the registry lock is held.
pub trait ClientFactory: Send + Sync {
    fn create(&self, args: &ClientArgs) -> Result<ClientHandle>;
}

#[async_trait]
pub trait PredictionExecutionProvider: Send + Sync {
    async fn execute_prediction(&self, task: &Task, sensor_data: &SensorData)
        -> Result<PredictionData>;
}
