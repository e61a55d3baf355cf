//! # Prediction Executor
//!
//! Startup wiring and the two processing loops.
//!
//! [`PredictionExecutor::from_config`] validates the configuration, builds
//! every collaborator once (registry, providers, storage, queue), and
//! [`PredictionExecutor::run`] then drives exactly one of:
//!
//! - [`TaskLoop`] for [`ExecutionMode::Sync`]
//! - [`EventLoop`] for [`ExecutionMode::Async`]
//!
//! Anything missing at startup is an [`ExecutorError::Configuration`]; after
//! startup, nothing short of the shutdown signal stops processing.

pub mod event_loop;
pub mod idle;
pub mod pipeline;
pub mod task_loop;

use std::sync::Arc;
use tracing::info;

pub use event_loop::{EventLoop, EventLoopStats, TaskPayloadHandler};
pub use idle::{IdleSummary, IdleTracker};
pub use pipeline::{ExecutionPipeline, PipelineReport, StageOutcome};
pub use task_loop::{IterationOutcome, LoopStats, LoopStatsSnapshot, TaskLoop};

use crate::config::{ConfigurationError, ExecutionMode, ExecutorConfig, PredictorKind};
use crate::error::{ExecutorError, Result};
use crate::messaging::{InMemoryTaskQueue, TaskReceiver, TaskSubscription};
use crate::models::SensorDataSpec;
use crate::prediction::{
    ClientFactory, ClientRegistry, MockClientFactory, ModelInfoProvider, ModelServerClientFactory,
    NullPredictionProvider, PredictionExecutionProvider, RegistryPredictionProvider,
};
use crate::sensor_data::{self, SensorDataProvider};
use crate::shutdown::ShutdownSignal;
use crate::storage::{self, PredictionStorageProvider};

/// Externally supplied collaborators; anything left unset is built from config
#[derive(Default, Clone)]
pub struct Collaborators {
    pub client_factory: Option<Arc<dyn ClientFactory>>,
    pub sensor_data: Option<Arc<dyn SensorDataProvider>>,
    pub storage: Option<Arc<dyn PredictionStorageProvider>>,
    pub receiver: Option<Arc<dyn TaskReceiver>>,
    pub subscription: Option<Arc<dyn TaskSubscription>>,
}

impl Collaborators {
    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn with_sensor_data(mut self, provider: Arc<dyn SensorDataProvider>) -> Self {
        self.sensor_data = Some(provider);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn PredictionStorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_receiver(mut self, receiver: Arc<dyn TaskReceiver>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_subscription(mut self, subscription: Arc<dyn TaskSubscription>) -> Self {
        self.subscription = Some(subscription);
        self
    }
}

pub struct PredictionExecutor {
    config: ExecutorConfig,
    registry: Arc<ClientRegistry>,
    pipeline: ExecutionPipeline,
    receiver: Arc<dyn TaskReceiver>,
    subscription: Arc<dyn TaskSubscription>,
    queue: Option<Arc<InMemoryTaskQueue>>,
}

impl PredictionExecutor {
    pub fn from_config(mut config: ExecutorConfig, collaborators: Collaborators) -> Result<Self> {
        if let Some(predictor) = config.predictor.as_mut() {
            predictor.expand_connection_string()?;
        }
        config.validate()?;
        let predictor_config = config.predictor()?.clone();

        let factory: Arc<dyn ClientFactory> = match (&collaborators.client_factory, predictor_config.kind) {
            (Some(factory), _) => Arc::clone(factory),
            (None, PredictorKind::ModelServer) => Arc::new(ModelServerClientFactory::new()),
            (None, PredictorKind::Mock | PredictorKind::Null) => Arc::new(MockClientFactory::default()),
        };
        let registry = Arc::new(ClientRegistry::new(factory, predictor_config.auth.clone()));

        let predictor: Arc<dyn PredictionExecutionProvider> = match predictor_config.kind {
            PredictorKind::ModelServer | PredictorKind::Mock => {
                registry.allocate(&predictor_config).map_err(|e| {
                    ConfigurationError::collaborator_unavailable("prediction clients", e.chain())
                })?;
                Arc::new(RegistryPredictionProvider::new(Arc::clone(&registry)))
            }
            PredictorKind::Null => Arc::new(NullPredictionProvider),
        };

        let sensor_data = collaborators
            .sensor_data
            .clone()
            .unwrap_or_else(|| sensor_data::build_provider(&config.sensor_data));
        let storage = collaborators
            .storage
            .clone()
            .unwrap_or_else(|| storage::build_storage(&config.storage));

        let (receiver, subscription, queue) = Self::build_transport(&config, &collaborators)?;

        let pipeline = ExecutionPipeline::new(sensor_data, predictor, storage).with_sensor_spec(
            SensorDataSpec {
                tag_list: config.sensor_data.tags.clone(),
            },
        );

        info!(
            executor = %config.name,
            mode = ?config.mode,
            predictor = ?predictor_config.kind,
            projects = predictor_config.projects.len(),
            "✅ Prediction executor initialized"
        );

        Ok(Self {
            config,
            registry,
            pipeline,
            receiver,
            subscription,
            queue,
        })
    }

    #[allow(clippy::type_complexity)]
    fn build_transport(
        config: &ExecutorConfig,
        collaborators: &Collaborators,
    ) -> Result<(
        Arc<dyn TaskReceiver>,
        Arc<dyn TaskSubscription>,
        Option<Arc<InMemoryTaskQueue>>,
    )> {
        if let (Some(receiver), Some(subscription)) =
            (&collaborators.receiver, &collaborators.subscription)
        {
            return Ok((Arc::clone(receiver), Arc::clone(subscription), None));
        }

        let queue = Arc::new(InMemoryTaskQueue::from_config(&config.queue).map_err(|e| {
            ExecutorError::from(ConfigurationError::collaborator_unavailable(
                "task queue",
                e.to_string(),
            ))
        })?);

        let receiver: Arc<dyn TaskReceiver> = match &collaborators.receiver {
            Some(receiver) => Arc::clone(receiver),
            None => queue.clone(),
        };
        let subscription: Arc<dyn TaskSubscription> = match &collaborators.subscription {
            Some(subscription) => Arc::clone(subscription),
            None => queue.clone(),
        };
        Ok((receiver, subscription, Some(queue)))
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &ExecutionPipeline {
        &self.pipeline
    }

    /// The built-in queue, when the transport was not injected
    pub fn queue(&self) -> Option<&Arc<InMemoryTaskQueue>> {
        self.queue.as_ref()
    }

    pub fn model_info(&self) -> ModelInfoProvider {
        ModelInfoProvider::new(Arc::clone(&self.registry))
    }

    /// Run the configured loop until `shutdown` fires
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<()> {
        match self.config.mode {
            ExecutionMode::Sync => {
                let mut task_loop = TaskLoop::new(
                    self.config.name.clone(),
                    Arc::clone(&self.receiver),
                    self.pipeline.clone(),
                    self.config.polling.clone(),
                );
                task_loop.run(shutdown).await;
                Ok(())
            }
            ExecutionMode::Async => {
                EventLoop::new(
                    self.config.name.clone(),
                    Arc::clone(&self.subscription),
                    self.pipeline.clone(),
                    self.config.event_loop.non_task_payloads,
                )
                .run(shutdown)
                .await
            }
        }
    }
}
