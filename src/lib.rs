#![allow(clippy::doc_markdown)] // Allow technical terms like RFC3339 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Prediction Executor
//!
//! Queue-driven worker that turns prediction tasks into stored predictions.
//!
//! ## Overview
//!
//! An upstream scheduler enqueues tasks naming a project, a model and a time
//! range. The executor takes each task through a three-stage pipeline:
//! fetch sensor data, run the model server's prediction, store the result.
//! Stages are best-effort; a failure is logged and reported, never fatal.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration and startup validation
//! - [`messaging`] - Task codec, queue seams and the in-memory queue
//! - [`prediction`] - Backend clients, the client registry and providers
//! - [`sensor_data`] - Sensor data providers
//! - [`storage`] - Prediction storage providers
//! - [`executor`] - Pipeline, idle tracking, and the sync/async loops
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prediction_executor::config::{ExecutorConfig, PredictorConfig, PredictorKind};
//! use prediction_executor::executor::{Collaborators, PredictionExecutor};
//! use prediction_executor::shutdown::ShutdownSignal;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExecutorConfig::new(
//!     PredictorConfig::new(PredictorKind::Mock).with_projects(["wind-farm-1"]),
//!     "memory://tasks",
//! );
//! let executor = PredictionExecutor::from_config(config, Collaborators::default())?;
//! executor.run(ShutdownSignal::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod prediction;
pub mod sensor_data;
pub mod shutdown;
pub mod storage;

pub use config::{ConfigManager, ConfigurationError, ExecutorConfig};
pub use error::{ExecutorError, Result};
pub use executor::{
    Collaborators, EventLoop, ExecutionPipeline, IdleTracker, PipelineReport, PredictionExecutor,
    StageOutcome, TaskLoop,
};
pub use messaging::{DecodeError, TaskCodec};
pub use models::{PredictionData, SensorData, Task, TimeRange};
pub use prediction::{ClientKey, ClientRegistry};
pub use shutdown::ShutdownSignal;
