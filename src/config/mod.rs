//! # Executor Configuration
//!
//! Typed configuration for the prediction executor. Values are layered by
//! [`ConfigManager`] from a base file, an optional environment override file,
//! and `PREDICTION_EXECUTOR__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prediction_executor::config::ConfigManager;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file(Path::new("config/executor.toml"), None)?;
//! let predictor = manager.config().predictor()?;
//! println!("projects: {:?}", predictor.projects);
//! # Ok(())
//! # }
//! ```
//!
//! Anything [`ExecutorConfig::validate`] rejects is a deployment mistake and
//! stops the process before any task is fetched.

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::models::SensorTag;

/// Accepts either a single project name or a list of them
fn deserialize_projects<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(Vec::new()),
        // Simple scalar format: projects = "wind-farm-1"
        Value::String(project) => Ok(vec![project]),
        // List format: projects = ["wind-farm-1", "wind-farm-2"]
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(project) => Ok(project),
                other => Err(D::Error::custom(format!(
                    "Project names must be strings, got {other}"
                ))),
            })
            .collect(),
        _ => Err(D::Error::custom(
            "projects must be a string or a list of strings",
        )),
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Instance name used in logs and as the queue consumer name
    #[serde(default = "default_executor_name")]
    pub name: String,

    /// Pull (sync) or push (async) processing
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Prediction backend settings. Required; absence is fatal at startup.
    #[serde(default)]
    pub predictor: Option<PredictorConfig>,

    #[serde(default)]
    pub sensor_data: SensorDataConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub event_loop: EventLoopConfig,
}

fn default_executor_name() -> String {
    "executor".to_string()
}

impl ExecutorConfig {
    /// Minimal configuration with the given predictor and queue connection
    pub fn new(predictor: PredictorConfig, queue_connection_string: impl Into<String>) -> Self {
        Self {
            name: default_executor_name(),
            mode: ExecutionMode::default(),
            predictor: Some(predictor),
            sensor_data: SensorDataConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig {
                connection_string: Some(queue_connection_string.into()),
                ..QueueConfig::default()
            },
            polling: PollingConfig::default(),
            event_loop: EventLoopConfig::default(),
        }
    }

    pub fn predictor(&self) -> ConfigResult<&PredictorConfig> {
        self.predictor
            .as_ref()
            .ok_or_else(|| ConfigurationError::missing_required_field("predictor", "executor"))
    }

    /// Check everything that must hold before the executor may start
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "name",
                &self.name,
                "executor name cannot be empty",
            ));
        }

        self.predictor()?.validate()?;
        self.queue.validate()?;
        self.polling.validate()?;
        self.sensor_data.validate()?;
        Ok(())
    }
}

/// Which task loop runs in this process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Poll-process loop over [`crate::messaging::TaskReceiver`]
    #[default]
    Sync,
    /// Push-driven handler over [`crate::messaging::TaskSubscription`]
    Async,
}

/// Prediction backend variants selectable at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// HTTP model server, one client per project
    ModelServer,
    /// Registry-backed synthetic client, no network
    Mock,
    /// Never produces predictions
    Null,
}

/// Prediction backend configuration
///
/// The connection fields are flat, mirroring how the model-server client is
/// constructed. Unknown keys are kept in `extra` so they can be inspected,
/// but they never reach client construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictorConfig {
    #[serde(rename = "type")]
    pub kind: PredictorKind,

    #[serde(default, deserialize_with = "deserialize_projects")]
    pub projects: Vec<String>,

    /// `https://host:port/gordo/<version>/<project>/`, expanded into the
    /// individual connection fields at load time
    #[serde(default)]
    pub connection_string: Option<String>,

    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_server_version")]
    pub server_version: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Minutes of data covered by one prediction request
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Keep the resampled `model-input` columns in prediction output
    #[serde(default)]
    pub forward_resampled_sensors: bool,
    #[serde(default)]
    pub ignore_unhealthy_targets: bool,
    #[serde(default = "default_n_retries")]
    pub n_retries: u32,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_server_version() -> String {
    "v0".to_string()
}

fn default_batch_size() -> u32 {
    100_000
}

fn default_parallelism() -> u32 {
    10
}

fn default_n_retries() -> u32 {
    5
}

impl PredictorConfig {
    pub fn new(kind: PredictorKind) -> Self {
        Self {
            kind,
            projects: Vec::new(),
            connection_string: None,
            scheme: default_scheme(),
            host: String::new(),
            port: default_port(),
            target: None,
            server_version: default_server_version(),
            metadata: HashMap::new(),
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
            forward_resampled_sensors: false,
            ignore_unhealthy_targets: false,
            n_retries: default_n_retries(),
            auth: AuthConfig::default(),
            extra: HashMap::new(),
        }
    }

    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the connection fields with the parts of `connection_string`
    ///
    /// The project named in the path is appended to `projects` when missing.
    pub fn expand_connection_string(&mut self) -> ConfigResult<()> {
        let Some(connection_string) = self.connection_string.take() else {
            return Ok(());
        };

        let parsed = url::Url::parse(&connection_string).map_err(|e| {
            ConfigurationError::invalid_value("connection_string", "<redacted>", e.to_string())
        })?;

        let host = parsed.host_str().ok_or_else(|| {
            ConfigurationError::invalid_value(
                "connection_string",
                "<redacted>",
                "connection string has no host",
            )
        })?;

        self.scheme = parsed.scheme().to_string();
        self.host = host.to_string();
        if let Some(port) = parsed.port_or_known_default() {
            self.port = port;
        }

        // Path shape: /gordo/<version>/<project>/
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if let Some(version) = segments.get(1) {
            self.server_version = (*version).to_string();
        }
        if let Some(project) = segments.get(2) {
            if !self.projects.iter().any(|p| p == project) {
                self.projects.push((*project).to_string());
            }
        }
        Ok(())
    }

    /// Per-project client configuration used for fingerprinting and
    /// client construction
    pub fn client_config(&self, project: &str) -> ClientConfig {
        ClientConfig {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            project: project.to_string(),
            target: self.target.clone(),
            server_version: self.server_version.clone(),
            metadata: self.metadata.clone(),
            batch_size: self.batch_size,
            parallelism: self.parallelism,
            forward_resampled_sensors: self.forward_resampled_sensors,
            ignore_unhealthy_targets: self.ignore_unhealthy_targets,
            n_retries: self.n_retries,
            extra: self.extra.clone(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.kind == PredictorKind::ModelServer {
            if self.host.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "host",
                    "predictor (model_server requires host or connection_string)",
                ));
            }
            if self.projects.is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "projects",
                    "predictor",
                ));
            }
        }
        if self.projects.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "projects",
                format!("{:?}", self.projects),
                "project names cannot be empty",
            ));
        }
        if self.batch_size == 0 || self.parallelism == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch_size/parallelism",
                format!("{}/{}", self.batch_size, self.parallelism),
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// The subset of predictor configuration that identifies one backend client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub project: String,
    pub target: Option<String>,
    pub server_version: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub batch_size: u32,
    pub parallelism: u32,
    pub forward_resampled_sensors: bool,
    pub ignore_unhealthy_targets: bool,
    pub n_retries: u32,
    /// Unrelated configuration carried alongside; never fingerprinted
    pub extra: HashMap<String, serde_json::Value>,
}

/// Credentials for the model server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl AuthConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorDataKind {
    /// Synthetic series, deterministic per time range
    #[default]
    Mock,
    /// Always returns sensor data without any series
    Empty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorDataConfig {
    #[serde(rename = "type", default)]
    pub kind: SensorDataKind,
    /// Tags to synthesise; generated names are used when empty
    #[serde(default)]
    pub tags: Vec<SensorTag>,
    #[serde(default = "default_series_count")]
    pub series_count: usize,
    #[serde(default = "default_points_per_series")]
    pub points_per_series: usize,
}

fn default_series_count() -> usize {
    2
}

fn default_points_per_series() -> usize {
    10
}

impl Default for SensorDataConfig {
    fn default() -> Self {
        Self {
            kind: SensorDataKind::default(),
            tags: Vec::new(),
            series_count: default_series_count(),
            points_per_series: default_points_per_series(),
        }
    }
}

impl SensorDataConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.kind == SensorDataKind::Mock && self.points_per_series == 0 {
            return Err(ConfigurationError::invalid_value(
                "sensor_data.points_per_series",
                "0",
                "mock sensor data needs at least one point per series",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Discard predictions, optionally logging them
    #[default]
    DevNull,
    /// Keep predictions in process memory
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type", default)]
    pub kind: StorageKind,
    #[serde(default)]
    pub do_log: bool,
}

/// Backoff applied inside a single `receive_with_backoff` call
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiveBackoffConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReceiveBackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 50,
            max_delay_ms: 1_000,
            multiplier: 2.0,
        }
    }
}

impl ReceiveBackoffConfig {
    /// Delay before retry number `attempt` (zero-based), capped at `max_delay_ms`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let delay_ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    #[default]
    InMemory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(rename = "type", default)]
    pub kind: QueueKind,
    /// Required. Usually supplied through
    /// `PREDICTION_EXECUTOR__QUEUE__CONNECTION_STRING`.
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default)]
    pub receive_backoff: ReceiveBackoffConfig,
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_max_message_bytes() -> usize {
    256 * 1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::default(),
            connection_string: None,
            capacity: default_queue_capacity(),
            max_message_bytes: default_max_message_bytes(),
            receive_backoff: ReceiveBackoffConfig::default(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        match self.connection_string.as_deref() {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(ConfigurationError::missing_required_field(
                    "connection_string",
                    "queue (set PREDICTION_EXECUTOR__QUEUE__CONNECTION_STRING)",
                ))
            }
        }
        if self.receive_backoff.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.receive_backoff.max_attempts",
                "0",
                "at least one receive attempt is required",
            ));
        }
        if self.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.capacity",
                "0",
                "queue capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Sleep intervals of the sync task loop
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sleep after an empty fetch
    pub idle_sleep_ms: u64,
    /// Sleep after a loop-level error
    pub error_sleep_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: 1_000,
            error_sleep_ms: 1_000,
        }
    }
}

impl PollingConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn error_sleep(&self) -> Duration {
        Duration::from_millis(self.error_sleep_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.error_sleep_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.error_sleep_ms",
                "0",
                "a zero error sleep would spin on persistent transport failures",
            ));
        }
        Ok(())
    }
}

/// What the async handler does with payloads that are not tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NonTaskPayloadPolicy {
    /// Log and drop
    #[default]
    Reject,
    /// Store a degraded prediction record carrying the raw payload
    Degraded,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventLoopConfig {
    #[serde(default)]
    pub non_task_payloads: NonTaskPayloadPolicy,
}
