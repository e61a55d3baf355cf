//! Configuration Loader
//!
//! Environment-aware loading. A base file is layered with an optional
//! `<stem>.<environment>.<ext>` override next to it, then with
//! `PREDICTION_EXECUTOR__SECTION__FIELD` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::ExecutorConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ENV_PREFIX: &str = "PREDICTION_EXECUTOR";
const ENVIRONMENT_VAR: &str = "PREDICTION_EXECUTOR_ENV";

pub struct ConfigManager {
    config: ExecutorConfig,
    environment: String,
    source: PathBuf,
}

impl ConfigManager {
    /// Load, expand and validate configuration from `path`
    ///
    /// `environment` falls back to `PREDICTION_EXECUTOR_ENV`, then `development`.
    pub fn load_from_file(path: &Path, environment: Option<&str>) -> ConfigResult<Self> {
        let environment = environment
            .map(str::to_lowercase)
            .unwrap_or_else(Self::detect_environment);

        if !path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }

        debug!(
            environment = %environment,
            path = %path.display(),
            "Loading executor configuration"
        );

        let mut builder = Config::builder().add_source(File::from(path));

        if let Some(override_path) = Self::environment_override_path(path, &environment) {
            debug!(path = %override_path.display(), "Applying environment override file");
            builder = builder.add_source(File::from(override_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: ExecutorConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| ConfigurationError::load_error(&environment, e.to_string()))?;

        Self::finalize(&mut config)?;

        let manager = Self {
            config,
            environment,
            source: path.to_path_buf(),
        };

        debug!(
            "Configuration loaded: {}",
            serde_json::to_string_pretty(&manager.debug_config())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            environment = %manager.environment,
            mode = ?manager.config.mode,
            "✅ Configuration loaded successfully"
        );

        Ok(manager)
    }

    /// Wrap an already-built configuration, applying the same expansion and
    /// validation as file loading
    pub fn from_config(mut config: ExecutorConfig, environment: &str) -> ConfigResult<Self> {
        Self::finalize(&mut config)?;
        Ok(Self {
            config,
            environment: environment.to_lowercase(),
            source: PathBuf::new(),
        })
    }

    fn finalize(config: &mut ExecutorConfig) -> ConfigResult<()> {
        if let Some(predictor) = config.predictor.as_mut() {
            predictor.expand_connection_string()?;
        }
        config.validate()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn into_config(self) -> ExecutorConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was loaded from; empty for in-memory configs
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Configuration as JSON with credentials and connection strings masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut config_json = serde_json::json!(self.config);
        let sensitive_patterns = ["password", "secret", "token", "credential", "connection_string"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match val {
                            serde_json::Value::Null => serde_json::Value::Null,
                            serde_json::Value::String(s) if s.is_empty() => {
                                serde_json::Value::String("[EMPTY]".to_string())
                            }
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    /// `PREDICTION_EXECUTOR_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var(ENVIRONMENT_VAR)
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `config/executor.toml` + `test` -> `config/executor.test.toml`
    fn environment_override_path(path: &Path, environment: &str) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        let file_name = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{stem}.{environment}.{ext}"),
            None => format!("{stem}.{environment}"),
        };
        Some(path.with_file_name(file_name))
    }
}
