//! Configuration Error Types
//!
//! Startup-time errors. Any of these means the deployment is wrong and the
//! process should not start.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// A collaborator required at startup could not be constructed
    #[error("Could not construct {component}: {error}")]
    CollaboratorUnavailable { component: String, error: String },

    /// Parse or merge failure in the underlying config sources
    #[error("Failed to load configuration for environment '{environment}': {error}")]
    LoadError { environment: String, error: String },
}

impl ConfigurationError {
    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn collaborator_unavailable(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            component: component.into(),
            error: error.into(),
        }
    }

    pub fn load_error(environment: impl Into<String>, error: impl Into<String>) -> Self {
        Self::LoadError {
            environment: environment.into(),
            error: error.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;
