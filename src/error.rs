//! # Executor Error Types
//!
//! One taxonomy for everything that can go wrong while turning a task into a
//! stored prediction. Pipeline stages return these as values; only startup
//! (`Configuration`) errors are allowed to stop the process.

use crate::config::ConfigurationError;
use crate::messaging::{DecodeError, MessagingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Task payload could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A required pipeline field is missing or malformed
    #[error("Invalid input for {stage}: {reason}")]
    InvalidInput { stage: String, reason: String },

    /// No backend client was registered for the project
    #[error("No prediction client registered for project '{project}'")]
    ClientNotFound { project: String },

    /// The backend answered without any prediction data
    #[error("Prediction backend returned no data for {project}/{model}")]
    EmptyResult { project: String, model: String },

    /// A sensor-data, backend, or storage call failed
    #[error("{collaborator} failed during {operation}: {message}")]
    CollaboratorFailure {
        collaborator: String,
        operation: String,
        message: String,
    },

    /// Queue transport failure outside the pipeline stages
    #[error(transparent)]
    Messaging(#[from] MessagingError),

    /// Startup-time deployment mistake
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ExecutorError {
    pub fn invalid_input(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn client_not_found(project: impl Into<String>) -> Self {
        Self::ClientNotFound {
            project: project.into(),
        }
    }

    pub fn empty_result(project: impl Into<String>, model: impl Into<String>) -> Self {
        Self::EmptyResult {
            project: project.into(),
            model: model.into(),
        }
    }

    pub fn collaborator(
        collaborator: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CollaboratorFailure {
            collaborator: collaborator.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Short stable label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::ClientNotFound { .. } => "client_not_found",
            Self::EmptyResult { .. } => "empty_result",
            Self::CollaboratorFailure { .. } => "collaborator_failure",
            Self::Messaging(_) => "messaging_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Render the error with its full source chain
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
