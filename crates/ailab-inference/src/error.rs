//! Error types for inference server launches

use crate::config::ConfigError;
use thiserror::Error;

/// Failure reported by the container engine collaborator.
///
/// The launch sequence never inspects or rewrites these: they surface to the
/// caller wrapped in [`InferenceError::Engine`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Pulling (or resolving) the serving image failed
    #[error("failed to pull image {image}: {reason}")]
    Pull { image: String, reason: String },

    /// The engine refused to create the container
    #[error("failed to create container: {0}")]
    Create(String),

    /// The engine could not be reached
    #[error("container engine unavailable: {0}")]
    Unavailable(String),
}

/// Inference launch error types
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InferenceError {
    /// Invalid server configuration, disabled provider, missing connection or GPU
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Image pull or container creation failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// GPU enumeration failed
    #[error("GPU enumeration failed: {0}")]
    Gpu(String),

    /// Extension configuration could not be loaded
    #[error("Extension configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl InferenceError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Result type for inference launch operations
pub type InferenceResult<T> = Result<T, InferenceError>;
