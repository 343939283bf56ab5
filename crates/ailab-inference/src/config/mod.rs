//! Extension configuration
//!
//! The extension host owns the user-facing settings; this module reads them
//! from a configuration file (any format the `config` crate understands) with
//! an `AILAB_*` environment overlay, and exposes them to the launch sequence
//! through [`ConfigurationSource`].

mod loader;

pub use loader::{ENV_PREFIX, detect_format, from_env, from_str, load_config, substitute_env_vars};

use crate::images::ImageCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Port the extension's REST API listens on when nothing else is configured
pub const DEFAULT_API_PORT: u16 = 10434;

/// Configuration loading error
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read access to the extension host's settings.
pub trait ConfigurationSource: Send + Sync {
    /// Port of the extension REST API, used for the documentation link label
    fn api_port(&self) -> u16;

    /// Whether GPU acceleration is opted into
    fn is_gpu_experiment_enabled(&self) -> bool;
}

/// Settings of the AI Lab extension relevant to inference servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExtensionConfiguration {
    pub api_port: u16,
    pub experimental_gpu: bool,
    pub images: ImageCatalog,
}

impl Default for ExtensionConfiguration {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            experimental_gpu: false,
            images: ImageCatalog::default(),
        }
    }
}

impl ExtensionConfiguration {
    /// Load from a configuration file, environment overrides applied
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        load_config(path)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> ConfigResult<Self> {
        from_env()
    }

    pub fn with_experimental_gpu(mut self, enabled: bool) -> Self {
        self.experimental_gpu = enabled;
        self
    }

    pub fn with_api_port(mut self, port: u16) -> Self {
        self.api_port = port;
        self
    }
}

impl ConfigurationSource for ExtensionConfiguration {
    fn api_port(&self) -> u16 {
        self.api_port
    }

    fn is_gpu_experiment_enabled(&self) -> bool {
        self.experimental_gpu
    }
}
