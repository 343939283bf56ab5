//! CLI command implementations

pub mod images;
pub mod plan;
pub mod probe;

use crate::error::CliError;
use ailab_inference::ExtensionConfiguration;
use std::path::Path;

/// Extension configuration from `path`, or defaults; `AILAB_*` variables apply either way
pub fn load_configuration(path: Option<&Path>) -> Result<ExtensionConfiguration, CliError> {
    let configuration = match path {
        Some(path) => ExtensionConfiguration::load(path)?,
        None => ExtensionConfiguration::from_env()?,
    };
    tracing::debug!(?configuration, "loaded extension configuration");
    Ok(configuration)
}
