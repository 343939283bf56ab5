//! Multi-format configuration loading
//!
//! Format is detected from the file extension. File text goes through
//! environment variable substitution (`${VAR}` and `$VAR`) before parsing,
//! and an `AILAB_*` environment layer is applied on top of the file.

use super::{ConfigError, ConfigResult};
use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::LazyLock;

/// Prefix of environment variables overriding file values
pub const ENV_PREFIX: &str = "AILAB";

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));
static SIMPLE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid regex"));

/// Detect configuration format from file extension
///
/// YAML (`.yaml`, `.yml`), TOML, JSON, INI, RON and JSON5 are supported.
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("no file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute environment variables in a string.
///
/// Unset variables are left verbatim.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    SIMPLE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Parse configuration text of a known format, then apply the environment layer.
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted = substitute_env_vars(content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Load configuration from a file
pub fn load_config<T>(path: impl AsRef<Path>) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    from_str(&content, format)
}

/// Build configuration from defaults and the environment layer only
pub fn from_env<T>() -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    Cfg::builder()
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}
