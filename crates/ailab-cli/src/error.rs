#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Inference(#[from] ailab_inference::InferenceError),
}

impl From<ailab_inference::config::ConfigError> for CliError {
    fn from(e: ailab_inference::config::ConfigError) -> Self {
        CliError::ConfigError(e.to_string())
    }
}
