//! Inference server configuration and launch records

use crate::error::{InferenceError, InferenceResult};
use crate::model::ModelInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label carrying the JSON list of model ids a container serves
pub const LABEL_INFERENCE_SERVER: &str = "ai-lab-inference-server";

/// Inference engines a provider can launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InferenceType {
    LlamaCpp,
}

impl std::fmt::Display for InferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceType::LlamaCpp => write!(f, "llama-cpp"),
        }
    }
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServerConfig {
    /// Host port the server is published on
    pub port: u16,
    /// Explicit image, bypassing image selection
    #[serde(default)]
    pub image: Option<String>,
    /// Name of the container runtime connection to use
    #[serde(default)]
    pub connection: Option<String>,
    /// Layers to offload when a GPU is used
    #[serde(default)]
    pub gpu_layers: Option<u32>,
    /// Exactly one model is supported
    #[serde(rename = "modelsInfo")]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl InferenceServerConfig {
    pub fn new(port: u16, model: ModelInfo) -> Self {
        Self {
            port,
            image: None,
            connection: None,
            gpu_layers: None,
            models: vec![model],
            labels: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    pub fn with_gpu_layers(mut self, layers: u32) -> Self {
        self.gpu_layers = Some(layers);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// The single model to serve
    pub fn single_model(&self) -> InferenceResult<&ModelInfo> {
        match self.models.as_slice() {
            [model] => Ok(model),
            [] => Err(InferenceError::configuration(
                "need at least one model info to start an inference server",
            )),
            _ => Err(InferenceError::configuration(
                "the inference server does not support serving multiple models",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
}

/// Engine-side identity of a created container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRef {
    pub engine_id: String,
    pub container_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnection {
    pub port: u16,
}

/// A successfully launched inference server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServer {
    pub container: ContainerRef,
    pub connection: ServerConnection,
    pub status: ServerStatus,
    pub models: Vec<ModelInfo>,
    #[serde(rename = "type")]
    pub inference_type: InferenceType,
    pub labels: BTreeMap<String, String>,
}
