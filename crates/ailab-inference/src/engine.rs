//! Container runtime collaborators
//!
//! Connections, image pulls and container creation belong to the container
//! engine client of the host; the launch sequence only talks to these traits.

use crate::container::ContainerSpec;
use crate::error::EngineError;
use crate::vm::VmType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Started,
    Stopped,
    Starting,
    Stopping,
    Unknown,
}

/// A container runtime the host can reach (a podman machine, a native socket, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProviderConnection {
    pub name: String,
    pub status: ConnectionStatus,
    /// Unset for a natively installed engine
    #[serde(default)]
    pub vm_type: Option<VmType>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl ContainerProviderConnection {
    pub fn new(name: impl Into<String>, vm_type: Option<VmType>) -> Self {
        Self {
            name: name.into(),
            status: ConnectionStatus::Started,
            vm_type,
            endpoint: None,
        }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == ConnectionStatus::Started
    }

    /// Backend the engine runs in; untagged connections are native
    pub fn vm_type(&self) -> VmType {
        self.vm_type.unwrap_or_default()
    }
}

/// Connection resolution collaborator
pub trait ConnectionRegistry: Send + Sync {
    fn get_named_connection(&self, name: &str) -> Option<ContainerProviderConnection>;

    fn get_any_running_connection(&self) -> Option<ContainerProviderConnection>;
}

/// A pulled image, as known to one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// Image id, used as the `Image` of the container spec
    pub id: String,
    pub engine_id: String,
    #[serde(default)]
    pub repo_tags: Vec<String>,
}

impl ImageInfo {
    pub fn new(id: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            engine_id: engine_id.into(),
            repo_tags: Vec::new(),
        }
    }
}

/// Identity of a container the engine created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedContainer {
    pub engine_id: String,
    pub id: String,
}

/// Container engine collaborator
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Pull `image` through `connection` (no-op if already present)
    async fn pull_image(
        &self,
        connection: &ContainerProviderConnection,
        image: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<ImageInfo, EngineError>;

    /// Create and start a container on engine `engine_id`
    async fn create_container(
        &self,
        engine_id: &str,
        spec: &ContainerSpec,
        labels: &BTreeMap<String, String>,
    ) -> Result<CreatedContainer, EngineError>;
}
