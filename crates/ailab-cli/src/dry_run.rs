//! Offline collaborators for `ailab plan`
//!
//! The dry-run engine accepts every pull and creation without contacting a
//! container engine and keeps the spec it was given so it can be printed.

use ailab_inference::{
    ConnectionRegistry, ContainerEngine, ContainerProviderConnection, ContainerSpec,
    CreatedContainer, EngineError, GpuEnumerator, GpuInfo, ImageInfo, InferenceResult, VmType,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub const DRY_RUN_ENGINE_ID: &str = "dry-run";
pub const DRY_RUN_CONNECTION: &str = "dry-run";

/// One running connection with a fixed backend
pub struct StaticConnection {
    connection: ContainerProviderConnection,
}

impl StaticConnection {
    pub fn new(vm_type: VmType) -> Self {
        // A native engine reports no VM type at all
        let tag = (vm_type != VmType::Unknown).then_some(vm_type);
        Self {
            connection: ContainerProviderConnection::new(DRY_RUN_CONNECTION, tag),
        }
    }
}

impl ConnectionRegistry for StaticConnection {
    fn get_named_connection(&self, name: &str) -> Option<ContainerProviderConnection> {
        (name == self.connection.name).then(|| self.connection.clone())
    }

    fn get_any_running_connection(&self) -> Option<ContainerProviderConnection> {
        Some(self.connection.clone())
    }
}

/// A fixed GPU list
pub struct StaticGpus(pub Vec<GpuInfo>);

#[async_trait]
impl GpuEnumerator for StaticGpus {
    async fn list_gpus(&self) -> InferenceResult<Vec<GpuInfo>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct DryRunEngine {
    pulled: Mutex<Vec<String>>,
    created: Mutex<Option<ContainerSpec>>,
}

impl DryRunEngine {
    pub fn pulled_images(&self) -> Vec<String> {
        self.pulled.lock().clone()
    }

    pub fn created_spec(&self) -> Option<ContainerSpec> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl ContainerEngine for DryRunEngine {
    async fn pull_image(
        &self,
        connection: &ContainerProviderConnection,
        image: &str,
        _labels: &BTreeMap<String, String>,
    ) -> Result<ImageInfo, EngineError> {
        tracing::debug!(connection = %connection.name, image, "dry-run pull");
        self.pulled.lock().push(image.to_string());
        let mut info = ImageInfo::new(image, DRY_RUN_ENGINE_ID);
        info.repo_tags.push(image.to_string());
        Ok(info)
    }

    async fn create_container(
        &self,
        engine_id: &str,
        spec: &ContainerSpec,
        _labels: &BTreeMap<String, String>,
    ) -> Result<CreatedContainer, EngineError> {
        *self.created.lock() = Some(spec.clone());
        Ok(CreatedContainer {
            engine_id: engine_id.to_string(),
            id: "dry-run".to_string(),
        })
    }
}
