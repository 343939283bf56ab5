//! llama.cpp inference provider
//!
//! Runs the launch sequence: pick a GPU, resolve the connection and its
//! backend, choose and pull the image, build the container spec and ask the
//! engine to create the container. Every failure aborts the launch; nothing
//! is retried here.

use crate::acceleration::{AccelerationPlan, resolve_acceleration};
use crate::builder::build_container_spec;
use crate::cdi::CdiProbe;
use crate::config::ConfigurationSource;
use crate::container::ContainerSpec;
use crate::engine::{
    ConnectionRegistry, ContainerEngine, ContainerProviderConnection, CreatedContainer, ImageInfo,
};
use crate::error::{InferenceError, InferenceResult};
use crate::gpu::{GpuEnumerator, GpuInfo, select_gpu};
use crate::images::ImageCatalog;
use crate::server::{
    ContainerRef, InferenceServer, InferenceServerConfig, InferenceType, ServerConnection,
    ServerStatus,
};
use crate::task::TaskRegistry;
use crate::vm::VmType;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Something able to start an inference server from a config
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;

    fn inference_type(&self) -> InferenceType;

    fn enabled(&self) -> bool;

    async fn perform(&self, config: &InferenceServerConfig) -> InferenceResult<InferenceServer>;
}

/// Launches the llama.cpp python server in a container
pub struct LlamaCppProvider {
    connections: Arc<dyn ConnectionRegistry>,
    gpus: Arc<dyn GpuEnumerator>,
    configuration: Arc<dyn ConfigurationSource>,
    engine: Arc<dyn ContainerEngine>,
    tasks: Arc<TaskRegistry>,
    cdi: CdiProbe,
    images: ImageCatalog,
}

impl LlamaCppProvider {
    pub fn new(
        connections: Arc<dyn ConnectionRegistry>,
        gpus: Arc<dyn GpuEnumerator>,
        configuration: Arc<dyn ConfigurationSource>,
        engine: Arc<dyn ContainerEngine>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            connections,
            gpus,
            configuration,
            engine,
            tasks,
            cdi: CdiProbe::default(),
            images: ImageCatalog::default(),
        }
    }

    /// Replace the CDI probe (tests simulate configured hosts with this)
    pub fn with_cdi_probe(mut self, cdi: CdiProbe) -> Self {
        self.cdi = cdi;
        self
    }

    pub fn with_images(mut self, images: ImageCatalog) -> Self {
        self.images = images;
        self
    }

    pub fn images(&self) -> &ImageCatalog {
        &self.images
    }

    pub fn cdi_probe(&self) -> &CdiProbe {
        &self.cdi
    }

    /// Image the server would run with on `vm_type` and `gpu`
    pub fn inference_image(&self, vm_type: VmType, gpu: Option<&GpuInfo>) -> &str {
        self.images.select(vm_type, gpu, &self.cdi)
    }

    /// Acceleration plan for `vm_type` and `gpu`, if the pair is supported
    pub fn acceleration(
        &self,
        vm_type: VmType,
        gpu: Option<&GpuInfo>,
        gpu_layers: Option<u32>,
    ) -> Option<AccelerationPlan> {
        resolve_acceleration(vm_type, gpu, &self.cdi, gpu_layers)
    }

    /// Container spec for `config` running `image` on `vm_type`
    pub fn container_spec(
        &self,
        config: &InferenceServerConfig,
        image: &ImageInfo,
        vm_type: VmType,
        gpu: Option<&GpuInfo>,
    ) -> InferenceResult<ContainerSpec> {
        config.single_model()?;
        let plan = self.acceleration(vm_type, gpu, config.gpu_layers);
        build_container_spec(config, image, plan.as_ref(), self.configuration.api_port())
    }

    /// GPU to launch with, when the GPU experiment is on
    async fn resolve_gpu(&self) -> InferenceResult<Option<GpuInfo>> {
        if !self.configuration.is_gpu_experiment_enabled() {
            return Ok(None);
        }

        let gpus = self.gpus.list_gpus().await?;
        let gpu = select_gpu(&gpus)
            .cloned()
            .ok_or_else(|| InferenceError::configuration("no gpu was found"))?;

        tracing::info!(gpu = %gpu.model, vendor = %gpu.vendor, candidates = gpus.len(), "selected GPU");
        Ok(Some(gpu))
    }

    fn resolve_connection(
        &self,
        config: &InferenceServerConfig,
    ) -> InferenceResult<ContainerProviderConnection> {
        let connection = match config.connection.as_deref() {
            Some(name) => self.connections.get_named_connection(name),
            None => self.connections.get_any_running_connection(),
        };

        connection.ok_or_else(|| match config.connection.as_deref() {
            Some(name) => InferenceError::configuration(format!("connection {name} not found")),
            None => InferenceError::configuration("no running connection could be found"),
        })
    }

    async fn pull_image(
        &self,
        connection: &ContainerProviderConnection,
        image: &str,
        labels: &BTreeMap<String, String>,
    ) -> InferenceResult<ImageInfo> {
        let task = self.tasks.create_task(format!("Pulling {image}."), labels);
        match self.engine.pull_image(connection, image, labels).await {
            Ok(info) => {
                self.tasks.succeed(&task);
                Ok(info)
            }
            Err(e) => {
                self.tasks.fail(
                    &task,
                    format!("Something went wrong while pulling {image}: {e}"),
                );
                Err(e.into())
            }
        }
    }

    async fn create_container(
        &self,
        engine_id: &str,
        spec: &ContainerSpec,
        labels: &BTreeMap<String, String>,
    ) -> InferenceResult<CreatedContainer> {
        let task = self.tasks.create_task("Creating container.", labels);
        match self.engine.create_container(engine_id, spec, labels).await {
            Ok(created) => {
                self.tasks.succeed(&task);
                Ok(created)
            }
            Err(e) => {
                self.tasks.fail(
                    &task,
                    format!("Something went wrong while creating container: {e}"),
                );
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl InferenceProvider for LlamaCppProvider {
    fn name(&self) -> &str {
        "LLama-cpp"
    }

    fn inference_type(&self) -> InferenceType {
        InferenceType::LlamaCpp
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn perform(&self, config: &InferenceServerConfig) -> InferenceResult<InferenceServer> {
        if !self.enabled() {
            return Err(InferenceError::configuration("not enabled"));
        }

        let gpu = self.resolve_gpu().await?;
        let connection = self.resolve_connection(config)?;
        let vm_type = connection.vm_type();

        let plan = self.acceleration(vm_type, gpu.as_ref(), config.gpu_layers);
        let image = config
            .image
            .clone()
            .unwrap_or_else(|| self.images.for_plan(plan.as_ref()).to_string());

        tracing::info!(
            connection = %connection.name,
            %vm_type,
            %image,
            accelerated = plan.is_some(),
            "launching inference server"
        );

        let image_info = self.pull_image(&connection, &image, &config.labels).await?;

        let spec = build_container_spec(
            config,
            &image_info,
            plan.as_ref(),
            self.configuration.api_port(),
        )?;

        let created = self
            .create_container(&image_info.engine_id, &spec, &config.labels)
            .await?;

        tracing::info!(
            container = %created.id,
            engine = %created.engine_id,
            port = config.port,
            "inference server created"
        );

        Ok(InferenceServer {
            container: ContainerRef {
                engine_id: created.engine_id,
                container_id: created.id,
            },
            connection: ServerConnection { port: config.port },
            status: ServerStatus::Running,
            models: config.models.clone(),
            inference_type: InferenceType::LlamaCpp,
            labels: spec.labels,
        })
    }
}
