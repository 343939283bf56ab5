//! Container spec synthesis

use crate::acceleration::AccelerationPlan;
use crate::container::{
    ContainerSpec, DISABLE_SELINUX_LABEL_SECURITY_OPTION, EmptyObject, HealthCheck, HostConfig,
    INTERNAL_PORT, Mount, PortBinding,
};
use crate::engine::ImageInfo;
use crate::error::{InferenceError, InferenceResult};
use crate::server::{InferenceServerConfig, LABEL_INFERENCE_SERVER};
use std::collections::BTreeMap;

/// Directory the model file is mounted under inside the container
pub const MODELS_DIR: &str = "/models";

/// Label linking to the extension's API documentation for this server
pub const DOCS_LABEL: &str = "docs";
/// Label holding the OpenAI-compatible endpoint of this server
pub const API_LABEL: &str = "api";

/// Build the container spec for `config`.
///
/// `plan` is the resolved GPU acceleration, if any; without one the spec has
/// no device, device request, entrypoint, command or user fields at all.
/// `api_port` is the extension REST API port used in the docs label.
pub fn build_container_spec(
    config: &InferenceServerConfig,
    image: &ImageInfo,
    plan: Option<&AccelerationPlan>,
    api_port: u16,
) -> InferenceResult<ContainerSpec> {
    let model = config.single_model()?;
    let file = model.file.as_ref().ok_or_else(|| {
        InferenceError::configuration(format!("the model {} has no local file", model.id))
    })?;

    let model_ids: Vec<&str> = config.models.iter().map(|m| m.id.as_str()).collect();
    let mut labels = config.labels.clone();
    labels.insert(
        LABEL_INFERENCE_SERVER.to_string(),
        serde_json::to_string(&model_ids)
            .map_err(|e| InferenceError::configuration(e.to_string()))?,
    );

    // Mount the file, not its directory, so sibling files stay out of the container
    let target = format!("{MODELS_DIR}/{}", file.file);
    let mut mounts = vec![Mount::bind(model.mount_path()?, target.clone())];

    let mut env = vec![
        format!("MODEL_PATH={target}"),
        "HOST=0.0.0.0".to_string(),
        format!("PORT={INTERNAL_PORT}"),
    ];
    env.extend(model.properties_for_environment());

    let mut devices = Vec::new();
    let mut device_requests = Vec::new();
    let (mut entrypoint, mut cmd, mut user) = (None, None, None);

    if let Some(plan) = plan {
        mounts.extend(plan.mounts.iter().cloned());
        devices.extend(plan.devices.iter().cloned());
        device_requests.extend(plan.device_requests.iter().cloned());
        labels.extend(plan.labels.clone());
        env.extend(plan.env.iter().cloned());
        entrypoint = plan.entrypoint.clone();
        cmd = plan.cmd.clone();
        user = plan.user.clone();
    }

    labels.insert(
        DOCS_LABEL.to_string(),
        format!("http://localhost:{api_port}/api-docs/{}", config.port),
    );
    labels.insert(
        API_LABEL.to_string(),
        format!("http://localhost:{}/v1", config.port),
    );

    Ok(ContainerSpec {
        image: image.id.clone(),
        detach: true,
        entrypoint,
        cmd,
        user,
        exposed_ports: BTreeMap::from([(config.port.to_string(), EmptyObject {})]),
        host_config: HostConfig {
            auto_remove: false,
            devices,
            mounts,
            device_requests,
            security_opt: vec![DISABLE_SELINUX_LABEL_SECURITY_OPTION.to_string()],
            port_bindings: BTreeMap::from([(
                format!("{INTERNAL_PORT}/tcp"),
                vec![PortBinding {
                    host_port: config.port.to_string(),
                }],
            )]),
        },
        health_check: HealthCheck::llama_server(),
        labels,
        env,
    })
}
