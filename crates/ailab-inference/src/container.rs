//! Container creation descriptor
//!
//! Field names serialize in the engine's PascalCase JSON shape so the value can
//! be handed to a Docker/Podman compatible `POST /containers/create` unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One second in the engine's duration unit (nanoseconds)
pub const SECOND: u64 = 1_000_000_000;

/// Port the llama.cpp server listens on inside the container
pub const INTERNAL_PORT: u16 = 8000;

/// SELinux relabelling would rewrite the labels of the model file on the host
pub const DISABLE_SELINUX_LABEL_SECURITY_OPTION: &str = "label=disable";

/// Complete description of the container to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSpec {
    pub image: String,
    pub detach: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub exposed_ports: BTreeMap<String, EmptyObject>,
    pub host_config: HostConfig,
    pub health_check: HealthCheck,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
}

/// Serializes as `{}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    pub auto_remove: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,
    pub mounts: Vec<Mount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_requests: Vec<DeviceRequest>,
    pub security_opt: Vec<String>,
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
}

/// Bind mount from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mount {
    pub target: String,
    pub source: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

impl Mount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            kind: "bind".to_string(),
        }
    }
}

/// Device node (or CDI device name) exposed to the container.
///
/// A CDI device carries the qualified name in `path_on_host` and leaves the
/// other two fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    pub path_on_host: String,
    pub path_in_container: String,
    pub cgroup_permissions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceRequest {
    pub capabilities: Vec<Vec<String>>,
    /// `-1` requests every device
    pub count: i64,
}

impl DeviceRequest {
    pub fn all_gpus() -> Self {
        Self {
            capabilities: vec![vec!["gpu".to_string()]],
            count: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    pub host_port: String,
}

/// Health check run by the engine inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    pub test: Vec<String>,
    /// Nanoseconds between probes
    pub interval: u64,
    pub retries: u32,
}

impl HealthCheck {
    /// Probe interval in seconds
    pub const INTERVAL_SECS: u64 = 5;
    /// The server gets `RETRY_WINDOW_SECS` worth of failed probes before it is unhealthy
    pub const RETRY_WINDOW_SECS: u32 = 4 * 5;

    /// curl the llama.cpp server on the port *inside* the container
    pub fn llama_server() -> Self {
        Self {
            test: vec![
                "CMD-SHELL".to_string(),
                format!("curl -sSf localhost:{INTERNAL_PORT} > /dev/null"),
            ],
            interval: SECOND * Self::INTERVAL_SECS,
            retries: Self::RETRY_WINDOW_SECS,
        }
    }

    /// Upper bound on time to detect an unhealthy server
    pub fn detection_window(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.interval * u64::from(self.retries))
    }
}
