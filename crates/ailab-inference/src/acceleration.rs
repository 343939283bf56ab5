//! GPU capability resolution
//!
//! [`recipe_for`] is the only place deciding whether a (backend, GPU) pair can
//! be accelerated. Both the container spec and the image choice are derived
//! from its answer, so they cannot disagree.
//!
//! | backend            | GPU                      | recipe           |
//! |--------------------|--------------------------|------------------|
//! | WSL                | NVIDIA                   | `WslPassthrough` |
//! | libkrun (both)     | any                      | `RenderNode`     |
//! | native (`unknown`) | NVIDIA with CDI spec     | `NvidiaCdi`      |
//! | anything else      |                          | unsupported      |

use crate::cdi::CdiProbe;
use crate::container::{Device, DeviceRequest, Mount};
use crate::gpu::{GpuInfo, GpuVendor};
use crate::images::ImageFlavor;
use crate::vm::VmType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layers offloaded to the GPU when the server config does not say
pub const DEFAULT_GPU_LAYERS: u32 = 999;

/// Label recording the GPU model a server was started with
pub const GPU_LABEL: &str = "gpu";

/// `root` inside the container
pub const PRIVILEGED_USER: &str = "0";

/// CDI name of every NVIDIA GPU on the host
pub const NVIDIA_CDI_DEVICE: &str = "nvidia.com/gpu=all";

const WSL_LIB_DIR: &str = "/usr/lib/wsl";
const WSL_DXG_DEVICE: &str = "/dev/dxg";
const DRI_DEVICE: &str = "/dev/dri";
const WSL_SHELL: &str = "/usr/bin/sh";
const WSL_LINK_AND_START: &str = r#"/usr/bin/ln -sfn /usr/lib/wsl/lib/* /usr/lib64/ && PATH="${PATH}:/usr/lib/wsl/lib/" && /usr/bin/llama-server.sh"#;

/// How a GPU is handed to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccelerationRecipe {
    /// WSL: DirectX kernel device plus the host's driver libraries, which the
    /// entrypoint links into the container's library path before starting
    WslPassthrough,
    /// libkrun: the virtio-gpu DRM render node
    RenderNode,
    /// Native Linux: the NVIDIA CDI device
    NvidiaCdi,
}

impl AccelerationRecipe {
    /// Serving image variant the recipe needs
    pub fn image_flavor(self) -> ImageFlavor {
        match self {
            AccelerationRecipe::WslPassthrough | AccelerationRecipe::NvidiaCdi => ImageFlavor::Cuda,
            // The render node is driven through Vulkan by the default image
            AccelerationRecipe::RenderNode => ImageFlavor::Default,
        }
    }

    /// Expand the recipe into the container fields it adds
    pub fn plan(self, gpu: &GpuInfo, gpu_layers: Option<u32>) -> AccelerationPlan {
        let mut plan = AccelerationPlan {
            recipe: self,
            devices: Vec::new(),
            mounts: Vec::new(),
            device_requests: vec![DeviceRequest::all_gpus()],
            entrypoint: None,
            cmd: None,
            user: None,
            labels: BTreeMap::from([(GPU_LABEL.to_string(), gpu.model.clone())]),
            env: vec![format!(
                "GPU_LAYERS={}",
                gpu_layers.unwrap_or(DEFAULT_GPU_LAYERS)
            )],
        };

        match self {
            AccelerationRecipe::WslPassthrough => {
                plan.mounts.push(Mount::bind(WSL_LIB_DIR, WSL_LIB_DIR));
                plan.devices.push(Device {
                    path_on_host: WSL_DXG_DEVICE.to_string(),
                    path_in_container: WSL_DXG_DEVICE.to_string(),
                    cgroup_permissions: "r".to_string(),
                });
                plan.user = Some(PRIVILEGED_USER.to_string());
                plan.entrypoint = Some(WSL_SHELL.to_string());
                plan.cmd = Some(vec!["-c".to_string(), WSL_LINK_AND_START.to_string()]);
            }
            AccelerationRecipe::RenderNode => {
                plan.devices.push(Device {
                    path_on_host: DRI_DEVICE.to_string(),
                    path_in_container: DRI_DEVICE.to_string(),
                    cgroup_permissions: String::new(),
                });
            }
            AccelerationRecipe::NvidiaCdi => {
                plan.devices.push(Device {
                    path_on_host: NVIDIA_CDI_DEVICE.to_string(),
                    path_in_container: String::new(),
                    cgroup_permissions: String::new(),
                });
                plan.user = Some(PRIVILEGED_USER.to_string());
            }
        }

        plan
    }
}

impl std::fmt::Display for AccelerationRecipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccelerationRecipe::WslPassthrough => write!(f, "wsl-passthrough"),
            AccelerationRecipe::RenderNode => write!(f, "render-node"),
            AccelerationRecipe::NvidiaCdi => write!(f, "nvidia-cdi"),
        }
    }
}

/// A GPU that cannot be used on the resolved backend.
///
/// Not an error: the server still launches, CPU-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedAcceleration {
    pub gpu_model: String,
    pub vendor: GpuVendor,
    pub vm_type: VmType,
    pub reason: &'static str,
}

impl std::fmt::Display for UnsupportedAcceleration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gpu {} is not supported on {}: {}",
            self.gpu_model, self.vm_type, self.reason
        )
    }
}

/// Devices, mounts and overrides exposing a GPU to the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccelerationPlan {
    pub recipe: AccelerationRecipe,
    pub devices: Vec<Device>,
    pub mounts: Vec<Mount>,
    pub device_requests: Vec<DeviceRequest>,
    pub entrypoint: Option<String>,
    pub cmd: Option<Vec<String>>,
    pub user: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
}

impl AccelerationPlan {
    pub fn image_flavor(&self) -> ImageFlavor {
        self.recipe.image_flavor()
    }
}

/// Decide how (and whether) `gpu` can be used on `vm_type`.
pub fn recipe_for(
    vm_type: VmType,
    gpu: &GpuInfo,
    cdi: &CdiProbe,
) -> Result<AccelerationRecipe, UnsupportedAcceleration> {
    let unsupported = |reason: &'static str| UnsupportedAcceleration {
        gpu_model: gpu.model.clone(),
        vendor: gpu.vendor,
        vm_type,
        reason,
    };

    match vm_type {
        VmType::Wsl if gpu.vendor == GpuVendor::Nvidia => Ok(AccelerationRecipe::WslPassthrough),
        VmType::Wsl => Err(unsupported("WSL only passes NVIDIA GPUs through")),
        VmType::Libkrun | VmType::LibkrunLabel => Ok(AccelerationRecipe::RenderNode),
        VmType::Unknown if cdi.is_acceleration_configured(Some(gpu)) => {
            Ok(AccelerationRecipe::NvidiaCdi)
        }
        VmType::Unknown => Err(unsupported(
            "native Linux requires an NVIDIA GPU with CDI configured",
        )),
        VmType::Qemu
        | VmType::AppleHv
        | VmType::AppleHvLabel
        | VmType::HyperV
        | VmType::Other => {
            Err(unsupported("backend has no GPU passthrough"))
        }
    }
}

/// Resolve the acceleration plan for a launch.
///
/// `None` without a GPU, or when the pair is unsupported; the latter is
/// logged at warn level and the launch proceeds CPU-only.
pub fn resolve_acceleration(
    vm_type: VmType,
    gpu: Option<&GpuInfo>,
    cdi: &CdiProbe,
    gpu_layers: Option<u32>,
) -> Option<AccelerationPlan> {
    let gpu = gpu?;
    match recipe_for(vm_type, gpu, cdi) {
        Ok(recipe) => {
            tracing::debug!(%vm_type, gpu = %gpu.model, %recipe, "GPU acceleration resolved");
            Some(recipe.plan(gpu, gpu_layers))
        }
        Err(unsupported) => {
            tracing::warn!(
                %vm_type,
                gpu = %unsupported.gpu_model,
                vendor = %unsupported.vendor,
                "{unsupported}"
            );
            None
        }
    }
}
