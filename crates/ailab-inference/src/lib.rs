//! # ailab-inference
//!
//! Launch planning for local llama.cpp inference servers running in
//! containers, across native Linux, WSL and libkrun container engines and
//! NVIDIA, other or no GPUs.
//!
//! Given a server config, the detected GPU and the connection's
//! virtualization backend, the crate decides whether GPU acceleration is
//! usable, picks the serving image and synthesizes the container spec
//! (mounts, devices, environment, health check, ports, labels).
//!
//! | Backend        | GPU                   | Result                                  |
//! |----------------|-----------------------|-----------------------------------------|
//! | WSL            | NVIDIA                | CUDA image, `/dev/dxg`, WSL libraries   |
//! | libkrun        | any                   | default image, `/dev/dri`               |
//! | native Linux   | NVIDIA + CDI spec     | CUDA image, `nvidia.com/gpu=all`        |
//! | anything else  |                       | default image, CPU only                 |
//!
//! GPU enumeration, connections and the container engine are collaborators
//! behind traits ([`GpuEnumerator`], [`ConnectionRegistry`], [`ContainerEngine`],
//! [`ConfigurationSource`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ailab_inference::{CdiProbe, ImageCatalog, VmType, GpuInfo, GpuVendor};
//!
//! let gpu = GpuInfo::new(GpuVendor::Nvidia, "NVIDIA GeForce RTX 4090");
//! let image = ImageCatalog::default().select(VmType::Wsl, Some(&gpu), &CdiProbe::new()).to_string();
//! println!("{image}");
//! ```

pub mod acceleration;
pub mod builder;
pub mod cdi;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod images;
pub mod model;
pub mod provider;
pub mod server;
pub mod task;
pub mod vm;

pub use acceleration::{
    AccelerationPlan, AccelerationRecipe, DEFAULT_GPU_LAYERS, UnsupportedAcceleration, recipe_for,
    resolve_acceleration,
};
pub use builder::build_container_spec;
pub use cdi::{CdiProbe, PathProbe};
pub use config::{ConfigurationSource, ExtensionConfiguration};
pub use container::ContainerSpec;
pub use engine::{
    ConnectionRegistry, ConnectionStatus, ContainerEngine, ContainerProviderConnection,
    CreatedContainer, ImageInfo,
};
pub use error::{EngineError, InferenceError, InferenceResult};
pub use gpu::{GpuEnumerator, GpuInfo, GpuVendor, HostGpuEnumerator, select_gpu};
pub use images::{ImageCatalog, ImageFlavor};
pub use model::{LocalModelFile, ModelInfo};
pub use provider::{InferenceProvider, LlamaCppProvider};
pub use server::{InferenceServer, InferenceServerConfig, InferenceType, ServerStatus};
pub use task::{Task, TaskRegistry, TaskState};
pub use vm::VmType;
