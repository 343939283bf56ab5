//! GPU descriptors and host GPU enumeration
//!
//! Enumeration uses process and sysfs probes instead of linking to vendor
//! libraries, so the crate builds the same on hosts with or without a GPU.

use crate::error::{InferenceError, InferenceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How long `nvidia-smi` may take before it is treated as absent
pub const NVIDIA_SMI_TIMEOUT: Duration = Duration::from_secs(10);

/// GPU vendors the acceleration recipes know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl GpuVendor {
    /// Map a PCI vendor id (`0x10de`, ...) to a vendor
    pub fn from_pci_id(id: &str) -> Self {
        match id.trim().trim_start_matches("0x").to_lowercase().as_str() {
            "10de" => Self::Nvidia,
            "1002" => Self::Amd,
            "8086" => Self::Intel,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "NVIDIA"),
            GpuVendor::Amd => write!(f, "AMD"),
            GpuVendor::Intel => write!(f, "Intel"),
            GpuVendor::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for GpuVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvidia" => Ok(Self::Nvidia),
            "amd" => Ok(Self::Amd),
            "intel" => Ok(Self::Intel),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(format!("unknown GPU vendor: {other}")),
        }
    }
}

/// A GPU reported by the enumeration collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    /// Human-readable model name, e.g. `NVIDIA GeForce RTX 4090`
    pub model: String,
}

impl GpuInfo {
    pub fn new(vendor: GpuVendor, model: impl Into<String>) -> Self {
        Self {
            vendor,
            model: model.into(),
        }
    }
}

/// Pick the GPU a server is launched with.
///
/// The first GPU with a recognized vendor wins; when every vendor is
/// unknown, the first GPU overall is used. `None` only for an empty list.
pub fn select_gpu(gpus: &[GpuInfo]) -> Option<&GpuInfo> {
    gpus.iter()
        .find(|gpu| gpu.vendor.is_known())
        .or_else(|| gpus.first())
}

/// GPU enumeration collaborator
#[async_trait]
pub trait GpuEnumerator: Send + Sync {
    async fn list_gpus(&self) -> InferenceResult<Vec<GpuInfo>>;
}

/// Enumerates GPUs of the local Linux host.
///
/// NVIDIA cards are listed through `nvidia-smi` so their marketing names are
/// available; other vendors are found by scanning the DRM class in sysfs.
#[derive(Debug, Clone)]
pub struct HostGpuEnumerator {
    drm_root: PathBuf,
    nvidia_smi: PathBuf,
    smi_timeout: Duration,
}

impl Default for HostGpuEnumerator {
    fn default() -> Self {
        Self {
            drm_root: PathBuf::from("/sys/class/drm"),
            nvidia_smi: PathBuf::from("nvidia-smi"),
            smi_timeout: NVIDIA_SMI_TIMEOUT,
        }
    }
}

impl HostGpuEnumerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a different sysfs DRM root
    pub fn with_drm_root(drm_root: impl Into<PathBuf>) -> Self {
        Self {
            drm_root: drm_root.into(),
            ..Self::default()
        }
    }

    /// Run a different `nvidia-smi` binary, bounded by `timeout`
    pub fn with_nvidia_smi(mut self, program: impl Into<PathBuf>, timeout: Duration) -> Self {
        self.nvidia_smi = program.into();
        self.smi_timeout = timeout;
        self
    }

    async fn nvidia_smi_names(&self) -> Vec<String> {
        let output = tokio::process::Command::new(&self.nvidia_smi)
            .args(["--query-gpu=name", "--format=csv,noheader"])
            .kill_on_drop(true)
            .output();

        let Ok(output) = tokio::time::timeout(self.smi_timeout, output).await else {
            tracing::warn!(timeout = ?self.smi_timeout, "nvidia-smi timed out");
            return Vec::new();
        };

        match output {
            Ok(out) if out.status.success() => {
                parse_nvidia_smi_names(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                tracing::debug!(status = %out.status, "nvidia-smi exited unsuccessfully");
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "nvidia-smi not available");
                Vec::new()
            }
        }
    }

    fn drm_vendors(&self) -> Vec<(String, GpuVendor)> {
        let Ok(entries) = std::fs::read_dir(&self.drm_root) else {
            return Vec::new();
        };

        let mut cards: Vec<(String, GpuVendor)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !is_card_node(&name) {
                    return None;
                }
                let vendor = std::fs::read_to_string(entry.path().join("device/vendor")).ok()?;
                Some((name, GpuVendor::from_pci_id(&vendor)))
            })
            .collect();
        cards.sort_by(|a, b| a.0.cmp(&b.0));
        cards
    }
}

#[async_trait]
impl GpuEnumerator for HostGpuEnumerator {
    async fn list_gpus(&self) -> InferenceResult<Vec<GpuInfo>> {
        let mut gpus: Vec<GpuInfo> = self
            .nvidia_smi_names()
            .await
            .into_iter()
            .map(|name| GpuInfo::new(GpuVendor::Nvidia, name))
            .collect();

        let root = self.clone();
        let cards = tokio::task::spawn_blocking(move || root.drm_vendors())
            .await
            .map_err(|e| InferenceError::Gpu(e.to_string()))?;

        // NVIDIA cards already came from nvidia-smi with better names.
        let has_smi = !gpus.is_empty();
        for (card, vendor) in cards {
            if vendor == GpuVendor::Nvidia && has_smi {
                continue;
            }
            gpus.push(GpuInfo::new(vendor, format!("{vendor} GPU ({card})")));
        }

        tracing::debug!(count = gpus.len(), "enumerated host GPUs");
        Ok(gpus)
    }
}

/// Parse `nvidia-smi --query-gpu=name --format=csv,noheader` output
pub fn parse_nvidia_smi_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `card0`, `card1`, ... but not connector nodes such as `card0-HDMI-A-1`
fn is_card_node(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}
