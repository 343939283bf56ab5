//! NVIDIA Container Device Interface detection
//!
//! A natively installed engine can only hand an NVIDIA GPU to a container when
//! a CDI spec has been generated on the host (`nvidia-ctk cdi generate`).

use crate::gpu::{GpuInfo, GpuVendor};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where `nvidia-ctk` writes the CDI spec, checked in order
pub const NVIDIA_CDI_LOCATIONS: &[&str] = &["/etc/cdi/nvidia.yaml", "/var/run/cdi/nvidia.yaml"];

/// Existence check used by the probe
pub type PathProbe = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Checks whether NVIDIA CDI is configured on the host.
#[derive(Clone)]
pub struct CdiProbe {
    locations: Vec<String>,
    exists: PathProbe,
}

impl fmt::Debug for CdiProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdiProbe")
            .field("locations", &self.locations)
            .finish_non_exhaustive()
    }
}

impl Default for CdiProbe {
    fn default() -> Self {
        Self::with_path_probe(Arc::new(|path: &Path| path.exists()))
    }
}

impl CdiProbe {
    /// Probe the real filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the default locations with a custom existence check
    pub fn with_path_probe(exists: PathProbe) -> Self {
        Self {
            locations: NVIDIA_CDI_LOCATIONS.iter().map(|s| s.to_string()).collect(),
            exists,
        }
    }

    /// A probe answering `configured` for every path
    pub fn fixed(configured: bool) -> Self {
        Self::with_path_probe(Arc::new(move |_: &Path| configured))
    }

    /// Replace the list of locations
    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// First location holding a CDI spec, if any
    pub fn configured_location(&self) -> Option<&str> {
        self.locations
            .iter()
            .find(|location| (self.exists)(Path::new(location.as_str())))
            .map(String::as_str)
    }

    /// True when `gpu` is an NVIDIA GPU and a CDI spec exists.
    ///
    /// The filesystem is not touched for other vendors or without a GPU.
    pub fn is_acceleration_configured(&self, gpu: Option<&GpuInfo>) -> bool {
        match gpu {
            Some(gpu) if gpu.vendor == GpuVendor::Nvidia => self.configured_location().is_some(),
            _ => false,
        }
    }
}
