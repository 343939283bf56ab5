//! Virtualization backends reported by container runtime connections

use serde::{Deserialize, Serialize};

/// The hypervisor or compatibility layer the container engine runs in.
///
/// `Unknown` is a natively installed engine on Linux (no VM at all); it is
/// also what a connection without a tag resolves to. Tags the runtime
/// reports that are not listed here deserialize to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VmType {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "wsl")]
    Wsl,
    #[serde(rename = "libkrun")]
    Libkrun,
    #[serde(rename = "GPU enabled (LibKrun)")]
    LibkrunLabel,
    #[serde(rename = "qemu")]
    Qemu,
    #[serde(rename = "applehv")]
    AppleHv,
    #[serde(rename = "default (Apple HyperVisor)")]
    AppleHvLabel,
    #[serde(rename = "hyperv")]
    HyperV,
    #[serde(rename = "other", other)]
    Other,
}

impl VmType {
    /// Every backend with a known runtime tag
    pub const ALL: [VmType; 8] = [
        VmType::Unknown,
        VmType::Wsl,
        VmType::Libkrun,
        VmType::LibkrunLabel,
        VmType::Qemu,
        VmType::AppleHv,
        VmType::AppleHvLabel,
        VmType::HyperV,
    ];

    /// Tag as reported by the container runtime
    pub fn as_str(self) -> &'static str {
        match self {
            VmType::Unknown => "unknown",
            VmType::Wsl => "wsl",
            VmType::Libkrun => "libkrun",
            VmType::LibkrunLabel => "GPU enabled (LibKrun)",
            VmType::Qemu => "qemu",
            VmType::AppleHv => "applehv",
            VmType::AppleHvLabel => "default (Apple HyperVisor)",
            VmType::HyperV => "hyperv",
            VmType::Other => "other",
        }
    }

    pub fn is_libkrun(self) -> bool {
        matches!(self, VmType::Libkrun | VmType::LibkrunLabel)
    }
}

impl std::fmt::Display for VmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        VmType::ALL
            .into_iter()
            .find(|vm| vm.as_str().eq_ignore_ascii_case(s))
            .or_else(|| match s.to_lowercase().as_str() {
                "" | "native" => Some(VmType::Unknown),
                "libkrun-label" => Some(VmType::LibkrunLabel),
                "applehv-label" => Some(VmType::AppleHvLabel),
                _ => None,
            })
            .ok_or_else(|| format!("unknown virtualization backend: {s}"))
    }
}
