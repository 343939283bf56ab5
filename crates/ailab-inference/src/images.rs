//! Serving image selection

use crate::acceleration::{AccelerationPlan, recipe_for};
use crate::cdi::CdiProbe;
use crate::gpu::GpuInfo;
use crate::vm::VmType;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const IMAGES_JSON: &str = include_str!("../assets/inference-images.json");

// Plain mirror of the asset. It must not go through `ImageCatalog`, whose
// serde defaults read `BUNDLED` and would re-enter this initializer.
#[derive(Deserialize)]
struct ImagesAsset {
    llamacpp: BundledImages,
}

#[derive(Deserialize)]
struct BundledImages {
    default: String,
    cuda: String,
}

static BUNDLED: LazyLock<ImageCatalog> = LazyLock::new(|| {
    let images = serde_json::from_str::<ImagesAsset>(IMAGES_JSON)
        .expect("bundled inference-images.json is valid")
        .llamacpp;
    ImageCatalog {
        default: images.default,
        cuda: images.cuda,
    }
});

/// Variant of the llama.cpp serving image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFlavor {
    Default,
    Cuda,
}

/// llama.cpp server images, one per flavor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCatalog {
    pub default: String,
    pub cuda: String,
}

impl Default for ImageCatalog {
    fn default() -> Self {
        BUNDLED.clone()
    }
}

impl ImageCatalog {
    pub fn image(&self, flavor: ImageFlavor) -> &str {
        match flavor {
            ImageFlavor::Default => &self.default,
            ImageFlavor::Cuda => &self.cuda,
        }
    }

    /// Image for an already resolved plan; CPU-only launches get the default image
    pub fn for_plan(&self, plan: Option<&AccelerationPlan>) -> &str {
        self.image(plan.map_or(ImageFlavor::Default, AccelerationPlan::image_flavor))
    }

    /// Image for a backend and optional GPU
    pub fn select(&self, vm_type: VmType, gpu: Option<&GpuInfo>, cdi: &CdiProbe) -> &str {
        let flavor = gpu
            .and_then(|gpu| recipe_for(vm_type, gpu, cdi).ok())
            .map_or(ImageFlavor::Default, |recipe| recipe.image_flavor());
        self.image(flavor)
    }
}
