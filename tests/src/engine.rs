use ailab_inference::{
    ContainerEngine, ContainerProviderConnection, ContainerSpec, CreatedContainer, EngineError,
    ImageInfo,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MOCK_ENGINE_ID: &str = "podman.mock";
pub const MOCK_CONTAINER_ID: &str = "c0ffee";

/// A call made to the mock engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Pull {
        connection: String,
        image: String,
        labels: BTreeMap<String, String>,
    },
    Create {
        engine_id: String,
        spec: Box<ContainerSpec>,
        labels: BTreeMap<String, String>,
    },
}

/// Container engine recording pulls and creations.
///
/// Pulls resolve to an image whose id is `sha256:<image>`.
#[derive(Clone, Default)]
pub struct MockContainerEngine {
    pull_failure: Arc<RwLock<Option<EngineError>>>,
    create_failure: Arc<RwLock<Option<EngineError>>>,
    /// Every call, in order
    pub call_history: Arc<RwLock<Vec<EngineCall>>>,
}

impl MockContainerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_pull(&self, error: EngineError) {
        *self.pull_failure.write().await = Some(error);
    }

    pub async fn fail_create(&self, error: EngineError) {
        *self.create_failure.write().await = Some(error);
    }

    pub async fn history(&self) -> Vec<EngineCall> {
        self.call_history.read().await.clone()
    }

    pub async fn pulled_images(&self) -> Vec<String> {
        self.history()
            .await
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Pull { image, .. } => Some(image),
                _ => None,
            })
            .collect()
    }

    /// Spec of the last container created
    pub async fn last_spec(&self) -> Option<ContainerSpec> {
        self.history().await.into_iter().rev().find_map(|call| match call {
            EngineCall::Create { spec, .. } => Some(*spec),
            _ => None,
        })
    }
}

#[async_trait]
impl ContainerEngine for MockContainerEngine {
    async fn pull_image(
        &self,
        connection: &ContainerProviderConnection,
        image: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<ImageInfo, EngineError> {
        self.call_history.write().await.push(EngineCall::Pull {
            connection: connection.name.clone(),
            image: image.to_string(),
            labels: labels.clone(),
        });

        if let Some(err) = self.pull_failure.read().await.clone() {
            return Err(err);
        }
        let mut info = ImageInfo::new(format!("sha256:{image}"), MOCK_ENGINE_ID);
        info.repo_tags.push(image.to_string());
        Ok(info)
    }

    async fn create_container(
        &self,
        engine_id: &str,
        spec: &ContainerSpec,
        labels: &BTreeMap<String, String>,
    ) -> Result<CreatedContainer, EngineError> {
        self.call_history.write().await.push(EngineCall::Create {
            engine_id: engine_id.to_string(),
            spec: Box::new(spec.clone()),
            labels: labels.clone(),
        });

        if let Some(err) = self.create_failure.read().await.clone() {
            return Err(err);
        }
        Ok(CreatedContainer {
            engine_id: engine_id.to_string(),
            id: MOCK_CONTAINER_ID.to_string(),
        })
    }
}
