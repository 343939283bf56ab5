//! Model references served by an inference container

use crate::error::{InferenceError, InferenceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Local copy of a model's weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalModelFile {
    /// Directory holding the file on the host
    pub path: String,
    /// File name, e.g. `granite-7b-lab-Q4_K_M.gguf`
    pub file: String,
}

/// A model as declared in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `None` until the model has been downloaded
    #[serde(default)]
    pub file: Option<LocalModelFile>,
    /// Serving hints, e.g. `chatFormat = "openchat"`
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            file: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, dir: impl Into<String>, file: impl Into<String>) -> Self {
        self.file = Some(LocalModelFile {
            path: dir.into(),
            file: file.into(),
        });
        self
    }

    /// Split a full path into directory and file name
    pub fn with_file_path(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let dir = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with_file(dir, file)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Host path of the weights file, to be bind-mounted into the container
    pub fn mount_path(&self) -> InferenceResult<String> {
        let file = self.file.as_ref().ok_or_else(|| {
            InferenceError::configuration(format!("model {} is not available locally", self.id))
        })?;
        Ok(Path::new(&file.path).join(&file.file).display().to_string())
    }

    /// `MODEL_<KEY>=<value>` for each property, camelCase keys in SCREAMING_SNAKE
    pub fn properties_for_environment(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|(key, value)| format!("MODEL_{}={}", screaming_snake(key), value))
            .collect()
    }
}

fn screaming_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}
