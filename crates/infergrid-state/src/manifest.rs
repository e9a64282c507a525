//! model.toml manifest parser.
//!
//! A manifest is the declarative input for a served model. Applying one
//! produces a [`Model`] record for the store; the scheduler then drives the
//! cluster toward its replica count.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model: ModelSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: String,
    /// Source URI (hf://, ollama://, file://, etc.)
    pub source: String,
    /// Desired instance count. Defaults to 1.
    pub replicas: Option<u32>,
    /// Labels a hosting worker must carry.
    pub selector: Option<HashMap<String, String>>,
}

impl ModelManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let manifest: ModelManifest = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.model.name.is_empty() {
            anyhow::bail!("model.name must not be empty");
        }
        if self.model.source.is_empty() {
            anyhow::bail!("model.source must not be empty");
        }
        if self.model.replicas == Some(0) {
            anyhow::bail!("model.replicas must be at least 1");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a minimal model.toml for the given model name.
    pub fn scaffold(name: &str, source: &str) -> Self {
        ModelManifest {
            model: ModelSection {
                name: name.to_string(),
                source: source.to_string(),
                replicas: Some(1),
                selector: None,
            },
        }
    }

    /// Materialize the desired-state record this manifest describes.
    pub fn into_model(self) -> Model {
        let now = epoch_secs();
        Model {
            id: self.model.name.clone(),
            name: self.model.name,
            source: self.model.source,
            replicas: self.model.replicas.unwrap_or(1),
            worker_selector: self.model.selector.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
