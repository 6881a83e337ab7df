//! Config store trait and the JSON file implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;

use super::error::{StoreError, StoreResult};
use super::model::ConfigDocument;

/// Persistence for the configuration document.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the active configuration.
    async fn load(&self) -> StoreResult<ConfigDocument>;

    /// Merge `doc` with defaults, persist it, and return the merged form.
    async fn save(&self, doc: ConfigDocument) -> StoreResult<ConfigDocument>;
}

/// Stores the document as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, doc: &ConfigDocument) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, body).await?;
        Ok(())
    }

    /// Create the file with defaults if it does not exist yet.
    async fn ensure(&self) -> StoreResult<()> {
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        debug!("Creating default config at {}", self.path.display());
        self.write(&ConfigDocument::defaults()).await
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> StoreResult<ConfigDocument> {
        self.ensure().await?;
        let raw = fs::read_to_string(&self.path).await?;
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Config at {} is not valid JSON ({}), resetting to defaults",
                    self.path.display(),
                    e
                );
                let fallback = ConfigDocument::defaults();
                self.write(&fallback).await?;
                return Ok(fallback);
            }
        };
        // Well-formed JSON is never overwritten, even if it does not fit the model.
        serde_json::from_value(value).map_err(StoreError::Shape)
    }

    async fn save(&self, doc: ConfigDocument) -> StoreResult<ConfigDocument> {
        let merged = doc.with_defaults();
        merged.validate().map_err(StoreError::Invalid)?;
        self.write(&merged).await?;
        Ok(merged)
    }
}
