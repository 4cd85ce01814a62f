use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::PlanStorage;
use crate::error::StorageResult;
use crate::mitigation::MitigationPlan;

/// Plan storage in a single pretty-printed JSON document.
///
/// The document is an object mapping plan id to plan. Saves go to a sibling
/// temp file which is then renamed over the target, so a crash mid-write
/// leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage backed by the document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mitigation_plans.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PlanStorage for JsonFileStorage {
    async fn load(&self) -> StorageResult<HashMap<String, MitigationPlan>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No plan document yet");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, plans: &HashMap<String, MitigationPlan>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let document = serde_json::to_string_pretty(plans)?;
        let temp = self.temp_path();
        fs::write(&temp, document).await?;
        fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), plans = plans.len(), "Saved mitigation plans");
        Ok(())
    }
}
