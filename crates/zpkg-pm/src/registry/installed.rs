use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

use super::SoftwareRegistry;
use crate::package::{InstallationRecord, PackageIdentity};
use crate::{InstallError, Result};

/// On-disk layout of installed.json
#[derive(Debug, Default, Serialize, Deserialize)]
struct InstalledJson {
    #[serde(default)]
    installed: Vec<InstallationRecord>,
}

fn upsert(records: &mut Vec<InstallationRecord>, record: &InstallationRecord) {
    records.retain(|existing| existing.installed_path != record.installed_path);
    records.push(record.clone());
    records.sort_by(|a, b| a.installed_path.cmp(&b.installed_path));
}

fn remove_matching(records: &mut Vec<InstallationRecord>, identity_token: &str) -> bool {
    let installed_path = PackageIdentity::decode(identity_token)
        .ok()
        .filter(|identity| identity.has_installed_path())
        .map(|identity| identity.installed_path);

    let before = records.len();
    records.retain(|record| {
        record.identity_token != identity_token
            && installed_path.as_deref() != Some(record.installed_path.as_path())
    });
    records.len() != before
}

/// Registry kept in memory only
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<Vec<InstallationRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SoftwareRegistry for MemoryRegistry {
    async fn register(&self, record: &InstallationRecord) -> Result<()> {
        upsert(&mut *self.records.write().await, record);
        Ok(())
    }

    async fn deregister(&self, identity_token: &str) -> Result<bool> {
        Ok(remove_matching(&mut *self.records.write().await, identity_token))
    }

    async fn query(&self, installed_path: &Path) -> Result<Option<InstallationRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|record| record.installed_path == installed_path)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<InstallationRecord>> {
        Ok(self.records.read().await.clone())
    }
}

/// Registry persisted to an installed.json file
#[derive(Debug)]
pub struct JsonRegistry {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<InstallationRecord>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let data: InstalledJson = serde_json::from_str(&content).map_err(|e| {
            InstallError::Registry(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(data.installed)
    }

    async fn save(&self, installed: Vec<InstallationRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&InstalledJson { installed })?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl SoftwareRegistry for JsonRegistry {
    async fn register(&self, record: &InstallationRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        upsert(&mut records, record);
        self.save(records).await
    }

    async fn deregister(&self, identity_token: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if !remove_matching(&mut records, identity_token) {
            return Ok(false);
        }
        self.save(records).await?;
        Ok(true)
    }

    async fn query(&self, installed_path: &Path) -> Result<Option<InstallationRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|record| record.installed_path == installed_path))
    }

    async fn list(&self) -> Result<Vec<InstallationRecord>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }
}
