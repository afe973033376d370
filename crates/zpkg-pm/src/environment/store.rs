//! Key/value stores holding path-list variables.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::{InstallError, Result};

/// Which persisted store a path-list mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentScope {
    #[default]
    AllUsers,
    CurrentUser,
}

impl EnvironmentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentScope::AllUsers => "all-users",
            EnvironmentScope::CurrentUser => "current-user",
        }
    }
}

impl fmt::Display for EnvironmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentScope {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "all-users" | "allusers" | "machine" => Ok(EnvironmentScope::AllUsers),
            "current-user" | "currentuser" | "user" => Ok(EnvironmentScope::CurrentUser),
            other => Err(InstallError::Config(format!("Unknown scope '{}'", other))),
        }
    }
}

/// A place where environment variables persist.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Environment of the running process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl KeyValueStore for ProcessEnvironment {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(std::env::var(key).ok())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        std::env::set_var(key, value);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.set(key, value);
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, value);
        Ok(())
    }
}

/// Variables persisted as a flat JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        Ok(())
    }
}

/// The three stores a path-list mutation may touch
#[derive(Clone)]
pub struct EnvironmentStores {
    pub process: Arc<dyn KeyValueStore>,
    pub machine: Arc<dyn KeyValueStore>,
    pub user: Arc<dyn KeyValueStore>,
}

impl EnvironmentStores {
    pub fn new(
        process: Arc<dyn KeyValueStore>,
        machine: Arc<dyn KeyValueStore>,
        user: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self { process, machine, user }
    }

    /// Stores that live only as long as the returned value
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn scope(&self, scope: EnvironmentScope) -> &Arc<dyn KeyValueStore> {
        match scope {
            EnvironmentScope::AllUsers => &self.machine,
            EnvironmentScope::CurrentUser => &self.user,
        }
    }
}
