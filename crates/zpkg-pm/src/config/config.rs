use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::environment::{EnvironmentScope, EnvironmentStores, JsonFileStore, ProcessEnvironment};
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig};

pub const DEFAULT_PROVIDER_NAME: &str = "zpkg";
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Used when a descriptor does not name a destination
    pub destination: Option<PathBuf>,
    pub add_to_path: bool,
    pub remove_from_path: bool,
    pub scope: Option<EnvironmentScope>,
    pub provider_name: String,
    pub progress_interval_ms: u64,
    pub temp_dir: Option<PathBuf>,
    pub machine_environment_file: PathBuf,
    pub user_environment_file: PathBuf,
    pub registry_file: PathBuf,
    pub trust_all: bool,
    /// Proxy for http and https downloads
    pub http_proxy: Option<String>,

    #[serde(skip)]
    sources: Vec<ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_loader(&ConfigLoader::new(false))
    }
}

impl Config {
    fn with_loader(loader: &ConfigLoader) -> Self {
        Self {
            destination: None,
            add_to_path: false,
            remove_from_path: false,
            scope: None,
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            temp_dir: None,
            machine_environment_file: loader.get_machine_environment_file(),
            user_environment_file: loader.get_config_home().join("environment.json"),
            registry_file: loader.get_data_dir().join("installed.json"),
            trust_all: false,
            http_proxy: None,
            sources: vec![ConfigSource::Default],
        }
    }

    /// Layer defaults, the global config, an optional explicit file and the
    /// environment, in increasing priority.
    pub fn build(explicit_file: Option<&Path>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::with_loader(&loader);

        let global = loader.get_config_home().join("config.json");
        if global.exists() {
            log::debug!("Loading global config from {}", global.display());
            config.merge(loader.load_config_file(&global)?, ConfigSource::Global);
        }

        if let Some(path) = explicit_file {
            log::debug!("Loading config from {}", path.display());
            config.merge(loader.load_config_file(path)?, ConfigSource::File(path.to_path_buf()));
        }

        if use_environment {
            config.merge(loader.load_environment()?, ConfigSource::Environment("ZPKG_*".to_string()));
        }

        Ok(config)
    }

    /// Apply every key present in `raw`
    pub fn merge(&mut self, raw: RawConfig, source: ConfigSource) {
        if let Some(destination) = raw.destination {
            self.destination = Some(destination);
        }
        if let Some(add) = raw.add_to_path {
            self.add_to_path = add;
        }
        if let Some(remove) = raw.remove_from_path {
            self.remove_from_path = remove;
        }
        if let Some(scope) = raw.scope {
            self.scope = Some(scope);
        }
        if let Some(provider_name) = raw.provider_name {
            self.provider_name = provider_name;
        }
        if let Some(interval) = raw.progress_interval_ms {
            self.progress_interval_ms = interval.max(1);
        }
        if let Some(temp_dir) = raw.temp_dir {
            self.temp_dir = Some(temp_dir);
        }
        if let Some(file) = raw.machine_environment_file {
            self.machine_environment_file = file;
        }
        if let Some(file) = raw.user_environment_file {
            self.user_environment_file = file;
        }
        if let Some(file) = raw.registry_file {
            self.registry_file = file;
        }
        if let Some(trust_all) = raw.trust_all {
            self.trust_all = trust_all;
        }
        if let Some(proxy) = raw.http_proxy {
            self.http_proxy = Some(proxy);
        }
        self.sources.push(source);
    }

    /// Where the values came from, lowest priority first
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    pub fn install_options(&self) -> InstallOptions {
        InstallOptions {
            add_to_path: self.add_to_path,
            remove_from_path: self.remove_from_path,
            scope: self.scope,
            provider_name: self.provider_name.clone(),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            temp_dir: self.temp_dir.clone(),
            trust_all: self.trust_all,
        }
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        let config = HttpClientConfig::default();
        match &self.http_proxy {
            Some(proxy) => config.with_proxy(proxy.clone()),
            None => config,
        }
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        Ok(HttpClient::with_config(self.http_client_config())?)
    }

    /// Process environment plus the two JSON-backed persisted stores
    pub fn environment_stores(&self) -> EnvironmentStores {
        EnvironmentStores::new(
            Arc::new(ProcessEnvironment),
            Arc::new(JsonFileStore::new(&self.machine_environment_file)),
            Arc::new(JsonFileStore::new(&self.user_environment_file)),
        )
    }
}

/// Per-call settings the installer consults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub add_to_path: bool,
    pub remove_from_path: bool,
    pub scope: Option<EnvironmentScope>,
    pub provider_name: String,
    pub progress_interval: Duration,
    /// Parent for staging directories; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Install from untrusted sources without asking
    pub trust_all: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            add_to_path: false,
            remove_from_path: false,
            scope: None,
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            temp_dir: None,
            trust_all: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.add_to_path);
        assert!(!config.remove_from_path);
        assert_eq!(config.provider_name, "zpkg");
        assert_eq!(config.progress_interval_ms, 1000);
        assert!(config.registry_file.ends_with("installed.json"));
        assert_eq!(config.sources(), &[ConfigSource::Default]);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zpkg.json");
        std::fs::write(
            &path,
            r#"{ "add-to-path": true, "registry-file": "/var/lib/zpkg/installed.json", "progress-interval-ms": 0 }"#,
        )
        .unwrap();

        let config = Config::build(Some(&path), false).unwrap();
        assert!(config.add_to_path);
        assert_eq!(config.registry_file, PathBuf::from("/var/lib/zpkg/installed.json"));
        assert_eq!(config.progress_interval_ms, 1);
        assert_eq!(config.sources().last(), Some(&ConfigSource::File(path)));
    }

    #[test]
    fn test_install_options() {
        let mut config = Config::default();
        config.merge(
            RawConfig {
                scope: Some(EnvironmentScope::CurrentUser),
                trust_all: Some(true),
                ..Default::default()
            },
            ConfigSource::Command,
        );

        let options = config.install_options();
        assert_eq!(options.scope, Some(EnvironmentScope::CurrentUser));
        assert!(options.trust_all);
        assert_eq!(options.progress_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_http_proxy_reaches_client_config() {
        let mut config = Config::default();
        assert!(config.http_client_config().proxy.is_none());

        config.merge(
            RawConfig {
                http_proxy: Some("http://proxy.internal:3128".to_string()),
                ..Default::default()
            },
            ConfigSource::Command,
        );
        assert_eq!(
            config.http_client_config().proxy.as_deref(),
            Some("http://proxy.internal:3128")
        );
        assert!(config.http_client().is_ok());
    }
}
