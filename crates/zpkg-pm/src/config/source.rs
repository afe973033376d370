use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::environment::EnvironmentScope;
use crate::error::{InstallError, Result};

/// Represents the source of a configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default built-in value
    Default,
    /// From the global config.json
    Global,
    /// From a file passed explicitly
    File(PathBuf),
    /// From environment variable
    Environment(String),
    /// Programmatically set
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::File(_) => "file",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
        }
    }
}

/// Configuration as read from a JSON file; every key is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_to_path: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_from_path: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<EnvironmentScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_environment_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_environment_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
}

/// Loads configuration from various sources
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a ZPKG_* environment variable
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    pub fn get_env_bool(&self, var: &str) -> Option<bool> {
        self.get_env(var).map(|value| {
            matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }

    /// Directory holding the global config.json
    pub fn get_config_home(&self) -> PathBuf {
        if let Some(home) = self.get_env("ZPKG_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "zpkg") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base_dirs) = directories::BaseDirs::new() {
            base_dirs.home_dir().join(".zpkg")
        } else {
            PathBuf::from(".zpkg")
        }
    }

    /// Directory holding the installed-package registry
    pub fn get_data_dir(&self) -> PathBuf {
        if let Some(home) = self.get_env("ZPKG_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "zpkg") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            self.get_config_home()
        }
    }

    /// Machine-wide environment file shared by every user
    pub fn get_machine_environment_file(&self) -> PathBuf {
        if cfg!(windows) {
            let program_data = env::var("ProgramData").unwrap_or_else(|_| r"C:\ProgramData".to_string());
            PathBuf::from(program_data).join("zpkg").join("environment.json")
        } else {
            PathBuf::from("/etc/zpkg/environment.json")
        }
    }

    /// Load configuration from a JSON file; a missing file is empty config
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| InstallError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| InstallError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Settings supplied through ZPKG_* variables
    pub fn load_environment(&self) -> Result<RawConfig> {
        let scope = match self.get_env("ZPKG_SCOPE") {
            Some(scope) => Some(scope.parse()?),
            None => None,
        };

        let progress_interval_ms = match self.get_env("ZPKG_PROGRESS_INTERVAL_MS") {
            Some(value) => Some(value.parse().map_err(|_| {
                InstallError::Config(format!("ZPKG_PROGRESS_INTERVAL_MS is not a number: {}", value))
            })?),
            None => None,
        };

        Ok(RawConfig {
            destination: self.get_env("ZPKG_DESTINATION").map(PathBuf::from),
            add_to_path: self.get_env_bool("ZPKG_ADD_TO_PATH"),
            remove_from_path: self.get_env_bool("ZPKG_REMOVE_FROM_PATH"),
            scope,
            provider_name: self.get_env("ZPKG_PROVIDER_NAME"),
            progress_interval_ms,
            temp_dir: self.get_env("ZPKG_TEMP_DIR").map(PathBuf::from),
            machine_environment_file: self.get_env("ZPKG_MACHINE_ENVIRONMENT_FILE").map(PathBuf::from),
            user_environment_file: self.get_env("ZPKG_USER_ENVIRONMENT_FILE").map(PathBuf::from),
            registry_file: self.get_env("ZPKG_REGISTRY_FILE").map(PathBuf::from),
            trust_all: self.get_env_bool("ZPKG_TRUST_ALL"),
            http_proxy: self.get_env("ZPKG_HTTP_PROXY"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_env_disabled() {
        let loader = ConfigLoader::new(false);
        assert_eq!(loader.get_env("PATH"), None);

        let raw = loader.load_environment().unwrap();
        assert!(raw.add_to_path.is_none());
        assert!(raw.scope.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new(false);
        let raw = loader.load_config_file("/definitely/not/here/config.json").unwrap();
        assert!(raw.destination.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "destination": "/opt", "add-to-path": true, "scope": "current-user", "progress-interval-ms": 250 }"#,
        )
        .unwrap();

        let raw = ConfigLoader::new(false).load_config_file(&path).unwrap();
        assert_eq!(raw.destination, Some(PathBuf::from("/opt")));
        assert_eq!(raw.add_to_path, Some(true));
        assert_eq!(raw.scope, Some(EnvironmentScope::CurrentUser));
        assert_eq!(raw.progress_interval_ms, Some(250));
    }

    #[test]
    fn test_load_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = ConfigLoader::new(false).load_config_file(&path).unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
    }
}
