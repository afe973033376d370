use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{PackageDescriptor, PackageIdentity};

/// A package that has been placed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallationRecord {
    /// Encoded [`PackageIdentity`], enough to drive an uninstall
    pub identity_token: String,
    pub installed_path: PathBuf,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstallationRecord {
    pub fn new(descriptor: &PackageDescriptor, identity: &PackageIdentity) -> Self {
        Self {
            identity_token: identity.encode(),
            installed_path: identity.installed_path.clone(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            version_scheme: descriptor.version_scheme.clone(),
            summary: descriptor.summary.clone(),
            installed_at: Some(Utc::now()),
        }
    }
}
