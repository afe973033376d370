use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::downloader::ChecksumType;
use crate::{InstallError, Result};

/// Archive formats the installer knows how to unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    #[default]
    Zip,
}

impl ArchiveKind {
    /// File extension used for the downloaded archive
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
        }
    }
}

/// Hash the downloaded archive must match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedHash {
    /// Inferred from the length of `value` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<ChecksumType>,
    pub value: String,
}

impl ExpectedHash {
    pub fn new(algorithm: ChecksumType, value: impl Into<String>) -> Self {
        Self {
            algorithm: Some(algorithm),
            value: value.into(),
        }
    }

    pub fn checksum_type(&self) -> Option<ChecksumType> {
        self.algorithm
            .or_else(|| ChecksumType::from_hex_length(self.value.len()))
    }
}

/// Everything needed to install one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Where the archive is fetched from
    pub source: String,
    pub name: String,
    pub version: String,
    /// Root under which `name/version` is created
    #[serde(default)]
    pub destination: PathBuf,
    #[serde(rename = "type", default)]
    pub archive_kind: ArchiveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ExpectedHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_scheme: Option<String>,
    /// The source has already been vetted; no trust prompt is shown
    #[serde(default)]
    pub trusted: bool,
}

impl PackageDescriptor {
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            version: version.into(),
            destination: destination.into(),
            archive_kind: ArchiveKind::Zip,
            hash: None,
            display_name: None,
            summary: None,
            version_scheme: None,
            trusted: false,
        }
    }

    pub fn with_hash(mut self, hash: ExpectedHash) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    /// Load a descriptor from a JSON manifest
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InstallError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let descriptor: PackageDescriptor = serde_json::from_str(&content)?;
        Ok(descriptor)
    }

    /// True when no usable destination root was supplied
    pub fn destination_missing(&self) -> bool {
        self.destination.to_string_lossy().trim().is_empty()
    }

    pub fn display_name_or_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}
