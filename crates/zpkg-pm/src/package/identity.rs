//! Identity tokens for installed packages.
//!
//! A token is a single line of text that carries everything needed to find and
//! remove an installation later, without consulting the source again.
//!
//! Grammar (version 1):
//!
//! ```text
//! token  = "zpkg1" 6( "|" field )
//! field  = *( unreserved / pct-encoded )
//! ```
//!
//! Fields appear in this order: source location, name, display name, version,
//! installed path, provider name. Every field is percent-encoded, so `|` never
//! appears inside one. Empty fields are allowed except for the name.

use std::path::{Path, PathBuf};

use super::PackageDescriptor;
use crate::{InstallError, Result};

/// Prefix (and grammar version) of every token
pub const IDENTITY_PREFIX: &str = "zpkg1";

const SEPARATOR: char = '|';
const FIELD_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub source_location: String,
    pub name: String,
    pub display_name: String,
    pub version: String,
    /// Empty until the package has been placed on disk
    pub installed_path: PathBuf,
    pub provider_name: String,
}

impl PackageIdentity {
    /// Identity of a package that has not been installed yet
    pub fn for_descriptor(descriptor: &PackageDescriptor, provider_name: impl Into<String>) -> Self {
        Self {
            source_location: descriptor.source.clone(),
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone().unwrap_or_default(),
            version: descriptor.version.clone(),
            installed_path: PathBuf::new(),
            provider_name: provider_name.into(),
        }
    }

    pub fn with_installed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.installed_path = path.into();
        self
    }

    pub fn has_installed_path(&self) -> bool {
        !self.installed_path.to_string_lossy().trim().is_empty()
    }

    pub fn installed_path(&self) -> &Path {
        &self.installed_path
    }

    pub fn encode(&self) -> String {
        let installed_path = self.installed_path.to_string_lossy();
        let fields = [
            self.source_location.as_str(),
            self.name.as_str(),
            self.display_name.as_str(),
            self.version.as_str(),
            installed_path.as_ref(),
            self.provider_name.as_str(),
        ];

        let mut token = String::from(IDENTITY_PREFIX);
        for field in fields {
            token.push(SEPARATOR);
            token.push_str(&urlencoding::encode(field));
        }
        token
    }

    pub fn decode(token: &str) -> Result<Self> {
        let mut parts = token.trim().split(SEPARATOR);

        match parts.next() {
            Some(IDENTITY_PREFIX) => {}
            Some(other) => {
                return Err(InstallError::IdentityParse(format!(
                    "unsupported token version '{}'",
                    other
                )))
            }
            None => return Err(InstallError::IdentityParse("empty token".to_string())),
        }

        let fields = parts
            .map(|part| {
                urlencoding::decode(part)
                    .map(|field| field.into_owned())
                    .map_err(|e| InstallError::IdentityParse(format!("invalid field encoding: {}", e)))
            })
            .collect::<Result<Vec<String>>>()?;

        let [source_location, name, display_name, version, installed_path, provider_name]: [String; FIELD_COUNT] =
            fields.try_into().map_err(|fields: Vec<String>| {
                InstallError::IdentityParse(format!(
                    "expected {} fields, found {}",
                    FIELD_COUNT,
                    fields.len()
                ))
            })?;

        if name.trim().is_empty() {
            return Err(InstallError::IdentityParse("package name is empty".to_string()));
        }

        Ok(Self {
            source_location,
            name,
            display_name,
            version,
            installed_path: PathBuf::from(installed_path),
            provider_name,
        })
    }
}
