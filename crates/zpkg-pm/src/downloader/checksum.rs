//! Checksum verification for downloaded archives.

use async_trait::async_trait;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::path::Path;

use crate::package::PackageDescriptor;
use crate::{InstallError, Result};

/// Supported checksum types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Md5,
}

impl ChecksumType {
    /// Detect checksum type from length of hex string
    pub fn from_hex_length(len: usize) -> Option<Self> {
        match len {
            32 => Some(ChecksumType::Md5),
            40 => Some(ChecksumType::Sha1),
            64 => Some(ChecksumType::Sha256),
            96 => Some(ChecksumType::Sha384),
            128 => Some(ChecksumType::Sha512),
            _ => None,
        }
    }
}

fn hex_digest<D: Digest>(buffer: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(buffer);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Compute the checksum of a file as lowercase hex
pub async fn compute_checksum(path: &Path, checksum_type: ChecksumType) -> Result<String> {
    let buffer = tokio::fs::read(path).await?;

    Ok(match checksum_type {
        ChecksumType::Sha1 => hex_digest::<Sha1>(&buffer),
        ChecksumType::Sha256 => hex_digest::<Sha256>(&buffer),
        ChecksumType::Sha384 => hex_digest::<Sha384>(&buffer),
        ChecksumType::Sha512 => hex_digest::<Sha512>(&buffer),
        ChecksumType::Md5 => hex_digest::<Md5>(&buffer),
    })
}

/// Verify checksum of a file
pub async fn verify_checksum(
    path: &Path,
    expected: &str,
    checksum_type: ChecksumType,
) -> Result<bool> {
    let actual = compute_checksum(path, checksum_type).await?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

/// Decides whether a downloaded archive matches what the descriptor promises.
#[async_trait]
pub trait HashVerifier: Send + Sync {
    async fn verify(&self, file: &Path, descriptor: &PackageDescriptor) -> Result<bool>;
}

/// Verifies against the descriptor's expected hash, if it has one
#[derive(Debug, Default, Clone, Copy)]
pub struct ChecksumVerifier;

#[async_trait]
impl HashVerifier for ChecksumVerifier {
    async fn verify(&self, file: &Path, descriptor: &PackageDescriptor) -> Result<bool> {
        let Some(expected) = &descriptor.hash else {
            log::debug!("No hash declared for {}, skipping verification", descriptor.name);
            return Ok(true);
        };

        let checksum_type = expected.checksum_type().ok_or_else(|| {
            InstallError::Config(format!(
                "Cannot determine hash algorithm for {} ({} hex digits)",
                descriptor.name,
                expected.value.len()
            ))
        })?;

        let valid = verify_checksum(file, &expected.value, checksum_type).await?;
        if !valid {
            log::debug!("{:?} of {} does not match {}", checksum_type, file.display(), expected.value);
        }
        Ok(valid)
    }
}
