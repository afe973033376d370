//! Registry of installed software.

mod installed;

pub use installed::{JsonRegistry, MemoryRegistry};

use async_trait::async_trait;
use std::path::Path;

use crate::package::InstallationRecord;
use crate::Result;

/// Host-side bookkeeping of what is installed where.
#[async_trait]
pub trait SoftwareRegistry: Send + Sync {
    /// Add or replace the record for its installed path
    async fn register(&self, record: &InstallationRecord) -> Result<()>;

    /// Forget the installation named by `identity_token`; false if unknown
    async fn deregister(&self, identity_token: &str) -> Result<bool>;

    async fn query(&self, installed_path: &Path) -> Result<Option<InstallationRecord>>;

    async fn list(&self) -> Result<Vec<InstallationRecord>>;
}
