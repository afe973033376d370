//! Package model: what to install and how an installation is identified.

mod descriptor;
mod identity;
mod record;

pub use descriptor::{ArchiveKind, ExpectedHash, PackageDescriptor};
pub use identity::{PackageIdentity, IDENTITY_PREFIX};
pub use record::InstallationRecord;
