//! Fetching, verifying and unpacking package archives.

mod archive;
mod checksum;
mod file;

pub use archive::ArchiveExtractor;
pub use checksum::{compute_checksum, verify_checksum, ChecksumType, ChecksumVerifier, HashVerifier};
pub use file::{Downloader, SourceDownloader};

#[cfg(test)]
pub(crate) use archive::tests::write_zip;
