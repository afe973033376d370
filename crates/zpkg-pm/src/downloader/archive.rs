//! Archive extraction.
//!
//! Archives are unpacked verbatim. Wrapper folders are collapsed afterwards by
//! the installer, so no prefix stripping happens here.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::package::ArchiveKind;

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract an archive of the given kind into `dest_dir`, creating it first
    pub fn extract(archive_path: &Path, dest_dir: &Path, kind: ArchiveKind) -> io::Result<()> {
        std::fs::create_dir_all(dest_dir)?;

        match kind {
            ArchiveKind::Zip => Self::extract_zip(archive_path, dest_dir),
        }
    }

    /// Extract a zip archive
    fn extract_zip(archive_path: &Path, dest_dir: &Path) -> io::Result<()> {
        let file = File::open(archive_path)?;
        let reader = BufReader::new(file);
        let mut archive = zip::ZipArchive::new(reader).map_err(zip_to_io)?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_to_io)?;

            // enclosed_name rejects absolute paths and `..` traversal
            let Some(relative_path) = entry.enclosed_name() else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Path traversal detected in archive: {}", entry.name()),
                ));
            };

            if relative_path.as_os_str().is_empty() {
                continue;
            }

            let outpath = dest_dir.join(&relative_path);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }

        Ok(())
    }
}

/// Keep the underlying I/O error so lock failures stay recognizable
fn zip_to_io(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    /// Write a zip containing `entries`; names ending in `/` become directories
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }

        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_preserves_layout() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("foo.zip");
        write_zip(
            &archive,
            &[("wrap/a.txt", "a"), ("wrap/sub/b.txt", "b"), ("wrap/empty/", "")],
        );

        let dest = temp.path().join("out");
        ArchiveExtractor::extract(&archive, &dest, ArchiveKind::Zip).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("wrap/a.txt")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(dest.join("wrap/sub/b.txt")).unwrap(), "b");
        assert!(dest.join("wrap/empty").is_dir());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = ArchiveExtractor::extract(&archive, &temp.path().join("out"), ArchiveKind::Zip)
            .unwrap_err();
        assert!(!crate::error::is_locked_resource(&err));
    }
}
