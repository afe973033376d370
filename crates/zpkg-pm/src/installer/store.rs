//! The `root/name/version` layout installs land in.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy)]
pub struct VersionedStore;

impl VersionedStore {
    /// Path of the version folder; does not touch the filesystem
    pub fn resolve(destination_root: &Path, name: &str, version: &str) -> PathBuf {
        destination_root.join(name).join(version)
    }

    /// Whether `value` can name a package or version folder: exactly one
    /// normal path component that stays below the destination root
    pub fn is_plain_component(value: &str) -> bool {
        if value.trim().is_empty() || value.contains(['/', '\\']) {
            return false;
        }

        let mut components = Path::new(value).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    }

    /// Create `path` and its parents if absent
    pub fn ensure_exists(path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    /// Recursively copy the contents of `source` into `dest`.
    ///
    /// Existing directories are reused. Existing files are replaced when
    /// `overwrite` is set and left alone otherwise.
    pub fn copy_into(source: &Path, dest: &Path, overwrite: bool) -> io::Result<u64> {
        let mut copied = 0;
        fs::create_dir_all(dest)?;

        for entry in WalkDir::new(source).min_depth(1) {
            let entry = entry.map_err(walk_to_io)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }

            if target.exists() && !overwrite {
                log::debug!("Keeping existing {}", target.display());
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }

        Ok(copied)
    }
}

fn walk_to_io(err: walkdir::Error) -> io::Error {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
}
