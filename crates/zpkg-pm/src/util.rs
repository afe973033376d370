//! Filesystem helpers shared by the installer.
//!
//! The `remove_*` functions are best-effort: they never fail, and report
//! whether the target is gone afterwards.

use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use walkdir::WalkDir;

const REMOVE_ATTEMPTS: u32 = 3;
const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Delete a file, logging failures at debug level
pub fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            log::debug!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

/// Delete a directory tree, retrying and clearing read-only flags.
///
/// When the tree cannot be removed in one go, every entry is removed
/// individually and the ones that stay locked are skipped.
pub fn remove_tree(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }

    for attempt in 1..=REMOVE_ATTEMPTS {
        match fs::remove_dir_all(path) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => {
                log::debug!(
                    "Attempt {}/{} to delete {} failed: {}",
                    attempt,
                    REMOVE_ATTEMPTS,
                    path.display(),
                    e
                );
                clear_readonly(path);
                if attempt < REMOVE_ATTEMPTS {
                    thread::sleep(REMOVE_RETRY_DELAY);
                }
            }
        }
    }

    remove_entries(path);
    !path.exists()
}

fn clear_readonly(root: &Path) {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let Ok(metadata) = entry.metadata() else { continue };
        let mut permissions = metadata.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            let _ = fs::set_permissions(entry.path(), permissions);
        }
    }
}

fn remove_entries(root: &Path) {
    for entry in WalkDir::new(root).contents_first(true).into_iter().filter_map(|e| e.ok()) {
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
        } else {
            fs::remove_file(entry.path())
        };
        if let Err(e) = result {
            log::debug!("Skipping {}: {}", entry.path().display(), e);
        }
    }
}

/// A directory with neither files nor subdirectories
pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Whether any non-directory entry exists anywhere below `path`
pub fn contains_files(path: &Path) -> bool {
    WalkDir::new(path)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|entry| !entry.file_type().is_dir())
}
