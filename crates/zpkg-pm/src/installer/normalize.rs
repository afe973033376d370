//! Collapse single-folder wrappers left behind by archive extraction.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Listing capability the normalizer walks.
pub trait DirectoryTree {
    /// Whether `dir` has any non-directory entries directly inside it
    fn has_files(&self, dir: &Path) -> io::Result<bool>;

    /// Immediate subdirectories of `dir`
    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// The real filesystem. Symlinks count as files and are never followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTree;

impl DirectoryTree for FsTree {
    fn has_files(&self, dir: &Path) -> io::Result<bool> {
        for entry in fs::read_dir(dir)? {
            if !entry?.file_type()?.is_dir() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

/// Descend from `root` while the current directory holds no files and exactly
/// one subdirectory. The directory where that stops is the content root.
pub fn effective_root<T: DirectoryTree + ?Sized>(tree: &T, root: &Path) -> io::Result<PathBuf> {
    let mut current = root.to_path_buf();

    loop {
        if tree.has_files(&current)? {
            return Ok(current);
        }

        let mut subdirs = tree.subdirectories(&current)?;
        if subdirs.len() != 1 {
            return Ok(current);
        }

        let next = subdirs.remove(0);
        log::debug!("Descending into wrapper folder {}", next.display());
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// In-memory tree: directory -> (file count, subdirectories)
    #[derive(Default)]
    struct SyntheticTree {
        dirs: BTreeMap<PathBuf, (usize, Vec<PathBuf>)>,
    }

    impl SyntheticTree {
        fn dir(mut self, path: &str, files: usize, subdirs: &[&str]) -> Self {
            self.dirs.insert(
                PathBuf::from(path),
                (files, subdirs.iter().map(PathBuf::from).collect()),
            );
            self
        }
    }

    impl DirectoryTree for SyntheticTree {
        fn has_files(&self, dir: &Path) -> io::Result<bool> {
            self.dirs
                .get(dir)
                .map(|(files, _)| *files > 0)
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            self.dirs
                .get(dir)
                .map(|(_, subdirs)| subdirs.clone())
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    /// `/x` wrapped in `n` single-folder levels with the payload at the bottom
    fn wrapped(n: usize) -> (SyntheticTree, PathBuf) {
        let mut tree = SyntheticTree::default();
        let mut path = String::from("/x");
        for level in 0..n {
            let child = format!("{}/w{}", path, level);
            tree = tree.dir(&path, 0, &[child.as_str()]);
            path = child;
        }
        (tree.dir(&path, 2, &[]), PathBuf::from(path))
    }

    #[test]
    fn test_any_number_of_wrappers() {
        for n in 0..5 {
            let (tree, payload) = wrapped(n);
            assert_eq!(effective_root(&tree, Path::new("/x")).unwrap(), payload, "n = {}", n);
        }
    }

    #[test]
    fn test_files_at_top_level_stop_immediately() {
        let tree = SyntheticTree::default()
            .dir("/x", 1, &["/x/lib"])
            .dir("/x/lib", 3, &[]);
        assert_eq!(effective_root(&tree, Path::new("/x")).unwrap(), PathBuf::from("/x"));
    }

    #[test]
    fn test_multiple_subdirectories_stop() {
        let tree = SyntheticTree::default()
            .dir("/x", 0, &["/x/w"])
            .dir("/x/w", 0, &["/x/w/bin", "/x/w/lib"])
            .dir("/x/w/bin", 1, &[])
            .dir("/x/w/lib", 1, &[]);
        assert_eq!(effective_root(&tree, Path::new("/x")).unwrap(), PathBuf::from("/x/w"));
    }

    #[test]
    fn test_empty_sibling_counts_as_subdirectory() {
        let tree = SyntheticTree::default()
            .dir("/x", 0, &["/x/w"])
            .dir("/x/w", 0, &["/x/w/payload", "/x/w/empty"])
            .dir("/x/w/payload", 2, &[])
            .dir("/x/w/empty", 0, &[]);
        assert_eq!(effective_root(&tree, Path::new("/x")).unwrap(), PathBuf::from("/x/w"));
    }

    #[test]
    fn test_empty_root() {
        let tree = SyntheticTree::default().dir("/x", 0, &[]);
        assert_eq!(effective_root(&tree, Path::new("/x")).unwrap(), PathBuf::from("/x"));
    }

    #[test]
    fn test_filesystem_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("wrap1/wrap2")).unwrap();
        fs::write(root.join("wrap1/wrap2/a.txt"), "a").unwrap();

        assert_eq!(effective_root(&FsTree, root).unwrap(), root.join("wrap1/wrap2"));
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(effective_root(&FsTree, &temp.path().join("missing")).is_err());
    }
}
