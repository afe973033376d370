//! Package installation.
//!
//! The [`Installer`] drives one package through download, verification,
//! extraction and placement into `destination/name/version`, and reverses
//! that on uninstall.

mod installer;
mod normalize;
mod store;

pub use installer::{Installed, Installer, InstallerBuilder, Uninstalled};
pub use normalize::{effective_root, DirectoryTree, FsTree};
pub use store::VersionedStore;
