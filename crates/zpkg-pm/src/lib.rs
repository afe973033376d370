pub mod cli;
pub mod config;
pub mod downloader;
pub mod environment;
pub mod error;
pub mod http;
pub mod installer;
pub mod package;
pub mod progress;
pub mod registry;
pub mod trust;
pub mod util;

pub use config::{Config, ConfigLoader, ConfigSource, InstallOptions};
pub use environment::{EnvironmentScope, EnvironmentStores, PathListEnvironment};
pub use error::{Diagnostic, ErrorCategory, InstallError, Result, Severity, Warning};
pub use installer::{Installed, Installer, InstallerBuilder, Uninstalled, VersionedStore};
pub use package::{InstallationRecord, PackageDescriptor, PackageIdentity};
pub use progress::{CancellationFlag, ProgressChannel, ProgressReporter};
pub use registry::{JsonRegistry, MemoryRegistry, SoftwareRegistry};
pub use trust::{AlwaysTrust, NeverTrust, TrustPrompt};
