use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    // Configuration errors
    #[error("Destination is required to install {package}")]
    DestinationRequired { package: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("Download failed for {package}: {reason}")]
    DownloadFailed { package: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Integrity errors
    #[error("Checksum mismatch for {package}")]
    ChecksumMismatch { package: String },

    // Trust errors
    #[error("User declined to install {package} from untrusted source {source_location}")]
    TrustDeclined { package: String, source_location: String },

    // Extraction errors
    #[error("Failed to install {package}: {reason}")]
    InstallationFailed { package: String, reason: String },

    #[error("Failed to install {package}, files are locked: {source}")]
    LockedResource {
        package: String,
        #[source]
        source: io::Error,
    },

    // Identity token errors
    #[error("Unable to parse identity token: {0}")]
    IdentityParse(String),

    // Uninstall errors
    #[error("Directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    // Registry errors
    #[error("Registry error: {0}")]
    Registry(String),

    // Path-list errors
    #[error("Failed to update {key} environment variable: {reason}")]
    EnvironmentUpdate { key: String, reason: String },

    #[error("Operation canceled")]
    Canceled,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a failure, stable across error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Integrity,
    TrustDeclined,
    Extraction,
    LockedResource,
    IdentityParse,
    InvalidData,
    Registry,
    EnvironmentUpdate,
    Canceled,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Network => "network",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::TrustDeclined => "trust-declined",
            ErrorCategory::Extraction => "extraction",
            ErrorCategory::LockedResource => "locked-resource",
            ErrorCategory::IdentityParse => "identity-parse",
            ErrorCategory::InvalidData => "invalid-data",
            ErrorCategory::Registry => "registry",
            ErrorCategory::EnvironmentUpdate => "environment-update",
            ErrorCategory::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl InstallError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InstallError::DestinationRequired { .. } | InstallError::Config(_) => {
                ErrorCategory::Configuration
            }
            InstallError::DownloadFailed { .. } | InstallError::Network(_) => ErrorCategory::Network,
            InstallError::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            InstallError::TrustDeclined { .. } => ErrorCategory::TrustDeclined,
            InstallError::InstallationFailed { .. } | InstallError::Io(_) | InstallError::Json(_) => {
                ErrorCategory::Extraction
            }
            InstallError::LockedResource { .. } => ErrorCategory::LockedResource,
            InstallError::IdentityParse(_) => ErrorCategory::IdentityParse,
            InstallError::DirectoryNotFound(_) => ErrorCategory::InvalidData,
            InstallError::Registry(_) => ErrorCategory::Registry,
            InstallError::EnvironmentUpdate { .. } => ErrorCategory::EnvironmentUpdate,
            InstallError::Canceled => ErrorCategory::Canceled,
        }
    }

    /// Declined and canceled installs are controlled outcomes, not faults.
    pub fn severity(&self) -> Severity {
        match self.category() {
            ErrorCategory::TrustDeclined
            | ErrorCategory::Canceled
            | ErrorCategory::EnvironmentUpdate => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Whether a failure during extract/copy must leave the version folder alone.
    pub fn preserves_install(&self) -> bool {
        matches!(self, InstallError::LockedResource { .. })
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            category: self.category(),
            severity: self.severity(),
            message: self.to_string(),
        }
    }

    /// Wrap an I/O failure raised while materializing `package`.
    pub fn from_install_io(package: &str, err: io::Error) -> Self {
        if is_locked_resource(&err) {
            InstallError::LockedResource {
                package: package.to_string(),
                source: err,
            }
        } else {
            InstallError::InstallationFailed {
                package: package.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Permission failures and files held open by another process.
pub fn is_locked_resource(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::ResourceBusy
        | io::ErrorKind::ExecutableFileBusy => true,
        // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
        _ if cfg!(windows) => matches!(err.raw_os_error(), Some(32) | Some(33)),
        _ => false,
    }
}

/// A structured report of a failure, suitable for surfacing to a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Advisory failure returned alongside a successful result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub category: ErrorCategory,
    pub message: String,
}

impl Warning {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::EnvironmentUpdate, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<InstallError> for Warning {
    fn from(err: InstallError) -> Self {
        Warning::new(err.category(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
