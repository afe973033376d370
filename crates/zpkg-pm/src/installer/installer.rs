//! Install and uninstall orchestration.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::normalize::{effective_root, FsTree};
use super::store::VersionedStore;
use crate::config::InstallOptions;
use crate::downloader::{ArchiveExtractor, ChecksumVerifier, Downloader, HashVerifier, SourceDownloader};
use crate::environment::{EnvironmentScope, EnvironmentStores, PathListEnvironment, DEFAULT_SEPARATOR};
use crate::error::{InstallError, Result, Warning};
use crate::http::HttpClient;
use crate::package::{ArchiveKind, InstallationRecord, PackageDescriptor, PackageIdentity};
use crate::progress::{CancellationFlag, LogProgress, ProgressChannel, ProgressReporter};
use crate::registry::{MemoryRegistry, SoftwareRegistry};
use crate::trust::{NeverTrust, TrustPrompt};
use crate::util;

const FLAG_BELONGS_ELSEWHERE: &str = "is only honoured by";

/// A successful install
#[derive(Debug, Clone)]
pub struct Installed {
    pub record: InstallationRecord,
    pub warnings: Vec<Warning>,
}

/// A successful uninstall
#[derive(Debug, Clone)]
pub struct Uninstalled {
    pub identity: PackageIdentity,
    pub warnings: Vec<Warning>,
}

/// Sequences download, verification, extraction, placement, registration
/// and path maintenance for one package at a time.
pub struct Installer {
    downloader: Arc<dyn Downloader>,
    verifier: Arc<dyn HashVerifier>,
    trust: Arc<dyn TrustPrompt>,
    registry: Arc<dyn SoftwareRegistry>,
    environment: PathListEnvironment,
    progress: Arc<dyn ProgressChannel>,
    options: InstallOptions,
    cancel: CancellationFlag,
}

pub struct InstallerBuilder {
    downloader: Option<Arc<dyn Downloader>>,
    verifier: Arc<dyn HashVerifier>,
    trust: Arc<dyn TrustPrompt>,
    registry: Arc<dyn SoftwareRegistry>,
    stores: EnvironmentStores,
    separator: char,
    progress: Arc<dyn ProgressChannel>,
    options: InstallOptions,
    cancel: CancellationFlag,
}

impl Default for InstallerBuilder {
    fn default() -> Self {
        Self {
            downloader: None,
            verifier: Arc::new(ChecksumVerifier),
            trust: Arc::new(NeverTrust),
            registry: Arc::new(MemoryRegistry::new()),
            stores: EnvironmentStores::in_memory(),
            separator: DEFAULT_SEPARATOR,
            progress: Arc::new(LogProgress::default()),
            options: InstallOptions::default(),
            cancel: CancellationFlag::new(),
        }
    }
}

impl InstallerBuilder {
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn HashVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn trust(mut self, trust: Arc<dyn TrustPrompt>) -> Self {
        self.trust = trust;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn SoftwareRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn environment(mut self, stores: EnvironmentStores) -> Self {
        self.stores = stores;
        self
    }

    pub fn path_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressChannel>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Without an explicit downloader, a [`SourceDownloader`] over a fresh
    /// HTTP client is used.
    pub fn build(self) -> Result<Installer> {
        let downloader = match self.downloader {
            Some(downloader) => downloader,
            None => Arc::new(SourceDownloader::new(Arc::new(HttpClient::new()?))),
        };

        let environment = PathListEnvironment::new(self.stores)
            .with_separator(self.separator)
            .with_add_to_path(self.options.add_to_path)
            .with_remove_from_path(self.options.remove_from_path);

        Ok(Installer {
            downloader,
            verifier: self.verifier,
            trust: self.trust,
            registry: self.registry,
            environment,
            progress: self.progress,
            options: self.options,
            cancel: self.cancel,
        })
    }
}

/// Temporary archive file and extraction directory owned by one install
struct Staging {
    dir: TempDir,
    archive: PathBuf,
    extract_dir: PathBuf,
}

impl Staging {
    fn new(parent: Option<&Path>, descriptor: &PackageDescriptor) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("zpkg-");

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        let archive = dir
            .path()
            .join(format!("package.{}", descriptor.archive_kind.extension()));
        let extract_dir = dir.path().join("extracted");

        Ok(Self { dir, archive, extract_dir })
    }

    fn remove_archive(&self) {
        util::remove_file(&self.archive);
    }

    fn cleanup(self) {
        util::remove_file(&self.archive);
        util::remove_tree(&self.extract_dir);

        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::debug!("Failed to delete staging directory {}: {}", path.display(), e);
        }
    }

    async fn cleanup_blocking(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.cleanup()).await {
            log::debug!("Staging cleanup did not finish: {}", e);
        }
    }
}

/// Failure while extracting or copying
struct MaterializeError {
    error: InstallError,
    /// The version folder may have been modified
    touched: bool,
}

fn materialize(
    package: &str,
    archive: &Path,
    kind: ArchiveKind,
    extract_dir: &Path,
    version_dir: &Path,
    cancel: &CancellationFlag,
) -> std::result::Result<u64, MaterializeError> {
    let before = |e: io::Error| MaterializeError {
        error: InstallError::from_install_io(package, e),
        touched: false,
    };

    ArchiveExtractor::extract(archive, extract_dir, kind).map_err(before)?;

    if cancel.is_canceled() {
        return Err(MaterializeError { error: InstallError::Canceled, touched: false });
    }

    let content_root = effective_root(&FsTree, extract_dir).map_err(before)?;
    log::debug!("Content root is {}", content_root.display());

    let after = |e: io::Error| MaterializeError {
        error: InstallError::from_install_io(package, e),
        touched: true,
    };

    VersionedStore::ensure_exists(version_dir).map_err(after)?;
    VersionedStore::copy_into(&content_root, version_dir, true).map_err(after)
}

/// Run [`remove_version_folder`] off the async executor
async fn remove_version_folder_blocking(version_dir: &Path) -> bool {
    let path = version_dir.to_path_buf();
    tokio::task::spawn_blocking(move || remove_version_folder(&path))
        .await
        .unwrap_or(false)
}

/// Remove a version folder, and its package folder once that is empty
fn remove_version_folder(version_dir: &Path) -> bool {
    let removed = util::remove_tree(version_dir);

    if let Some(package_dir) = version_dir.parent() {
        if util::is_empty_dir(package_dir) {
            util::remove_tree(package_dir);
        }
    }
    removed
}

impl Installer {
    pub fn builder() -> InstallerBuilder {
        InstallerBuilder::default()
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<dyn SoftwareRegistry> {
        &self.registry
    }

    pub fn environment(&self) -> &PathListEnvironment {
        &self.environment
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    fn check_canceled(&self) -> Result<()> {
        if self.cancel.is_canceled() {
            return Err(InstallError::Canceled);
        }
        Ok(())
    }

    /// Reject descriptors that cannot be placed at `destination/name/version`
    fn check_layout(descriptor: &PackageDescriptor) -> Result<()> {
        if descriptor.destination_missing() {
            return Err(InstallError::DestinationRequired { package: descriptor.name.clone() });
        }

        for (field, value) in [("name", &descriptor.name), ("version", &descriptor.version)] {
            if !VersionedStore::is_plain_component(value) {
                return Err(InstallError::Config(format!(
                    "Package {} {:?} must be a single folder name below the destination",
                    field, value
                )));
            }
        }
        Ok(())
    }

    fn complete_identity(&self, identity: PackageIdentity, version_dir: &Path) -> PackageIdentity {
        let mut identity = identity.with_installed_path(version_dir);
        if identity.provider_name.is_empty() {
            identity.provider_name = self.options.provider_name.clone();
        }
        identity
    }

    /// Report an installation that is already on disk without downloading.
    ///
    /// The version folder counts as installed when any file exists below it.
    /// A registered record for that folder is returned as is; otherwise one
    /// is synthesized and registered.
    pub async fn installed(&self, descriptor: &PackageDescriptor) -> Result<Option<InstallationRecord>> {
        Self::check_layout(descriptor)?;

        if self.options.add_to_path {
            log::debug!("add-to-path {} install", FLAG_BELONGS_ELSEWHERE);
        }
        if self.options.remove_from_path {
            log::debug!("remove-from-path {} uninstall", FLAG_BELONGS_ELSEWHERE);
        }

        let version_dir = VersionedStore::resolve(&descriptor.destination, &descriptor.name, &descriptor.version);
        let has_files = {
            let dir = version_dir.clone();
            tokio::task::spawn_blocking(move || dir.is_dir() && util::contains_files(&dir))
                .await
                .unwrap_or(false)
        };
        if !has_files {
            return Ok(None);
        }

        if let Some(record) = self.registry.query(&version_dir).await? {
            log::debug!("{} {} is already registered", descriptor.name, descriptor.version);
            return Ok(Some(record));
        }

        let identity = self.complete_identity(
            PackageIdentity::for_descriptor(descriptor, self.options.provider_name.clone()),
            &version_dir,
        );
        let record = InstallationRecord::new(descriptor, &identity);
        self.registry.register(&record).await?;

        Ok(Some(record))
    }

    /// Install `descriptor`. The returned record's token locates the version
    /// folder, so it can drive [`Installer::uninstall`] later.
    pub async fn install(&self, descriptor: &PackageDescriptor, identity: PackageIdentity) -> Result<Installed> {
        Self::check_layout(descriptor)?;

        let staging = Staging::new(self.options.temp_dir.as_deref(), descriptor)?;
        let mut reporter = None;

        let result = self.run_install(descriptor, identity, &staging, &mut reporter).await;

        if let Some(reporter) = reporter {
            reporter.complete(result.is_ok());
        }
        staging.cleanup_blocking().await;

        if let Err(e) = &result {
            log::debug!("Install of {} failed: {}", descriptor.name, e.diagnostic());
        }
        result
    }

    async fn run_install(
        &self,
        descriptor: &PackageDescriptor,
        identity: PackageIdentity,
        staging: &Staging,
        reporter: &mut Option<ProgressReporter>,
    ) -> Result<Installed> {
        let mut warnings = Vec::new();
        if self.options.remove_from_path {
            let warning = Warning::environment(format!("remove-from-path {} uninstall", FLAG_BELONGS_ELSEWHERE));
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        self.check_canceled()?;

        log::info!("Downloading {} from {}", descriptor.name, descriptor.source);
        self.downloader.fetch(&descriptor.source, &staging.archive).await?;
        if !tokio::fs::try_exists(&staging.archive).await.unwrap_or(false) {
            return Err(InstallError::DownloadFailed {
                package: descriptor.name.clone(),
                reason: "no archive was downloaded".to_string(),
            });
        }

        if let Err(e) = self.check_canceled() {
            staging.remove_archive();
            return Err(e);
        }

        match self.verifier.verify(&staging.archive, descriptor).await {
            Ok(true) => {}
            Ok(false) => {
                staging.remove_archive();
                return Err(InstallError::ChecksumMismatch { package: descriptor.name.clone() });
            }
            Err(e) => {
                staging.remove_archive();
                return Err(e);
            }
        }

        if let Err(e) = self.check_canceled() {
            staging.remove_archive();
            return Err(e);
        }

        if !descriptor.trusted && !self.options.trust_all && !self.confirm_trust(descriptor).await {
            staging.remove_archive();
            let declined = InstallError::TrustDeclined {
                package: descriptor.name.clone(),
                source_location: descriptor.source.clone(),
            };
            log::warn!("{}", declined);
            return Err(declined);
        }

        let version_dir = VersionedStore::resolve(&descriptor.destination, &descriptor.name, &descriptor.version);

        let progress = reporter.insert(ProgressReporter::start(
            self.progress.clone(),
            self.cancel.clone(),
            self.options.progress_interval,
            &format!("Installing zip package {}", descriptor.display_name_or_name()),
        ));
        log::debug!("Progress activity {} started", progress.id().0);

        let materialized = {
            let package = descriptor.name.clone();
            let archive = staging.archive.clone();
            let kind = descriptor.archive_kind;
            let extract_dir = staging.extract_dir.clone();
            let target = version_dir.clone();
            let cancel = self.cancel.clone();

            tokio::task::spawn_blocking(move || {
                materialize(&package, &archive, kind, &extract_dir, &target, &cancel)
            })
            .await
            .unwrap_or_else(|e| {
                Err(MaterializeError {
                    error: InstallError::InstallationFailed {
                        package: descriptor.name.clone(),
                        reason: e.to_string(),
                    },
                    touched: true,
                })
            })
        };

        let copied = match materialized {
            Ok(copied) => copied,
            Err(MaterializeError { error, touched }) => {
                if touched && !error.preserves_install() {
                    log::debug!("Rolling back {}", version_dir.display());
                    remove_version_folder_blocking(&version_dir).await;
                } else if touched {
                    log::warn!("Leaving {} in place: {}", version_dir.display(), error);
                }
                return Err(error);
            }
        };
        log::debug!("Copied {} files into {}", copied, version_dir.display());

        let identity = self.complete_identity(identity, &version_dir);
        let record = InstallationRecord::new(descriptor, &identity);
        if let Err(e) = self.registry.register(&record).await {
            log::debug!("Registration failed, rolling back {}", version_dir.display());
            remove_version_folder_blocking(&version_dir).await;
            return Err(e);
        }

        log::info!(
            "Installed {} {} to {}",
            descriptor.name,
            descriptor.version,
            version_dir.display()
        );

        let update = self
            .environment
            .add(self.options.scope, &version_dir.to_string_lossy());
        for warning in update.warnings {
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(Installed { record, warnings })
    }

    async fn confirm_trust(&self, descriptor: &PackageDescriptor) -> bool {
        let trust = self.trust.clone();
        let name = descriptor.name.clone();
        let source = descriptor.source.clone();

        match tokio::task::spawn_blocking(move || trust.confirm(&name, &source)).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                log::debug!("Trust prompt failed: {}", e);
                false
            }
        }
    }

    /// Remove the installation named by `identity_token`.
    ///
    /// Locked files are skipped rather than failing the uninstall.
    pub async fn uninstall(&self, identity_token: &str) -> Result<Uninstalled> {
        let identity = PackageIdentity::decode(identity_token)?;

        let mut warnings = Vec::new();
        if self.options.add_to_path {
            let warning = Warning::environment(format!("add-to-path {} install", FLAG_BELONGS_ELSEWHERE));
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        let installed_path = identity.installed_path.clone();
        let exists = identity.has_installed_path()
            && tokio::fs::try_exists(&installed_path).await.unwrap_or(false);
        if !exists {
            return Err(InstallError::DirectoryNotFound(installed_path));
        }

        let removed = remove_version_folder_blocking(&installed_path).await;
        if !removed {
            let warning = Warning::new(
                crate::ErrorCategory::LockedResource,
                format!("Some files under {} could not be removed", installed_path.display()),
            );
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        match self.registry.deregister(identity_token).await {
            Ok(true) => {}
            Ok(false) => log::debug!("{} was not registered", identity.name),
            Err(e) => {
                let warning = Warning::from(e);
                log::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        let entry = installed_path.to_string_lossy();
        for scope in [EnvironmentScope::AllUsers, EnvironmentScope::CurrentUser] {
            let update = self.environment.remove(&entry, scope, &[scope]);
            for warning in update.warnings {
                log::warn!("{}", warning);
                warnings.push(warning);
            }
        }

        log::info!("Uninstalled {} {}", identity.name, identity.version);
        Ok(Uninstalled { identity, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{write_zip, ChecksumType};
    use crate::environment::{KeyValueStore, MemoryStore, PATH_KEY};
    use crate::package::ExpectedHash;
    use crate::progress::testing::RecordingProgress;
    use crate::progress::ProgressId;
    use crate::trust::AlwaysTrust;
    use crate::ErrorCategory;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves a prepared archive regardless of the source
    struct FixtureDownloader {
        archive: Option<PathBuf>,
    }

    #[async_trait]
    impl Downloader for FixtureDownloader {
        async fn fetch(&self, _source: &str, dest: &Path) -> Result<()> {
            match &self.archive {
                Some(archive) => {
                    tokio::fs::copy(archive, dest).await?;
                    Ok(())
                }
                None => Ok(()),
            }
        }
    }

    struct CountingTrust {
        answer: bool,
        asked: AtomicUsize,
    }

    impl TrustPrompt for CountingTrust {
        fn confirm(&self, _name: &str, _source: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    /// Requests cancellation as soon as progress starts
    struct CancelOnStart {
        inner: RecordingProgress,
        cancel: CancellationFlag,
    }

    impl ProgressChannel for CancelOnStart {
        fn start(&self, initial: u32, message: &str) -> ProgressId {
            self.cancel.cancel();
            self.inner.start(initial, message)
        }

        fn report(&self, id: ProgressId, percent: u32, message: &str) {
            self.inner.report(id, percent, message)
        }

        fn complete(&self, id: ProgressId, success: bool) {
            self.inner.complete(id, success)
        }

        fn stopped(&self, id: ProgressId) {
            self.inner.stopped(id)
        }
    }

    /// Accepts nothing; every mutation fails
    struct FailingRegistry;

    #[async_trait]
    impl SoftwareRegistry for FailingRegistry {
        async fn register(&self, _record: &InstallationRecord) -> Result<()> {
            Err(InstallError::Registry("installed.json is read-only".to_string()))
        }

        async fn deregister(&self, _identity_token: &str) -> Result<bool> {
            Err(InstallError::Registry("installed.json is read-only".to_string()))
        }

        async fn query(&self, _installed_path: &Path) -> Result<Option<InstallationRecord>> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<InstallationRecord>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        temp: TempDir,
        destination: PathBuf,
        staging: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let destination = temp.path().join("opt");
            let staging = temp.path().join("staging");
            Self { temp, destination, staging }
        }

        fn archive(&self, entries: &[(&str, &str)]) -> PathBuf {
            let path = self.temp.path().join("fixture.zip");
            write_zip(&path, entries);
            path
        }

        fn descriptor(&self) -> PackageDescriptor {
            PackageDescriptor::new("https://example.com/foo.zip", "Foo", "1.0.1", &self.destination)
                .trusted(true)
        }

        fn options(&self) -> InstallOptions {
            InstallOptions {
                temp_dir: Some(self.staging.clone()),
                progress_interval: Duration::from_millis(5),
                ..Default::default()
            }
        }

        fn builder(&self, archive: Option<PathBuf>) -> InstallerBuilder {
            Installer::builder()
                .downloader(Arc::new(FixtureDownloader { archive }))
                .options(self.options())
                .progress(Arc::new(RecordingProgress::default()))
        }

        fn version_dir(&self) -> PathBuf {
            self.destination.join("Foo").join("1.0.1")
        }

        fn staging_is_empty(&self) -> bool {
            !self.staging.exists() || util::is_empty_dir(&self.staging)
        }
    }

    fn identity(descriptor: &PackageDescriptor) -> PackageIdentity {
        PackageIdentity::for_descriptor(descriptor, "")
    }

    #[tokio::test]
    async fn test_install_collapses_single_payload_folder() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("FooPayload/a.txt", "a"), ("FooPayload/b.txt", "b")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture.descriptor();

        let installed = installer.install(&descriptor, identity(&descriptor)).await.unwrap();

        let version_dir = fixture.version_dir();
        assert_eq!(installed.record.installed_path, version_dir);
        assert_eq!(fs::read_to_string(version_dir.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(version_dir.join("b.txt")).unwrap(), "b");
        assert!(!version_dir.join("FooPayload").exists());
        assert!(installed.warnings.is_empty());
        assert!(fixture.staging_is_empty());

        let decoded = PackageIdentity::decode(&installed.record.identity_token).unwrap();
        assert_eq!(decoded.installed_path, version_dir);
        assert_eq!(decoded.provider_name, "zpkg");
    }

    #[tokio::test]
    async fn test_install_strips_nested_wrappers() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("wrap1/", ""), ("wrap1/wrap2/", ""), ("wrap1/wrap2/a.txt", "a")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture.descriptor();

        installer.install(&descriptor, identity(&descriptor)).await.unwrap();

        let version_dir = fixture.version_dir();
        assert_eq!(fs::read_to_string(version_dir.join("a.txt")).unwrap(), "a");
        assert!(!version_dir.join("wrap1").exists());
    }

    #[tokio::test]
    async fn test_hash_mismatch_creates_nothing() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture
            .descriptor()
            .with_hash(ExpectedHash::new(ChecksumType::Sha256, "0".repeat(64)));

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();

        assert!(matches!(err, InstallError::ChecksumMismatch { .. }));
        assert_eq!(err.category(), ErrorCategory::Integrity);
        assert!(!fixture.destination.exists());
        assert!(fixture.staging_is_empty());
    }

    #[tokio::test]
    async fn test_missing_destination_is_rejected() {
        let fixture = Fixture::new();
        let installer = fixture.builder(None).build().unwrap();
        let descriptor = PackageDescriptor::new("https://example.com/foo.zip", "Foo", "1.0.1", "  ");

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!fixture.staging.exists());
    }

    #[tokio::test]
    async fn test_name_and_version_must_stay_below_destination() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let absolute = fixture.temp.path().join("abs");

        let escaping = [
            PackageDescriptor::new("https://example.com/foo.zip", "..", "outside", &fixture.destination),
            PackageDescriptor::new(
                "https://example.com/foo.zip",
                "Foo",
                absolute.to_string_lossy(),
                &fixture.destination,
            ),
            PackageDescriptor::new("https://example.com/foo.zip", "Foo/bar", "1.0.1", &fixture.destination),
            PackageDescriptor::new("https://example.com/foo.zip", "Foo", "", &fixture.destination),
        ];

        for descriptor in escaping {
            let descriptor = descriptor.trusted(true);
            let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Configuration, "{:?}", descriptor.name);

            let err = installer.installed(&descriptor).await.unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Configuration);
        }

        assert!(!fixture.temp.path().join("outside").exists());
        assert!(!absolute.exists());
        assert!(!fixture.destination.exists());
        assert!(!fixture.staging.exists());
    }

    #[tokio::test]
    async fn test_missing_download_fails() {
        let fixture = Fixture::new();
        let installer = fixture.builder(None).build().unwrap();
        let descriptor = fixture.descriptor();

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(!fixture.destination.exists());
    }

    #[tokio::test]
    async fn test_declined_trust_is_a_warning() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let trust = Arc::new(CountingTrust { answer: false, asked: AtomicUsize::new(0) });
        let installer = fixture.builder(Some(archive)).trust(trust.clone()).build().unwrap();
        let descriptor = fixture.descriptor().trusted(false);

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();

        assert!(matches!(err, InstallError::TrustDeclined { .. }));
        assert_eq!(err.severity(), crate::Severity::Warning);
        assert_eq!(trust.asked.load(Ordering::SeqCst), 1);
        assert!(!fixture.destination.exists());
        assert!(fixture.staging_is_empty());
    }

    #[tokio::test]
    async fn test_trusted_descriptor_skips_prompt() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let trust = Arc::new(CountingTrust { answer: false, asked: AtomicUsize::new(0) });
        let installer = fixture.builder(Some(archive)).trust(trust.clone()).build().unwrap();
        let descriptor = fixture.descriptor();

        installer.install(&descriptor, identity(&descriptor)).await.unwrap();
        assert_eq!(trust.asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_creates_no_version_folder() {
        let fixture = Fixture::new();
        let archive = fixture.temp.path().join("corrupt.zip");
        fs::write(&archive, "not a zip").unwrap();
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture.descriptor();

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Extraction);
        assert!(!fixture.version_dir().exists());
        assert!(fixture.staging_is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_rolls_back_copied_files() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a"), ("bin/foo", "foo")]);
        let installer = fixture
            .builder(Some(archive))
            .registry(Arc::new(FailingRegistry))
            .build()
            .unwrap();
        let descriptor = fixture.descriptor();

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Registry);
        assert!(!fixture.version_dir().exists());
        assert!(!fixture.destination.join("Foo").exists());
        assert!(fixture.staging_is_empty());
    }

    #[tokio::test]
    async fn test_rollback_keeps_sibling_versions() {
        let fixture = Fixture::new();
        let sibling = fixture.destination.join("Foo").join("0.9.0");
        fs::create_dir_all(&sibling).unwrap();
        fs::write(sibling.join("a.txt"), "old").unwrap();

        let archive = fixture.archive(&[("a.txt", "a")]);
        let installer = fixture
            .builder(Some(archive))
            .registry(Arc::new(FailingRegistry))
            .build()
            .unwrap();
        let descriptor = fixture.descriptor();

        installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();

        assert!(!fixture.version_dir().exists());
        assert_eq!(fs::read_to_string(sibling.join("a.txt")).unwrap(), "old");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_locked_version_folder_is_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "new")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture.descriptor();

        let version_dir = fixture.version_dir();
        fs::create_dir_all(&version_dir).unwrap();
        fs::write(version_dir.join("a.txt"), "old").unwrap();
        fs::set_permissions(&version_dir, fs::Permissions::from_mode(0o555)).unwrap();
        fs::set_permissions(version_dir.join("a.txt"), fs::Permissions::from_mode(0o444)).unwrap();

        // Root ignores permission bits, nothing to observe there
        if fs::write(version_dir.join("write-check"), "").is_ok() {
            fs::set_permissions(&version_dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
        fs::set_permissions(&version_dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(err.category(), ErrorCategory::LockedResource);
        assert_eq!(fs::read_to_string(version_dir.join("a.txt")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_cancel_before_download() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let installer = fixture.builder(Some(archive)).cancellation(cancel).build().unwrap();
        let descriptor = fixture.descriptor();

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
        assert!(matches!(err, InstallError::Canceled));
        assert!(!fixture.destination.exists());
    }

    #[tokio::test]
    async fn test_cancellation_and_failure_complete_progress_once() {
        let fixture = Fixture::new();
        let archive = fixture.temp.path().join("corrupt.zip");
        fs::write(&archive, "not a zip").unwrap();

        let cancel = CancellationFlag::new();
        let progress = Arc::new(CancelOnStart {
            inner: RecordingProgress::default(),
            cancel: cancel.clone(),
        });
        let installer = fixture
            .builder(Some(archive))
            .progress(progress.clone())
            .cancellation(cancel)
            .build()
            .unwrap();
        let descriptor = fixture.descriptor();

        let err = installer.install(&descriptor, identity(&descriptor)).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(err.category(), ErrorCategory::Extraction);
        assert_eq!(progress.inner.stops(), 1);
        assert_eq!(progress.inner.completions(), 1);
        assert!(progress.inner.reports().len() <= 1);
        assert!(fixture.staging_is_empty());
    }

    #[tokio::test]
    async fn test_install_then_uninstall() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("bin/foo", "#!/bin/sh"), ("README", "foo")]);
        let registry = Arc::new(MemoryRegistry::new());
        let stores = EnvironmentStores::new(
            Arc::new(MemoryStore::with_value(PATH_KEY, "/usr/bin")),
            Arc::new(MemoryStore::with_value(PATH_KEY, "/usr/bin")),
            Arc::new(MemoryStore::new()),
        );
        let installer = fixture
            .builder(Some(archive))
            .registry(registry.clone())
            .environment(stores.clone())
            .options(InstallOptions {
                add_to_path: true,
                remove_from_path: true,
                ..fixture.options()
            })
            .build()
            .unwrap();
        let descriptor = fixture.descriptor();

        let installed = installer.install(&descriptor, identity(&descriptor)).await.unwrap();
        let entry = fixture.version_dir().to_string_lossy().into_owned();
        let path = stores.machine.read(PATH_KEY).unwrap().unwrap();
        assert!(installer.environment().contains(&path, &entry));
        assert_eq!(registry.list().await.unwrap().len(), 1);

        let uninstalled = installer.uninstall(&installed.record.identity_token).await.unwrap();

        assert_eq!(uninstalled.identity.name, "Foo");
        assert!(!fixture.destination.join("Foo").exists());
        assert!(registry.list().await.unwrap().is_empty());
        assert_eq!(stores.machine.read(PATH_KEY).unwrap().as_deref(), Some("/usr/bin"));
        assert_eq!(stores.process.read(PATH_KEY).unwrap().as_deref(), Some("/usr/bin"));
        // Nothing to read in the empty user store
        assert!(uninstalled
            .warnings
            .iter()
            .all(|w| w.category == ErrorCategory::EnvironmentUpdate));
    }

    #[tokio::test]
    async fn test_uninstall_keeps_other_versions() {
        let fixture = Fixture::new();
        let other = fixture.destination.join("Foo").join("2.0.0");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("a.txt"), "a").unwrap();

        let archive = fixture.archive(&[("a.txt", "a")]);
        let installer = fixture.builder(Some(archive)).build().unwrap();
        let descriptor = fixture.descriptor();
        let installed = installer.install(&descriptor, identity(&descriptor)).await.unwrap();

        installer.uninstall(&installed.record.identity_token).await.unwrap();
        assert!(!fixture.version_dir().exists());
        assert!(other.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_uninstall_missing_directory() {
        let fixture = Fixture::new();
        let installer = fixture.builder(None).build().unwrap();
        let token = PackageIdentity::for_descriptor(&fixture.descriptor(), "zpkg")
            .with_installed_path(fixture.version_dir())
            .encode();

        let err = installer.uninstall(&token).await.unwrap_err();
        assert!(matches!(err, InstallError::DirectoryNotFound(_)));
        assert_eq!(err.category(), ErrorCategory::InvalidData);
    }

    #[tokio::test]
    async fn test_uninstall_malformed_token() {
        let fixture = Fixture::new();
        let installer = fixture.builder(None).build().unwrap();

        let err = installer.uninstall("not-a-token").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::IdentityParse);
    }

    #[tokio::test]
    async fn test_opposite_flags_warn() {
        let fixture = Fixture::new();
        let archive = fixture.archive(&[("a.txt", "a")]);
        let installer = fixture
            .builder(Some(archive))
            .trust(Arc::new(AlwaysTrust))
            .options(InstallOptions {
                add_to_path: true,
                remove_from_path: true,
                ..fixture.options()
            })
            .build()
            .unwrap();
        let descriptor = fixture.descriptor().trusted(false);

        let installed = installer.install(&descriptor, identity(&descriptor)).await.unwrap();
        assert!(installed.warnings.iter().any(|w| w.message.contains("remove-from-path")));

        let uninstalled = installer.uninstall(&installed.record.identity_token).await.unwrap();
        assert!(uninstalled.warnings.iter().any(|w| w.message.contains("add-to-path")));
    }

    #[tokio::test]
    async fn test_installed_check() {
        let fixture = Fixture::new();
        let registry = Arc::new(MemoryRegistry::new());
        let installer = fixture.builder(None).registry(registry.clone()).build().unwrap();
        let descriptor = fixture.descriptor();

        assert!(installer.installed(&descriptor).await.unwrap().is_none());

        fs::create_dir_all(fixture.version_dir().join("empty")).unwrap();
        assert!(installer.installed(&descriptor).await.unwrap().is_none());

        fs::write(fixture.version_dir().join("empty").join("a.txt"), "a").unwrap();
        let record = installer.installed(&descriptor).await.unwrap().unwrap();
        assert_eq!(record.installed_path, fixture.version_dir());
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_installed_check_reuses_registered_record() {
        let fixture = Fixture::new();
        let registry = Arc::new(MemoryRegistry::new());
        let installer = fixture.builder(None).registry(registry.clone()).build().unwrap();
        let descriptor = fixture.descriptor();

        fs::create_dir_all(fixture.version_dir()).unwrap();
        fs::write(fixture.version_dir().join("a.txt"), "a").unwrap();

        let existing = InstallationRecord::new(
            &descriptor,
            &PackageIdentity::for_descriptor(&descriptor, "other-provider").with_installed_path(fixture.version_dir()),
        );
        registry.register(&existing).await.unwrap();

        let record = installer.installed(&descriptor).await.unwrap().unwrap();
        assert_eq!(record.identity_token, existing.identity_token);
        assert_eq!(registry.list().await.unwrap().len(), 1);

        let decoded = PackageIdentity::decode(&record.identity_token).unwrap();
        assert_eq!(decoded.provider_name, "other-provider");
    }
}
