//! Archive downloader for HTTP(S) and local sources.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::http::HttpClient;
use crate::{InstallError, Result};

/// Fetches an archive to a local file.
///
/// Implementations must leave `dest` absent when the fetch fails.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()>;
}

enum SourceLocation {
    Remote(Url),
    Local(PathBuf),
}

impl SourceLocation {
    fn parse(source: &str) -> Result<Self> {
        match Url::parse(source) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(SourceLocation::Remote(url)),
                "file" => url.to_file_path().map(SourceLocation::Local).map_err(|_| {
                    InstallError::DownloadFailed {
                        package: source.to_string(),
                        reason: "file URL does not name a local path".to_string(),
                    }
                }),
                // Windows drive letters parse as a one-letter scheme
                scheme if scheme.len() == 1 => Ok(SourceLocation::Local(PathBuf::from(source))),
                scheme => Err(InstallError::DownloadFailed {
                    package: source.to_string(),
                    reason: format!("unsupported scheme '{}'", scheme),
                }),
            },
            Err(_) => Ok(SourceLocation::Local(PathBuf::from(source))),
        }
    }
}

/// Downloads `http`/`https` sources and copies `file://` or plain paths
pub struct SourceDownloader {
    http_client: Arc<HttpClient>,
}

impl SourceDownloader {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self { http_client }
    }

    async fn fetch_location(&self, location: SourceLocation, dest: &Path) -> Result<()> {
        match location {
            SourceLocation::Remote(url) => {
                log::debug!("Downloading {} to {}", url, dest.display());
                self.http_client
                    .download(url.as_str(), dest, None::<fn(u64, u64)>)
                    .await
                    .map_err(|e| InstallError::DownloadFailed {
                        package: url.to_string(),
                        reason: e.to_string(),
                    })
            }
            SourceLocation::Local(path) => {
                log::debug!("Copying {} to {}", path.display(), dest.display());
                tokio::fs::copy(&path, dest)
                    .await
                    .map(|_| ())
                    .map_err(|e| InstallError::DownloadFailed {
                        package: path.display().to_string(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

#[async_trait]
impl Downloader for SourceDownloader {
    async fn fetch(&self, source: &str, dest: &Path) -> Result<()> {
        let location = SourceLocation::parse(source)?;

        let result = self.fetch_location(location, dest).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::debug!("Failed to remove partial download {}: {}", dest.display(), e);
                }
            }
        }
        result
    }
}
