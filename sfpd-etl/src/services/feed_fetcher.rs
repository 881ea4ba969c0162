//! Incident feed retrieval
//!
//! Two modes:
//! - **Bulk**: download the zipped CSV archive, extract it into the data
//!   directory, then scan every `*.csv` below it.
//! - **Incremental**: fetch the JSON document of incidents changed since the
//!   previous day.
//!
//! Each fetch is all-or-nothing: no retry, no partial results.

use crate::models::FeedDocument;
use async_trait::async_trait;
use serde_json::Value;
use sfpd_common::config::FeedConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

const USER_AGENT: &str = concat!("sfpd-etl/", env!("CARGO_PKG_VERSION"));

/// Feed fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Extract directory not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of the incremental incident feed
#[async_trait]
pub trait IncidentFeed: Send + Sync {
    /// Raw feed document, exactly as served
    async fn fetch_latest(&self) -> Result<Value, FetchError>;

    /// Feed document parsed into incident records
    async fn latest_incidents(&self) -> Result<FeedDocument, FetchError> {
        parse_feed(self.fetch_latest().await?)
    }
}

pub fn parse_feed(document: Value) -> Result<FeedDocument, FetchError> {
    serde_json::from_value(document).map_err(|e| FetchError::ParseError(e.to_string()))
}

/// HTTP fetcher for both feed modes
pub struct FeedFetcher {
    http_client: reqwest::Client,
    bulk_url: String,
    latest_url: String,
}

impl FeedFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            bulk_url: config.bulk_url.clone(),
            latest_url: config.latest_url.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::ApiError(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// Download the bulk archive to `dest`, returning its size in bytes
    pub async fn download_archive(&self, dest: &Path) -> Result<u64, FetchError> {
        tracing::info!(url = %self.bulk_url, dest = %dest.display(), "Downloading bulk archive");

        let mut response = self.get(&self.bulk_url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;

        // Stream to disk chunk by chunk
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(bytes = written, "Bulk archive downloaded");
        Ok(written)
    }
}

#[async_trait]
impl IncidentFeed for FeedFetcher {
    async fn fetch_latest(&self) -> Result<Value, FetchError> {
        tracing::info!(url = %self.latest_url, "Fetching latest incidents");

        self.get(&self.latest_url)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::ParseError(e.to_string()))
    }
}

/// Extract every entry of `archive` into `dest_dir`, overwriting existing files
///
/// Returns the number of archive entries.
pub async fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<usize, FetchError> {
    let archive = archive.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<usize, FetchError> {
        let file = std::fs::File::open(&archive)?;
        let mut zip =
            zip::ZipArchive::new(file).map_err(|e| FetchError::Archive(e.to_string()))?;
        let entries = zip.len();

        zip.extract(&dest_dir)
            .map_err(|e| FetchError::Archive(e.to_string()))?;

        tracing::info!(
            archive = %archive.display(),
            dest = %dest_dir.display(),
            entries,
            "Archive extracted"
        );
        Ok(entries)
    })
    .await
    .map_err(|e| FetchError::Archive(format!("extraction task failed: {}", e)))?
}

/// All `*.csv` files below `dir`, in path order
///
/// A missing root or an unreadable entry aborts the scan.
pub fn find_csv_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    if !dir.exists() {
        return Err(FetchError::PathNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(FetchError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| FetchError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_csv = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
