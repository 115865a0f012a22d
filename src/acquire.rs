//! Input acquisition
//!
//! Gets the source video onto local disk: validated uploads, streamed URL
//! downloads, or an already-resident file the job must not delete.

use bytes::Bytes;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{CaptionError, Result};
use crate::store::{remove_file, ResourceStore, INPUT_PREFIX};

/// Extensions trusted when they appear in a download URL's path
const URL_VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".webm"];

/// Extension used when neither URL nor content type says otherwise
const DEFAULT_EXTENSION: &str = ".mp4";

/// Where a job's video comes from
#[derive(Debug, Clone)]
pub enum JobInput {
    /// Bytes uploaded by the caller, with the client-side filename
    Upload { filename: String, data: Bytes },
    /// Remote video to download
    Url(String),
    /// File already on disk; never deleted by the job
    Resident(PathBuf),
}

impl JobInput {
    pub fn kind(&self) -> &'static str {
        match self {
            JobInput::Upload { .. } => "upload",
            JobInput::Url(_) => "url",
            JobInput::Resident(_) => "resident",
        }
    }
}

/// A video ready for transcription
#[derive(Debug, Clone)]
pub struct AcquiredInput {
    pub path: PathBuf,
    /// True when this job created the file and must delete it
    pub owned: bool,
}

/// Lowercased extension with leading dot, or empty
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Check an upload before it touches disk. Returns the extension to keep.
pub fn validate_upload(filename: &str, size: u64, storage: &StorageConfig) -> Result<String> {
    let ext = extension_of(filename);
    if !storage.is_allowed_extension(&ext) {
        return Err(CaptionError::Acquisition(format!(
            "Unsupported video format: {}",
            filename
        )));
    }
    if size > storage.max_upload_bytes {
        return Err(CaptionError::Acquisition(format!(
            "File too large. Maximum size: {} bytes",
            storage.max_upload_bytes
        )));
    }
    Ok(ext)
}

/// Pick an extension for a downloaded video
pub fn infer_extension(url: &str, content_type: Option<&str>) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = extension_of(path);
    if let Some(known) = URL_VIDEO_EXTENSIONS.iter().copied().find(|e| *e == ext) {
        return known;
    }

    let content_type = content_type.unwrap_or_default().to_lowercase();
    if content_type.contains("mp4") {
        ".mp4"
    } else if content_type.contains("webm") {
        ".webm"
    } else if content_type.contains("quicktime") {
        ".mov"
    } else {
        DEFAULT_EXTENSION
    }
}

/// Fetches inputs into the resource store
#[derive(Debug, Clone)]
pub struct Acquirer {
    client: reqwest::Client,
    storage: StorageConfig,
}

impl Acquirer {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            storage,
        }
    }

    pub async fn acquire(&self, input: &JobInput, store: &ResourceStore) -> Result<AcquiredInput> {
        match input {
            JobInput::Upload { filename, data } => {
                let path = self.persist_upload(filename, data, store).await?;
                Ok(AcquiredInput { path, owned: true })
            }
            JobInput::Url(url) => {
                let path = self.download(url, store).await?;
                Ok(AcquiredInput { path, owned: true })
            }
            JobInput::Resident(path) => {
                if !path.is_file() {
                    return Err(CaptionError::Acquisition(format!(
                        "Input file does not exist: {}",
                        path.display()
                    )));
                }
                Ok(AcquiredInput {
                    path: path.clone(),
                    owned: false,
                })
            }
        }
    }

    async fn persist_upload(
        &self,
        filename: &str,
        data: &Bytes,
        store: &ResourceStore,
    ) -> Result<PathBuf> {
        let ext = validate_upload(filename, data.len() as u64, &self.storage)?;
        let path = store.allocate(INPUT_PREFIX, &ext);
        if let Err(e) = tokio::fs::write(&path, data).await {
            remove_file(&path).await;
            return Err(CaptionError::Acquisition(format!(
                "Failed to save upload: {}",
                e
            )));
        }
        tracing::debug!(bytes = data.len(), "Saved upload to {}", path.display());
        Ok(path)
    }

    async fn download(&self, url: &str, store: &ResourceStore) -> Result<PathBuf> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| CaptionError::Acquisition(format!("Invalid URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CaptionError::Acquisition(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| CaptionError::Acquisition(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptionError::Acquisition(format!(
                "Download of {} failed with status {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let ext = infer_extension(url, content_type.as_deref());
        let path = store.allocate(INPUT_PREFIX, ext);

        match self.write_body(response, &path).await {
            Ok(bytes) => {
                tracing::debug!(bytes, "Downloaded {} to {}", url, path.display());
                Ok(path)
            }
            Err(e) => {
                remove_file(&path).await;
                Err(e)
            }
        }
    }

    async fn write_body(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| CaptionError::Acquisition(format!("Failed to create temp file: {}", e)))?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| CaptionError::Acquisition(format!("Download interrupted: {}", e)))?;
            written += chunk.len() as u64;
            if written > self.storage.max_upload_bytes {
                return Err(CaptionError::Acquisition(format!(
                    "File too large. Maximum size: {} bytes",
                    self.storage.max_upload_bytes
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| CaptionError::Acquisition(format!("Failed to write download: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| CaptionError::Acquisition(format!("Failed to write download: {}", e)))?;
        Ok(written)
    }
}
