//! Temp artifact storage
//!
//! Hands out collision-free paths inside one temp directory, tracks outputs
//! that outlive their job, and reaps them after the retention delay.

use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::Result;

/// Prefix for acquired input videos
pub const INPUT_PREFIX: &str = "video";
/// Prefix for generated subtitle files
pub const SUBTITLE_PREFIX: &str = "subtitles";
/// Prefix for rendered outputs
pub const OUTPUT_PREFIX: &str = "captioned_video";

/// URL path under which outputs are served
pub const DOWNLOAD_ROUTE: &str = "/download";

/// An output kept on disk for download
#[derive(Debug, Clone)]
pub struct RetainedOutput {
    pub path: PathBuf,
    pub retained_at: SystemTime,
}

/// Temp directory manager shared by all jobs
#[derive(Debug)]
pub struct ResourceStore {
    temp_dir: PathBuf,
    /// Outputs awaiting download (filename -> entry)
    retained: DashMap<String, RetainedOutput>,
}

impl ResourceStore {
    /// Create the store, making sure the temp directory exists
    pub fn new(temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let temp_dir = temp_dir.into();
        std::fs::create_dir_all(&temp_dir)?;
        tracing::info!("Temp directory ready: {}", temp_dir.display());
        Ok(Self {
            temp_dir,
            retained: DashMap::new(),
        })
    }

    /// `<prefix>_<uuid><ext>`; `ext` includes its leading dot
    pub fn unique_name(prefix: &str, ext: &str) -> String {
        format!("{}_{}{}", prefix, Uuid::new_v4().simple(), ext)
    }

    /// Fresh path for a new artifact
    pub fn allocate(&self, prefix: &str, ext: &str) -> PathBuf {
        self.temp_dir.join(Self::unique_name(prefix, ext))
    }

    /// Download reference for an output path
    pub fn download_ref(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}/{}", DOWNLOAD_ROUTE, name)
    }

    /// Map a download filename back to a retained output. Inputs, subtitle
    /// files and in-progress renders share the directory but are never served.
    pub fn resolve_download(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return None;
        }
        let entry = self.retained.get(filename)?;
        entry.path.is_file().then(|| entry.path.clone())
    }

    /// Take ownership of a finished output
    pub fn retain_output(&self, path: &Path) {
        if let Some(name) = path.file_name() {
            self.retained.insert(
                name.to_string_lossy().to_string(),
                RetainedOutput {
                    path: path.to_path_buf(),
                    retained_at: SystemTime::now(),
                },
            );
        }
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }

    #[cfg(test)]
    pub fn is_retained(&self, filename: &str) -> bool {
        self.retained.contains_key(filename)
    }

    /// Delete a retained output and forget it. Idempotent.
    pub async fn reap(&self, filename: &str) -> bool {
        let path = match self.retained.remove(filename) {
            Some((_, entry)) => {
                let held = entry.retained_at.elapsed().unwrap_or_default();
                tracing::debug!("Releasing {} after {}s", filename, held.as_secs());
                entry.path
            }
            None => self.temp_dir.join(filename),
        };
        remove_file(&path).await
    }

    /// Reap an output after `delay` on its own task, detached from the job
    pub fn schedule_reap(self: &Arc<Self>, filename: String, delay: Duration) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if store.reap(&filename).await {
                tracing::info!(
                    remaining = store.retained_count(),
                    "Cleaned up expired output {}",
                    filename
                );
            }
        });
    }
}

/// Delete a file, treating "already gone" as success.
///
/// Returns true when a file was actually removed. Other errors are logged.
pub async fn remove_file(path: &Path) -> bool {
    removal_outcome(path, tokio::fs::remove_file(path).await)
}

/// Blocking variant of [`remove_file`] for contexts that cannot await
pub fn remove_file_now(path: &Path) -> bool {
    removal_outcome(path, std::fs::remove_file(path))
}

fn removal_outcome(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}
