//! External collaborators
//!
//! Transcription and rendering each sit behind a single-method trait so jobs
//! can run against real child processes or deterministic fakes.

pub mod ffmpeg;
pub mod whisperx;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::style::StyleDescriptor;
use crate::transcript::Transcript;

pub use ffmpeg::FfmpegRenderer;
pub use whisperx::WhisperxCli;

/// Bytes of stderr kept as diagnostics
const DIAGNOSTIC_TAIL_BYTES: usize = 4096;

/// Speech-to-text engine
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a video file into language-tagged segments
    async fn transcribe(&self, video: &Path) -> Result<Transcript>;
}

/// Everything the renderer needs to burn captions into a video
#[derive(Debug, Clone)]
pub struct BurnRequest {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub style: StyleDescriptor,
    pub output: PathBuf,
}

/// Video encoder that burns subtitles into frames
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn burn(&self, request: &BurnRequest) -> Result<()>;
}

/// Last few KiB of a process's stderr, cut on a char boundary
pub(crate) fn diagnostic_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut cut = text.len().saturating_sub(DIAGNOSTIC_TAIL_BYTES);
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    Some(text[cut..].to_string())
}
