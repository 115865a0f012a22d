//! Test fixtures for integration tests
//!
//! Deterministic stand-ins for the transcription and rendering engines, plus
//! helpers for building a job environment in a scratch directory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::engine::{BurnRequest, Renderer, Transcriber};
use crate::error::{CaptionError, Result};
use crate::job::Orchestrator;
use crate::metrics::Metrics;
use crate::store::ResourceStore;
use crate::transcript::{Transcript, TranscriptSegment, Word};

/// The six-word sentence used across scenarios
pub fn hello_transcript() -> Transcript {
    Transcript {
        language: "en".to_string(),
        segments: vec![TranscriptSegment::from_words(vec![
            Word::new("Hello", 0.0, 0.4),
            Word::new("world", 0.4, 0.9),
            Word::new("this", 1.0, 1.3),
            Word::new("is", 1.3, 1.5),
            Word::new("a", 1.5, 1.6),
            Word::new("test", 1.6, 2.0),
        ])],
    }
}

/// Transcriber that returns a canned transcript or failure
pub struct FakeTranscriber {
    outcome: Mutex<Option<Result<Transcript>>>,
    canned: Option<Transcript>,
    /// Time spent "transcribing" before answering
    delay: Duration,
    /// Paths it was asked to transcribe
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeTranscriber {
    pub fn returning(transcript: Transcript) -> Self {
        Self {
            outcome: Mutex::new(None),
            canned: Some(transcript),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns `hello_transcript` only after `delay`
    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::returning(hello_transcript())
        }
    }

    /// Fails the first call with `err`
    pub fn failing(err: CaptionError) -> Self {
        Self {
            outcome: Mutex::new(Some(Err(err))),
            canned: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, video: &Path) -> Result<Transcript> {
        self.calls.lock().push(video.to_path_buf());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(outcome) = self.outcome.lock().take() {
            return outcome;
        }
        self.canned
            .clone()
            .ok_or_else(|| CaptionError::Internal("no canned transcript".into()))
    }
}

/// What the fake renderer does when asked to burn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderBehavior {
    /// Write a small output file and succeed
    WriteOutput,
    /// Write a partial output, then report a non-zero exit
    FailAfterPartialWrite,
    /// Report success without writing anything
    SucceedWithoutOutput,
    /// Write a partial output, then never finish
    StallAfterPartialWrite,
}

/// Renderer that records requests instead of running FFmpeg
pub struct FakeRenderer {
    behavior: RenderBehavior,
    pub requests: Mutex<Vec<BurnRequest>>,
    /// Subtitle documents as they were on disk during the burn
    pub subtitle_documents: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new(behavior: RenderBehavior) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
            subtitle_documents: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn burn(&self, request: &BurnRequest) -> Result<()> {
        self.requests.lock().push(request.clone());
        let document = tokio::fs::read_to_string(&request.subtitles).await?;
        self.subtitle_documents.lock().push(document);

        match self.behavior {
            RenderBehavior::WriteOutput => {
                tokio::fs::write(&request.output, b"captioned video").await?;
                Ok(())
            }
            RenderBehavior::FailAfterPartialWrite => {
                tokio::fs::write(&request.output, b"half a vid").await?;
                Err(CaptionError::Rendering {
                    message: "FFmpeg exited with exit status: 1".into(),
                    diagnostics: Some("Error initializing filter 'subtitles'".into()),
                })
            }
            RenderBehavior::SucceedWithoutOutput => Ok(()),
            RenderBehavior::StallAfterPartialWrite => {
                tokio::fs::write(&request.output, b"half a vid").await?;
                std::future::pending().await
            }
        }
    }
}

/// Config rooted in a scratch temp directory
pub fn test_config(temp_dir: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.storage.temp_dir = temp_dir.to_path_buf();
    config
}

/// Orchestrator wired to fakes
pub fn orchestrator(
    temp_dir: &Path,
    transcriber: Arc<FakeTranscriber>,
    renderer: Arc<FakeRenderer>,
) -> (Orchestrator, Arc<Metrics>) {
    let config = test_config(temp_dir);
    let store = Arc::new(ResourceStore::new(temp_dir).unwrap());
    let metrics = Arc::new(Metrics::new());
    let orchestrator = Orchestrator::new(
        &config,
        store,
        transcriber,
        renderer,
        Arc::clone(&metrics),
    );
    (orchestrator, metrics)
}

/// Names of everything currently in a directory
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Serve a router on an ephemeral local port
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
