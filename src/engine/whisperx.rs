//! WhisperX command-line transcriber

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::TranscriberConfig;
use crate::engine::{diagnostic_tail, Transcriber};
use crate::error::{CaptionError, Result};
use crate::transcript::{Transcript, TranscriptSegment, Word};

/// Language reported when the engine does not say
const DEFAULT_LANGUAGE: &str = "en";

/// Raw JSON written by `whisperx --output_format json`
#[derive(Debug, Deserialize)]
struct RawTranscript {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<RawWord>,
}

#[derive(Debug, Deserialize)]
struct RawWord {
    word: String,
    start: Option<f64>,
    end: Option<f64>,
    score: Option<f32>,
}

impl From<RawSegment> for TranscriptSegment {
    fn from(raw: RawSegment) -> Self {
        TranscriptSegment {
            text: raw.text.trim().to_string(),
            start: raw.start,
            end: raw.end,
            words: raw
                .words
                .into_iter()
                .map(|w| Word {
                    text: w.word,
                    start: w.start,
                    end: w.end,
                    confidence: w.score,
                })
                .collect(),
        }
    }
}

/// Parse WhisperX JSON output
pub fn parse_output(json: &str) -> Result<Transcript> {
    let raw: RawTranscript =
        serde_json::from_str(json).map_err(|e| CaptionError::Transcription {
            message: format!("Unexpected transcriber output: {}", e),
            diagnostics: None,
        })?;
    Ok(Transcript {
        language: raw
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        segments: raw.segments.into_iter().map(Into::into).collect(),
    })
}

/// Runs the `whisperx` CLI as a child process
#[derive(Debug, Clone)]
pub struct WhisperxCli {
    config: TranscriberConfig,
}

impl WhisperxCli {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Argument list for one transcription run
    pub fn build_args(&self, video: &Path, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            video.to_string_lossy().to_string(),
            "--model".to_string(),
            self.config.model.clone(),
            "--batch_size".to_string(),
            self.config.batch_size.to_string(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            output_dir.to_string_lossy().to_string(),
        ];
        let optional = [
            ("--device", &self.config.device),
            ("--compute_type", &self.config.compute_type),
            ("--language", &self.config.language),
        ];
        for (flag, value) in optional {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }

    /// Where WhisperX writes its JSON for `video`
    fn output_path(video: &Path, output_dir: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "transcript".to_string());
        output_dir.join(format!("{}.json", stem))
    }

    /// Check that the command can be spawned at all
    pub async fn probe(&self) -> Result<()> {
        let status = Command::new(&self.config.command)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CaptionError::Transcription {
                message: format!("Cannot run {}: {}", self.config.command, e),
                diagnostics: None,
            })?;
        tracing::debug!("{} --help exited with {}", self.config.command, status);
        Ok(())
    }
}

#[async_trait]
impl Transcriber for WhisperxCli {
    async fn transcribe(&self, video: &Path) -> Result<Transcript> {
        let scratch = tempfile::tempdir()?;
        let args = self.build_args(video, scratch.path());
        tracing::debug!("Running {} {}", self.config.command, args.join(" "));

        let output = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptionError::Transcription {
                message: format!("Failed to start {}: {}", self.config.command, e),
                diagnostics: None,
            })?;

        if !output.status.success() {
            return Err(CaptionError::Transcription {
                message: format!("{} exited with {}", self.config.command, output.status),
                diagnostics: diagnostic_tail(&output.stderr),
            });
        }

        let json_path = Self::output_path(video, scratch.path());
        let json = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| CaptionError::Transcription {
                message: format!("Missing transcriber output {}: {}", json_path.display(), e),
                diagnostics: diagnostic_tail(&output.stderr),
            })?;
        let transcript = parse_output(&json)?;

        tracing::debug!(
            language = %transcript.language,
            segments = transcript.segments.len(),
            words = transcript.word_count(),
            "Transcription finished"
        );
        Ok(transcript)
    }
}
