use std::fmt;

use thiserror::Error;

/// Main error type for the caption server
#[derive(Error, Debug)]
pub enum CaptionError {
    /// Bad extension, oversized upload, or an unreachable/erroring URL
    #[error("Input acquisition failed: {0}")]
    Acquisition(String),

    /// The transcription engine failed or returned an unexpected shape
    #[error("Transcription failed: {message}")]
    Transcription {
        message: String,
        diagnostics: Option<String>,
    },

    #[error("No speech detected in video")]
    NoSpeech,

    #[error("Failed to write subtitle file: {0}")]
    SubtitleWrite(String),

    /// The rendering engine exited abnormally
    #[error("Rendering failed: {message}")]
    Rendering {
        message: String,
        diagnostics: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptionError {
    /// Stable machine-readable code for API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            CaptionError::Acquisition(_) => "acquisition_failed",
            CaptionError::Transcription { .. } => "transcription_failed",
            CaptionError::NoSpeech => "no_speech",
            CaptionError::SubtitleWrite(_) => "subtitle_write_failed",
            CaptionError::Rendering { .. } => "rendering_failed",
            CaptionError::Config(_) => "config_error",
            CaptionError::Io(_) | CaptionError::Internal(_) => "internal_error",
        }
    }

    /// Collaborator diagnostic text, if any was captured
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CaptionError::Transcription { diagnostics, .. }
            | CaptionError::Rendering { diagnostics, .. } => diagnostics.as_deref(),
            _ => None,
        }
    }
}

/// Pipeline states a job passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    AcquireInput,
    Transcribe,
    Segment,
    FormatSubtitles,
    Style,
    Burn,
    ExposeResult,
}

impl JobStage {
    pub const ALL: [JobStage; 7] = [
        JobStage::AcquireInput,
        JobStage::Transcribe,
        JobStage::Segment,
        JobStage::FormatSubtitles,
        JobStage::Style,
        JobStage::Burn,
        JobStage::ExposeResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::AcquireInput => "acquire_input",
            JobStage::Transcribe => "transcribe",
            JobStage::Segment => "segment",
            JobStage::FormatSubtitles => "format_subtitles",
            JobStage::Style => "style",
            JobStage::Burn => "burn",
            JobStage::ExposeResult => "expose_result",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed job: the stage it stopped in and why
#[derive(Error, Debug)]
#[error("{source} (stage: {stage})")]
pub struct JobError {
    pub stage: JobStage,
    #[source]
    pub source: CaptionError,
}

impl JobError {
    pub fn new(stage: JobStage, source: CaptionError) -> Self {
        Self { stage, source }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CaptionError>;
