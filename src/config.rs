//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CaptionError, Result};
use crate::style::Position;

/// Temp storage and input limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding inputs, subtitle files and outputs
    pub temp_dir: PathBuf,

    /// Upload / download ceiling in bytes
    pub max_upload_bytes: u64,

    /// Accepted video extensions (lowercase, with leading dot)
    pub allowed_extensions: Vec<String>,

    /// How long a finished output stays downloadable
    pub output_retention_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp"),
            max_upload_bytes: 500_000_000,
            allowed_extensions: [".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_retention_secs: 30 * 60,
        }
    }
}

impl StorageConfig {
    /// Check an extension (with or without dot, any case) against the allowed set
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.trim().to_lowercase();
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{}", ext)
        };
        self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext))
    }
}

/// Caption grouping thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Flush once this many words are pending
    pub words_per_caption: usize,

    /// Never flush early with fewer than this many words
    pub min_words_per_caption: usize,

    /// Flush once the pending span reaches this many seconds
    pub max_caption_duration: f64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            words_per_caption: 7,
            min_words_per_caption: 5,
            max_caption_duration: 4.0,
        }
    }
}

/// Subtitle styling defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    pub font_name: String,
    pub font_size: u32,
    pub font_color: String,
    pub outline_color: String,
    pub background_color: String,
    /// Alpha byte for the background box (00 opaque, FF transparent)
    pub background_alpha: u8,
    pub outline_width: u32,
    pub shadow_width: u32,
    pub margin_v: u32,
    pub position: Position,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font_name: "Arial Bold".to_string(),
            font_size: 24,
            font_color: "white".to_string(),
            outline_color: "black".to_string(),
            background_color: "black".to_string(),
            background_alpha: 0x80,
            outline_width: 2,
            shadow_width: 1,
            margin_v: 20,
            position: Position::Bottom,
        }
    }
}

/// WhisperX command-line settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    pub command: String,
    pub model: String,
    pub batch_size: u32,
    pub device: Option<String>,
    pub compute_type: Option<String>,
    /// Force a language instead of auto-detection
    pub language: Option<String>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            command: "whisperx".to_string(),
            model: "large-v2".to_string(),
            batch_size: 16,
            device: None,
            compute_type: None,
            language: None,
        }
    }
}

/// FFmpeg encoding settings for the burn step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub ffmpeg_path: String,
    pub preset: String,
    pub crf: u8,
    pub threads: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            threads: 4,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    pub storage: StorageConfig,
    pub captions: CaptionConfig,
    pub style: StyleConfig,
    pub transcriber: TranscriberConfig,
    pub renderer: RendererConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_json: false,
            storage: StorageConfig::default(),
            captions: CaptionConfig::default(),
            style: StyleConfig::default(),
            transcriber: TranscriberConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject threshold and style combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let c = &self.captions;
        if c.words_per_caption == 0 {
            return Err(CaptionError::Config(
                "words_per_caption must be at least 1".to_string(),
            ));
        }
        if c.min_words_per_caption > c.words_per_caption {
            return Err(CaptionError::Config(format!(
                "min_words_per_caption ({}) exceeds words_per_caption ({})",
                c.min_words_per_caption, c.words_per_caption
            )));
        }
        if !(c.max_caption_duration > 0.0) {
            return Err(CaptionError::Config(
                "max_caption_duration must be positive".to_string(),
            ));
        }
        if !crate::style::FONT_SIZE_RANGE.contains(&self.style.font_size) {
            return Err(CaptionError::Config(format!(
                "default font size {} outside 12..=72",
                self.style.font_size
            )));
        }
        Ok(())
    }
}
