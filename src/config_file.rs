//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` is optional and falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{
    CaptionConfig, RendererConfig, ServerConfig, StorageConfig, StyleConfig, TranscriberConfig,
};
use crate::style::Position;

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    pub storage: Option<StorageSettings>,
    pub captions: Option<CaptionSettings>,
    pub style: Option<StyleSettings>,
    pub transcriber: Option<TranscriberSettings>,
    pub renderer: Option<RendererSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub temp_dir: Option<PathBuf>,
    /// Upload ceiling in MB
    pub max_upload_mb: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,
    /// Output retention in minutes
    pub cleanup_delay_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSettings {
    pub words_per_caption: Option<usize>,
    pub min_words_per_caption: Option<usize>,
    pub max_caption_duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSettings {
    pub font_name: Option<String>,
    pub font_size: Option<u32>,
    pub font_color: Option<String>,
    pub outline_color: Option<String>,
    pub background_color: Option<String>,
    pub background_alpha: Option<u8>,
    pub outline_width: Option<u32>,
    pub shadow_width: Option<u32>,
    pub margin_v: Option<u32>,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberSettings {
    pub command: Option<String>,
    pub model: Option<String>,
    pub batch_size: Option<u32>,
    pub device: Option<String>,
    pub compute_type: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererSettings {
    pub ffmpeg_path: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u8>,
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(true),
            },
            storage: Some(StorageSettings {
                temp_dir: Some(defaults.storage.temp_dir),
                max_upload_mb: Some(500),
                allowed_extensions: Some(defaults.storage.allowed_extensions),
                cleanup_delay_minutes: Some(30),
            }),
            captions: Some(CaptionSettings {
                words_per_caption: Some(defaults.captions.words_per_caption),
                min_words_per_caption: Some(defaults.captions.min_words_per_caption),
                max_caption_duration: Some(defaults.captions.max_caption_duration),
            }),
            style: None,
            transcriber: None,
            renderer: None,
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let storage = self.storage.map_or_else(StorageConfig::default, |s| {
            let d = StorageConfig::default();
            StorageConfig {
                temp_dir: s.temp_dir.unwrap_or(d.temp_dir),
                max_upload_bytes: s
                    .max_upload_mb
                    .map(|mb| mb * 1_000_000)
                    .unwrap_or(d.max_upload_bytes),
                allowed_extensions: s
                    .allowed_extensions
                    .map(|exts| exts.into_iter().map(|e| e.to_lowercase()).collect())
                    .unwrap_or(d.allowed_extensions),
                output_retention_secs: s
                    .cleanup_delay_minutes
                    .map(|m| m * 60)
                    .unwrap_or(d.output_retention_secs),
            }
        });

        let captions = self.captions.map_or_else(CaptionConfig::default, |c| {
            let d = CaptionConfig::default();
            CaptionConfig {
                words_per_caption: c.words_per_caption.unwrap_or(d.words_per_caption),
                min_words_per_caption: c.min_words_per_caption.unwrap_or(d.min_words_per_caption),
                max_caption_duration: c.max_caption_duration.unwrap_or(d.max_caption_duration),
            }
        });

        let style = self.style.map_or_else(StyleConfig::default, |s| {
            let d = StyleConfig::default();
            StyleConfig {
                font_name: s.font_name.unwrap_or(d.font_name),
                font_size: s.font_size.unwrap_or(d.font_size),
                font_color: s.font_color.unwrap_or(d.font_color),
                outline_color: s.outline_color.unwrap_or(d.outline_color),
                background_color: s.background_color.unwrap_or(d.background_color),
                background_alpha: s.background_alpha.unwrap_or(d.background_alpha),
                outline_width: s.outline_width.unwrap_or(d.outline_width),
                shadow_width: s.shadow_width.unwrap_or(d.shadow_width),
                margin_v: s.margin_v.unwrap_or(d.margin_v),
                position: s.position.unwrap_or(d.position),
            }
        });

        let transcriber = self.transcriber.map_or_else(TranscriberConfig::default, |t| {
            let d = TranscriberConfig::default();
            TranscriberConfig {
                command: t.command.unwrap_or(d.command),
                model: t.model.unwrap_or(d.model),
                batch_size: t.batch_size.unwrap_or(d.batch_size),
                device: t.device,
                compute_type: t.compute_type,
                language: t.language,
            }
        });

        let renderer = self.renderer.map_or_else(RendererConfig::default, |r| {
            let d = RendererConfig::default();
            RendererConfig {
                ffmpeg_path: r.ffmpeg_path.unwrap_or(d.ffmpeg_path),
                preset: r.preset.unwrap_or(d.preset),
                crf: r.crf.unwrap_or(d.crf),
                threads: r.threads.unwrap_or(d.threads),
            }
        });

        let (log_level, log_json) = match self.logging {
            Some(l) => {
                let json = l.format.as_deref() == Some("json");
                (l.level, json)
            }
            None => ("info".to_string(), false),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level,
            log_json,
            storage,
            captions,
            style,
            transcriber,
            renderer,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
