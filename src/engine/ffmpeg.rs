//! FFmpeg subtitle burn-in

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::RendererConfig;
use crate::engine::{diagnostic_tail, BurnRequest, Renderer};
use crate::error::{CaptionError, Result};

/// Escape a value for use inside an FFmpeg filter option
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace(',', "\\,")
        .replace('\'', "\\'")
}

/// Renders through the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    config: RendererConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// `subtitles=...` video filter for a subtitle file and style string
    pub fn subtitle_filter(subtitles: &Path, force_style: &str) -> String {
        format!(
            "subtitles='{}':force_style='{}'",
            escape_filter_value(&subtitles.to_string_lossy()),
            force_style
        )
    }

    pub fn build_args(&self, request: &BurnRequest) -> Vec<String> {
        vec![
            "-i".to_string(),
            request.video.to_string_lossy().to_string(),
            "-vf".to_string(),
            Self::subtitle_filter(&request.subtitles, &request.style.to_force_style()),
            "-c:a".to_string(),
            "copy".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-threads".to_string(),
            self.config.threads.to_string(),
            "-y".to_string(),
            request.output.to_string_lossy().to_string(),
        ]
    }

    /// Run `ffmpeg -version` and return its first line
    pub async fn probe(&self) -> Result<String> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| CaptionError::Rendering {
                message: format!("Cannot run {}: {}", self.config.ffmpeg_path, e),
                diagnostics: None,
            })?;
        if !output.status.success() {
            return Err(CaptionError::Rendering {
                message: format!("{} -version exited with {}", self.config.ffmpeg_path, output.status),
                diagnostics: diagnostic_tail(&output.stderr),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn burn(&self, request: &BurnRequest) -> Result<()> {
        let args = self.build_args(request);
        tracing::debug!("Running {} {}", self.config.ffmpeg_path, args.join(" "));

        let output = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptionError::Rendering {
                message: format!("Failed to start {}: {}", self.config.ffmpeg_path, e),
                diagnostics: None,
            })?;

        if !output.status.success() {
            return Err(CaptionError::Rendering {
                message: format!("FFmpeg exited with {}", output.status),
                diagnostics: diagnostic_tail(&output.stderr),
            });
        }
        Ok(())
    }
}
