//! Caption Server
//!
//! Accepts a video upload or URL, transcribes it with WhisperX, groups the
//! words into timed SRT cues and burns them into the picture with FFmpeg.

mod acquire;
mod caption;
mod config;
mod config_file;
mod engine;
mod error;
mod http;
mod job;
mod metrics;
mod state;
mod store;
mod style;
mod transcript;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::config_file::ConfigFile;
use crate::engine::{FfmpegRenderer, WhisperxCli};
use crate::error::{CaptionError, Result};
use crate::http::create_router;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "caption-server";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let first = args.next();

    if first.as_deref() == Some("--init-config") {
        let path = args.next().unwrap_or_else(|| "config.toml".to_string());
        config_file::generate_default_config(&path)
            .map_err(|e| CaptionError::Config(format!("Cannot write {}: {}", path, e)))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    // Load configuration before logging so the log format can come from it
    let config_path = first.unwrap_or_else(|| "config.toml".to_string());
    let (config, load_warning) = load_config(&config_path);

    init_logging(&config);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    if let Some(warning) = load_warning {
        tracing::warn!("{}", warning);
    }
    config.validate()?;
    tracing::info!("Configuration loaded: {:?}", config);

    probe_collaborators(&config).await;

    // Create application state
    let state = Arc::new(AppState::new(config.clone())?);

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| CaptionError::Config(format!("Invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Read the TOML config, falling back to defaults. The second value is a
/// warning to log once logging is up.
fn load_config(path: &str) -> (ServerConfig, Option<String>) {
    if !std::path::Path::new(path).exists() {
        return (ServerConfig::default(), None);
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_server_config(), None),
        Err(e) => (
            ServerConfig::default(),
            Some(format!(
                "Failed to load config file {}: {}. Using defaults.",
                path, e
            )),
        ),
    }
}

/// Check that the external tools are callable. Failures only warn; jobs will
/// report the real error when they run.
async fn probe_collaborators(config: &ServerConfig) {
    match FfmpegRenderer::new(config.renderer.clone()).probe().await {
        Ok(version) => tracing::info!("FFmpeg: {}", version),
        Err(e) => tracing::warn!("FFmpeg unavailable: {}", e),
    }
    match WhisperxCli::new(config.transcriber.clone()).probe().await {
        Ok(()) => tracing::info!("Transcriber command {} found", config.transcriber.command),
        Err(e) => tracing::warn!("Transcriber unavailable: {}", e),
    }
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "caption_server={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
