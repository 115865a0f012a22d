//! Application state shared by all handlers

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::{FfmpegRenderer, Renderer, Transcriber, WhisperxCli};
use crate::error::Result;
use crate::job::Orchestrator;
use crate::metrics::Metrics;
use crate::store::ResourceStore;

/// Main application state
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<ResourceStore>,
    pub orchestrator: Orchestrator,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// State backed by the WhisperX and FFmpeg command-line tools
    pub fn new(config: ServerConfig) -> Result<Self> {
        let transcriber = Arc::new(WhisperxCli::new(config.transcriber.clone()));
        let renderer = Arc::new(FfmpegRenderer::new(config.renderer.clone()));
        Self::with_collaborators(config, transcriber, renderer)
    }

    /// State with explicit collaborators
    pub fn with_collaborators(
        config: ServerConfig,
        transcriber: Arc<dyn Transcriber>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        let store = Arc::new(ResourceStore::new(&config.storage.temp_dir)?);
        let metrics = Arc::new(Metrics::new());
        let orchestrator = Orchestrator::new(
            &config,
            Arc::clone(&store),
            transcriber,
            renderer,
            Arc::clone(&metrics),
        );
        Ok(Self {
            config,
            store,
            orchestrator,
            metrics,
        })
    }
}
