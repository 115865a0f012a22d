//! Caption job orchestration
//!
//! A job is one sequential pass through
//! acquire -> transcribe -> segment -> format -> style -> burn -> expose.
//! Whatever happens, the job's own input and subtitle artifacts are removed
//! before `run` returns, or when its future is dropped part way through; the
//! output survives only on success, where it is handed to the store for
//! delayed reaping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::acquire::{AcquiredInput, Acquirer, JobInput};
use crate::caption::{format_srt, segment};
use crate::config::{CaptionConfig, ServerConfig, StyleConfig};
use crate::engine::{BurnRequest, Renderer, Transcriber};
use crate::error::{CaptionError, JobError, JobStage};
use crate::metrics::Metrics;
use crate::store::{
    remove_file, remove_file_now, ResourceStore, OUTPUT_PREFIX, SUBTITLE_PREFIX,
};
use crate::style::{StyleDescriptor, StyleOptions};

/// What the caller asked for
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub input: JobInput,
    pub style: StyleOptions,
}

/// A finished job
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: String,
    /// Download reference, `/download/<filename>`
    pub video_url: String,
    #[serde(skip)]
    pub output_path: PathBuf,
    pub language: String,
    /// Wall-clock seconds, two decimals
    pub processing_time: f64,
    pub completed_at: DateTime<Utc>,
}

/// Files a job has created so far
#[derive(Debug, Default)]
struct Artifacts {
    input: Option<AcquiredInput>,
    subtitles: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl Artifacts {
    /// Apply the cleanup policy. The output is kept only when `succeeded`.
    async fn cleanup(&mut self, succeeded: bool) {
        if let Some(input) = self.input.take().filter(|i| i.owned) {
            remove_file(&input.path).await;
        }
        if let Some(subtitles) = self.subtitles.take() {
            remove_file(&subtitles).await;
        }
        let output = self.output.take();
        if !succeeded {
            if let Some(output) = output {
                remove_file(&output).await;
            }
        }
    }
}

/// A job dropped before `cleanup` ran never finished, so nothing it made is kept
impl Drop for Artifacts {
    fn drop(&mut self) {
        let leftovers: Vec<PathBuf> = self
            .input
            .take()
            .filter(|i| i.owned)
            .map(|i| i.path)
            .into_iter()
            .chain(self.subtitles.take())
            .chain(self.output.take())
            .collect();
        if leftovers.is_empty() {
            return;
        }
        tracing::warn!(files = leftovers.len(), "Job abandoned, removing its artifacts");
        for path in &leftovers {
            remove_file_now(path);
        }
    }
}

/// Pipeline output before packaging
struct Completed {
    output: PathBuf,
    video_url: String,
    language: String,
}

fn at(stage: JobStage) -> impl FnOnce(CaptionError) -> JobError {
    move |source| JobError::new(stage, source)
}

/// Runs caption jobs against a pair of collaborators
pub struct Orchestrator {
    captions: CaptionConfig,
    style: StyleConfig,
    retention: Duration,
    acquirer: Acquirer,
    store: Arc<ResourceStore>,
    transcriber: Arc<dyn Transcriber>,
    renderer: Arc<dyn Renderer>,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(
        config: &ServerConfig,
        store: Arc<ResourceStore>,
        transcriber: Arc<dyn Transcriber>,
        renderer: Arc<dyn Renderer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            captions: config.captions,
            style: config.style.clone(),
            retention: Duration::from_secs(config.storage.output_retention_secs),
            acquirer: Acquirer::new(config.storage.clone()),
            store,
            transcriber,
            renderer,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Run one job to completion
    pub async fn run(&self, request: JobRequest) -> Result<JobResult, JobError> {
        let job_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("job", job_id = %job_id, input = request.input.kind());
        self.run_job(job_id, request).instrument(span).await
    }

    async fn run_job(&self, job_id: String, request: JobRequest) -> Result<JobResult, JobError> {
        let started = Instant::now();
        self.metrics.record_job_started();

        let mut artifacts = Artifacts::default();
        let outcome = self.execute(&request, &mut artifacts).await;
        artifacts.cleanup(outcome.is_ok()).await;

        match outcome {
            Ok(done) => {
                let elapsed = started.elapsed();
                self.metrics.record_job_succeeded(elapsed);
                let processing_time = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
                tracing::info!(
                    language = %done.language,
                    processing_time,
                    "Captioned video ready at {}",
                    done.video_url
                );
                Ok(JobResult {
                    job_id,
                    video_url: done.video_url,
                    output_path: done.output,
                    language: done.language,
                    processing_time,
                    completed_at: Utc::now(),
                })
            }
            Err(e) => {
                self.metrics.record_job_failed(e.stage);
                tracing::warn!(stage = %e.stage, "Job failed: {}", e.source);
                if let Some(diagnostics) = e.source.diagnostics() {
                    tracing::debug!("Collaborator diagnostics:\n{}", diagnostics);
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &JobRequest,
        artifacts: &mut Artifacts,
    ) -> Result<Completed, JobError> {
        tracing::debug!(stage = %JobStage::AcquireInput, "Entering stage");
        let input = self
            .acquirer
            .acquire(&request.input, &self.store)
            .await
            .map_err(at(JobStage::AcquireInput))?;
        let video = input.path.clone();
        artifacts.input = Some(input);

        tracing::debug!(stage = %JobStage::Transcribe, "Entering stage");
        let transcript = self
            .transcriber
            .transcribe(&video)
            .await
            .map_err(at(JobStage::Transcribe))?;

        tracing::debug!(stage = %JobStage::Segment, "Entering stage");
        let cues = segment(&transcript.segments, &self.captions);
        if cues.is_empty() {
            return Err(JobError::new(JobStage::Segment, CaptionError::NoSpeech));
        }

        tracing::debug!(stage = %JobStage::FormatSubtitles, cues = cues.len(), "Entering stage");
        let document = format_srt(&cues);
        let subtitles = self.store.allocate(SUBTITLE_PREFIX, ".srt");
        artifacts.subtitles = Some(subtitles.clone());
        tokio::fs::write(&subtitles, document)
            .await
            .map_err(|e| CaptionError::SubtitleWrite(e.to_string()))
            .map_err(at(JobStage::FormatSubtitles))?;

        tracing::debug!(stage = %JobStage::Style, "Entering stage");
        let style = StyleDescriptor::build(&request.style, &self.style);
        tracing::debug!(force_style = %style, "Resolved subtitle style");

        tracing::debug!(stage = %JobStage::Burn, "Entering stage");
        let output = self.store.allocate(OUTPUT_PREFIX, ".mp4");
        artifacts.output = Some(output.clone());
        let burn = BurnRequest {
            video,
            subtitles,
            style,
            output: output.clone(),
        };
        self.renderer
            .burn(&burn)
            .await
            .map_err(at(JobStage::Burn))?;

        tracing::debug!(stage = %JobStage::ExposeResult, "Entering stage");
        if !output.is_file() {
            return Err(JobError::new(
                JobStage::ExposeResult,
                CaptionError::Internal("Renderer reported success but wrote no output".into()),
            ));
        }
        let video_url = ResourceStore::download_ref(&output);
        self.store.retain_output(&output);
        if let Some(name) = output.file_name() {
            self.store
                .schedule_reap(name.to_string_lossy().to_string(), self.retention);
        }

        Ok(Completed {
            output,
            video_url,
            language: transcript.language,
        })
    }
}
