//! HTTP request handlers

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::acquire::JobInput;
use crate::error::{CaptionError, JobError};
use crate::job::JobRequest;
use crate::state::AppState;
use crate::style::{Position, StyleOptions, FONT_SIZE_RANGE};

const SERVICE_NAME: &str = "caption-server";

/// HTTP error type
#[derive(Debug)]
pub enum HttpError {
    /// Caller sent something unusable
    BadRequest(String),
    NotFound(String),
    /// A job failed in one of its stages
    Job(JobError),
    InternalError(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    detail: Option<String>,
    error_code: &'static str,
}

fn job_status(err: &CaptionError) -> StatusCode {
    match err {
        CaptionError::Acquisition(_) => StatusCode::BAD_REQUEST,
        CaptionError::NoSpeech => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            HttpError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg.clone(),
                    detail: Some(msg),
                    error_code: "invalid_request",
                },
            ),
            HttpError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: msg.clone(),
                    detail: Some(msg),
                    error_code: "not_found",
                },
            ),
            HttpError::Job(err) => (
                job_status(&err.source),
                ErrorBody {
                    error: err.source.to_string(),
                    detail: Some(
                        err.source
                            .diagnostics()
                            .map(str::to_string)
                            .unwrap_or_else(|| err.to_string()),
                    ),
                    error_code: err.source.error_code(),
                },
            ),
            HttpError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Internal server error".to_string(),
                    detail: Some(msg),
                    error_code: "internal_error",
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JobError> for HttpError {
    fn from(err: JobError) -> Self {
        HttpError::Job(err)
    }
}

/// Service info
/// GET /
pub async fn root_info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Video Caption Generator API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "generate_captions": "POST /generate-captioned-video",
            "download": "GET /download/{filename}",
            "health": "GET /health",
            "metrics": "GET /metrics",
        }
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("caption-server v", env!("CARGO_PKG_VERSION"))
}

/// Prometheus metrics
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
        .into_response()
}

/// Successful job response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub video_url: String,
    pub message: String,
    pub processing_time: f64,
    pub language_detected: String,
    pub job_id: String,
}

/// Raw multipart fields before validation
#[derive(Debug, Default)]
struct GenerateForm {
    file: Option<(String, Bytes)>,
    url: Option<String>,
    font_size: Option<String>,
    font_color: Option<String>,
    position: Option<String>,
}

impl GenerateForm {
    async fn read(mut multipart: Multipart) -> Result<Self, HttpError> {
        let mut form = GenerateForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| HttpError::BadRequest(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| HttpError::BadRequest(format!("Failed to read upload: {}", e)))?;
                    // Browsers send an empty part for an untouched file input
                    if !filename.is_empty() || !data.is_empty() {
                        form.file = Some((filename, data));
                    }
                }
                "url" | "font_size" | "font_color" | "position" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| HttpError::BadRequest(format!("Malformed form data: {}", e)))?;
                    let value = value.trim().to_string();
                    if value.is_empty() {
                        continue;
                    }
                    match name.as_str() {
                        "url" => form.url = Some(value),
                        "font_size" => form.font_size = Some(value),
                        "font_color" => form.font_color = Some(value),
                        _ => form.position = Some(value),
                    }
                }
                other => tracing::debug!("Ignoring form field {}", other),
            }
        }
        Ok(form)
    }

    fn into_request(self) -> Result<JobRequest, HttpError> {
        let input = match (self.file, self.url) {
            (None, None) => {
                return Err(HttpError::BadRequest(
                    "Either 'file' or 'url' parameter is required".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(HttpError::BadRequest(
                    "Provide either 'file' or 'url', not both".to_string(),
                ))
            }
            (Some((filename, data)), None) => JobInput::Upload { filename, data },
            (None, Some(url)) => JobInput::Url(url),
        };

        let font_size = match self.font_size {
            Some(raw) => {
                let size = raw
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| FONT_SIZE_RANGE.contains(n));
                Some(size.ok_or_else(|| {
                    HttpError::BadRequest("Font size must be between 12 and 72".to_string())
                })?)
            }
            None => None,
        };

        let position = match self.position {
            Some(raw) => Some(raw.parse::<Position>().map_err(|_| {
                HttpError::BadRequest("Position must be 'top' or 'bottom'".to_string())
            })?),
            None => None,
        };

        Ok(JobRequest {
            input,
            style: StyleOptions {
                font_size,
                font_color: self.font_color,
                position,
            },
        })
    }
}

/// Caption a video
/// POST /generate-captioned-video
pub async fn generate_captioned_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, HttpError> {
    let request = GenerateForm::read(multipart).await?.into_request()?;
    tracing::debug!(
        font_size = ?request.style.font_size,
        font_color = ?request.style.font_color,
        position = ?request.style.position,
        "Caption request received"
    );

    // The job runs on its own task so a client hanging up mid-request
    // cannot cancel it between stages.
    let job_state = Arc::clone(&state);
    let result = tokio::spawn(async move { job_state.orchestrator.run(request).await })
        .await
        .map_err(|e| HttpError::InternalError(format!("Job task failed: {}", e)))??;

    Ok(Json(GenerateResponse {
        video_url: result.video_url,
        message: "Video captioned successfully".to_string(),
        processing_time: result.processing_time,
        language_detected: result.language,
        job_id: result.job_id,
    }))
}

/// Stream a retained output
/// GET /download/{filename}
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, HttpError> {
    let path = state
        .store
        .resolve_download(&filename)
        .ok_or_else(|| HttpError::NotFound("File not found".to_string()))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HttpError::NotFound("File not found".to_string()))
        }
        Err(e) => return Err(HttpError::InternalError(format!("Download error: {}", e))),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| HttpError::InternalError(format!("Download error: {}", e)))?
        .len();

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    let disposition = format!("attachment; filename=\"{}\"", filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    state.metrics.record_download();
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}
