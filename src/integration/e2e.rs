//! End-to-end job tests
//!
//! Runs complete jobs through the orchestrator and the HTTP router with fake
//! engines, checking results and what is left in the temp directory.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use super::fixtures::*;
use crate::acquire::JobInput;
use crate::error::{CaptionError, JobStage};
use crate::http::create_router;
use crate::job::JobRequest;
use crate::state::AppState;
use crate::style::{Alignment, Position, StyleOptions};
use crate::transcript::Transcript;

fn upload(name: &str) -> JobRequest {
    JobRequest {
        input: JobInput::Upload {
            filename: name.to_string(),
            data: Bytes::from_static(b"not really a video"),
        },
        style: StyleOptions::default(),
    }
}

#[tokio::test]
async fn test_url_404_fails_in_acquire_and_leaves_nothing() {
    let server = spawn_server(Router::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, metrics) =
        orchestrator(dir.path(), Arc::clone(&transcriber), Arc::clone(&renderer));

    let request = JobRequest {
        input: JobInput::Url(format!("http://{}/missing.mp4", server)),
        style: StyleOptions::default(),
    };
    let err = orchestrator.run(request).await.unwrap_err();

    assert_eq!(err.stage, JobStage::AcquireInput);
    assert!(matches!(err.source, CaptionError::Acquisition(_)));
    assert!(err.source.to_string().contains("404"));
    assert_eq!(transcriber.call_count(), 0);
    assert!(renderer.requests.lock().is_empty());
    assert!(dir_entries(dir.path()).is_empty());
    assert_eq!(metrics.jobs_failed(JobStage::AcquireInput), 1);
}

#[tokio::test]
async fn test_upload_success_keeps_only_output() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, metrics) =
        orchestrator(dir.path(), Arc::clone(&transcriber), Arc::clone(&renderer));

    let result = orchestrator.run(upload("talk.mp4")).await.unwrap();

    assert_eq!(result.language, "en");
    assert!(result.processing_time >= 0.0);
    assert!(result.output_path.is_file());
    let output_name = result
        .output_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    assert!(output_name.starts_with("captioned_video_"));
    assert_eq!(result.video_url, format!("/download/{}", output_name));
    assert!(orchestrator.store().is_retained(&output_name));

    // Input and subtitle were both removed
    assert_eq!(dir_entries(dir.path()), vec![output_name]);

    let requests = renderer.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].video.exists());
    assert!(!requests[0].subtitles.exists());
    assert_eq!(requests[0].subtitles.extension().unwrap(), "srt");
    assert_eq!(transcriber.calls.lock()[0], requests[0].video);

    assert_eq!(
        renderer.subtitle_documents.lock()[0],
        "1\n00:00:00,000 --> 00:00:02,000\nHello world this is a test\n\n"
    );
    assert_eq!(metrics.jobs_succeeded(), 1);
}

#[tokio::test]
async fn test_url_download_success() {
    let router = Router::new().route(
        "/stream",
        get(|| async { ([(header::CONTENT_TYPE, "video/webm")], "webm bytes") }),
    );
    let server = spawn_server(router).await;
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, _) =
        orchestrator(dir.path(), Arc::clone(&transcriber), Arc::clone(&renderer));

    let request = JobRequest {
        input: JobInput::Url(format!("http://{}/stream", server)),
        style: StyleOptions::default(),
    };
    let result = orchestrator.run(request).await.unwrap();

    let downloaded = transcriber.calls.lock()[0].clone();
    assert_eq!(downloaded.extension().unwrap(), "webm");
    assert!(!downloaded.exists());
    assert!(result.output_path.exists());
    assert_eq!(dir_entries(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_no_speech_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let silent = Transcript {
        language: "en".into(),
        segments: vec![],
    };
    let transcriber = Arc::new(FakeTranscriber::returning(silent));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, _) =
        orchestrator(dir.path(), transcriber, Arc::clone(&renderer));

    let err = orchestrator.run(upload("quiet.mkv")).await.unwrap_err();

    assert_eq!(err.stage, JobStage::Segment);
    assert!(matches!(err.source, CaptionError::NoSpeech));
    assert!(renderer.requests.lock().is_empty());
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_transcription_failure_cleans_input() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::failing(CaptionError::Transcription {
        message: "whisperx exited with exit status: 2".into(),
        diagnostics: Some("CUDA out of memory".into()),
    }));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, metrics) = orchestrator(dir.path(), transcriber, renderer);

    let err = orchestrator.run(upload("talk.mp4")).await.unwrap_err();

    assert_eq!(err.stage, JobStage::Transcribe);
    assert_eq!(err.source.diagnostics(), Some("CUDA out of memory"));
    assert!(dir_entries(dir.path()).is_empty());
    assert_eq!(metrics.jobs_failed(JobStage::Transcribe), 1);
}

#[tokio::test]
async fn test_render_failure_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::FailAfterPartialWrite));
    let (orchestrator, _) =
        orchestrator(dir.path(), transcriber, Arc::clone(&renderer));

    let err = orchestrator.run(upload("talk.mp4")).await.unwrap_err();

    assert_eq!(err.stage, JobStage::Burn);
    assert_eq!(err.source.error_code(), "rendering_failed");
    assert!(err.source.diagnostics().unwrap().contains("subtitles"));
    assert!(!renderer.requests.lock()[0].output.exists());
    assert!(dir_entries(dir.path()).is_empty());
    assert_eq!(orchestrator.store().retained_count(), 0);
}

#[tokio::test]
async fn test_missing_output_fails_expose() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::SucceedWithoutOutput));
    let (orchestrator, _) = orchestrator(dir.path(), transcriber, renderer);

    let err = orchestrator.run(upload("talk.mp4")).await.unwrap_err();
    assert_eq!(err.stage, JobStage::ExposeResult);
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_resident_input_survives() {
    let library = tempfile::tempdir().unwrap();
    let source = library.path().join("lecture.mp4");
    std::fs::write(&source, "lecture").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::FailAfterPartialWrite));
    let (orchestrator, _) = orchestrator(dir.path(), transcriber, renderer);

    let request = JobRequest {
        input: JobInput::Resident(source.clone()),
        style: StyleOptions::default(),
    };
    assert!(orchestrator.run(request).await.is_err());
    assert!(source.is_file());
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_style_reaches_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, _) =
        orchestrator(dir.path(), transcriber, Arc::clone(&renderer));

    let mut request = upload("talk.mp4");
    request.style = StyleOptions {
        font_size: Some(36),
        font_color: Some("red".into()),
        position: Some(Position::Top),
    };
    orchestrator.run(request).await.unwrap();

    let style = renderer.requests.lock()[0].style.clone();
    assert_eq!(style.font_size, 36);
    assert_eq!(style.primary_color, "0000FF");
    assert_eq!(style.alignment, Alignment::TopCenter);
    assert!(style.to_force_style().contains("Alignment=8"));
}

#[tokio::test]
async fn test_concurrent_jobs_use_distinct_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, metrics) = orchestrator(dir.path(), transcriber, renderer);

    let jobs = (0..4).map(|_| orchestrator.run(upload("same-name.mp4")));
    let results = futures_util::future::join_all(jobs).await;

    let mut outputs: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().output_path)
        .collect();
    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 4);
    assert_eq!(dir_entries(dir.path()).len(), 4);
    assert_eq!(metrics.jobs_started(), 4);
}

#[tokio::test]
async fn test_dropped_job_during_transcribe_removes_input() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::stalling(Duration::from_secs(30)));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::WriteOutput));
    let (orchestrator, metrics) =
        orchestrator(dir.path(), Arc::clone(&transcriber), Arc::clone(&renderer));

    let outcome =
        tokio::time::timeout(Duration::from_millis(200), orchestrator.run(upload("talk.mp4")))
            .await;

    assert!(outcome.is_err());
    assert_eq!(transcriber.call_count(), 1);
    assert!(renderer.requests.lock().is_empty());
    assert!(dir_entries(dir.path()).is_empty());
    assert_eq!(metrics.jobs_succeeded(), 0);
}

#[tokio::test]
async fn test_dropped_job_during_burn_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let transcriber = Arc::new(FakeTranscriber::returning(hello_transcript()));
    let renderer = Arc::new(FakeRenderer::new(RenderBehavior::StallAfterPartialWrite));
    let (orchestrator, _metrics) =
        orchestrator(dir.path(), Arc::clone(&transcriber), Arc::clone(&renderer));

    let outcome =
        tokio::time::timeout(Duration::from_millis(200), orchestrator.run(upload("talk.mp4")))
            .await;

    assert!(outcome.is_err());
    assert_eq!(renderer.requests.lock().len(), 1);
    assert!(dir_entries(dir.path()).is_empty());
}

fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: video/mp4\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

fn app(dir: &std::path::Path, renderer: RenderBehavior) -> Router {
    let state = AppState::with_collaborators(
        test_config(dir),
        Arc::new(FakeTranscriber::returning(hello_transcript())),
        Arc::new(FakeRenderer::new(renderer)),
    )
    .unwrap();
    create_router(Arc::new(state))
}

fn form_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    const BOUNDARY: &str = "caption-test-boundary";
    Request::post("/generate-captioned-video")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(BOUNDARY, parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_http_generate_then_download() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), RenderBehavior::WriteOutput);

    let response = app
        .clone()
        .oneshot(form_request(&[
            ("file", Some("clip.mp4"), "video bytes"),
            ("font_size", None, "30"),
            ("position", None, "top"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["message"], "Video captioned successfully");
    assert_eq!(json["language_detected"], "en");
    assert!(json["job_id"].as_str().is_some());
    let video_url = json["video_url"].as_str().unwrap().to_string();
    assert!(video_url.starts_with("/download/captioned_video_"));

    let response = app
        .oneshot(Request::get(&video_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"captioned video");
}

#[tokio::test]
async fn test_http_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), RenderBehavior::WriteOutput);

    let cases: Vec<(Vec<(&str, Option<&str>, &str)>, &str)> = vec![
        (vec![("font_size", None, "24")], "Either 'file' or 'url'"),
        (
            vec![
                ("file", Some("a.mp4"), "x"),
                ("url", None, "https://example.com/a.mp4"),
            ],
            "not both",
        ),
        (
            vec![("file", Some("a.mp4"), "x"), ("font_size", None, "80")],
            "between 12 and 72",
        ),
        (
            vec![("file", Some("a.mp4"), "x"), ("position", None, "left")],
            "'top' or 'bottom'",
        ),
    ];

    for (parts, expected) in cases {
        let response = app.clone().oneshot(form_request(&parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(
            json["detail"].as_str().unwrap().contains(expected),
            "expected {:?} in {}",
            expected,
            json
        );
        assert_eq!(json["error_code"], "invalid_request");
    }
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_http_bad_extension_is_acquisition_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), RenderBehavior::WriteOutput);

    let response = app
        .oneshot(form_request(&[("file", Some("notes.txt"), "hello")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error_code"], "acquisition_failed");
}

#[tokio::test]
async fn test_http_render_failure_is_500_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), RenderBehavior::FailAfterPartialWrite);

    let response = app
        .oneshot(form_request(&[("file", Some("clip.mov"), "video")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error_code"], "rendering_failed");
    assert!(json["detail"].as_str().unwrap().contains("subtitles"));
    assert!(dir_entries(dir.path()).is_empty());
}
