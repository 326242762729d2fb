//! HTTP surface: routing and request handlers

use std::convert::Infallible;
use std::path::Path;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use vlm_bridge::VlmEngine;
use vlm_core::{imagery, GenerateRequest, VlmError};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Largest accepted upload; anything bigger is a client error
const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// Build the application router
///
/// When `static_dir` is set the built frontend is served from it, with
/// the API routes taking precedence.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/process_image/", post(process_image))
        .route("/stream_process_image/", post(stream_process_image))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// Initialize the engine, bind, and serve until stopped
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(VlmEngine::initialize(&config.engine).await);
    let router = build_router(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "visionchat server listening");

    axum::serve(listener, router).await?;

    Ok(())
}

/// Liveness probe, deliberately independent of model state
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// One parsed multipart submission
#[derive(Default)]
struct Submission {
    image: Option<Bytes>,
    prompt: Option<String>,
}

/// Read the `files` and `text_prompt` fields, enforcing the upload cap
///
/// Unknown fields are skipped so clients can evolve ahead of the
/// server.
async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        ApiError(VlmError::InvalidInput(format!(
            "invalid multipart data: {err}"
        )))
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") => {
                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(|err| {
                    ApiError(VlmError::InvalidInput(format!(
                        "failed to read upload: {err}"
                    )))
                })? {
                    if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                        return Err(ApiError(VlmError::InvalidInput(format!(
                            "upload exceeds the {} MiB limit",
                            MAX_UPLOAD_BYTES / (1024 * 1024)
                        ))));
                    }
                    data.extend_from_slice(&chunk);
                }
                if !data.is_empty() {
                    submission.image = Some(Bytes::from(data));
                }
            }
            Some("text_prompt") => {
                let text = field.text().await.map_err(|err| {
                    ApiError(VlmError::InvalidInput(format!(
                        "failed to read prompt: {err}"
                    )))
                })?;
                submission.prompt = Some(text);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    Ok(submission)
}

/// Non-streaming generation: the whole answer in one response body
async fn process_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let submission = read_submission(multipart).await?;

    let Some(image_bytes) = submission.image else {
        return Err(ApiError(VlmError::InvalidInput(
            "an image file is required".to_string(),
        )));
    };
    tracing::debug!(
        image = %imagery::content_fingerprint(&image_bytes),
        "processing image request"
    );

    let request = GenerateRequest::from_parts(Some(&image_bytes), submission.prompt)?;
    let engine = state.engine()?;
    let text = engine.generate(request).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        text,
    )
        .into_response())
}

/// Streaming generation: chunked plain text with no framing
///
/// Errors before the first chunk become ordinary HTTP errors. Errors
/// after that arrive as one final `Error:` text chunk, because the 200
/// status line is already on the wire.
async fn stream_process_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let submission = read_submission(multipart).await?;

    let request = GenerateRequest::from_parts(submission.image.as_deref(), submission.prompt)?;
    let engine = state.engine()?;
    let mut stream = engine.stream(request).await?;

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, Infallible>>(8);
    tokio::spawn(async move {
        while let Some(piece) = stream.next().await {
            let payload = match piece {
                Ok(text) => Bytes::from(text),
                Err(error) => {
                    tracing::error!(%error, "generation failed mid-stream");
                    let _ = tx.send(Ok(Bytes::from(format!("Error: {error}")))).await;
                    break;
                }
            };
            if tx.send(Ok(payload)).await.is_err() {
                tracing::info!("client disconnected, cancelling generation");
                break;
            }
        }
    });

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use image::{ImageBuffer, Rgb};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;
    use vlm_bridge::{EchoBackend, TextStream, VlmBackend};

    const BOUNDARY: &str = "visionchat-test-boundary";

    fn echo_router() -> Router {
        let state = AppState::new(Ok(VlmEngine::with_backend(Box::new(EchoBackend), 500)));
        build_router(state, None)
    }

    fn failed_router() -> Router {
        let state = AppState::new(Err(VlmError::Unavailable("weights missing".into())));
        build_router(state, None)
    }

    fn png_fixture() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(10, 10, Rgb([255u8, 0u8, 0u8]));
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    /// Hand-rolled multipart body: (field name, optional filename, bytes)
    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, bytes) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Backend that counts invocations, for proving requests never
    /// reach the model
    struct CountingBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VlmBackend for CountingBackend {
        fn id(&self) -> &'static str {
            "counting"
        }

        async fn generate(
            &self,
            _request: &GenerateRequest,
            _max_tokens: usize,
        ) -> Result<TextStream, VlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(futures::stream::iter(vec![Ok("hi".to_string())])))
        }
    }

    /// Backend that fails after yielding some text
    struct FailingBackend;

    #[async_trait]
    impl VlmBackend for FailingBackend {
        fn id(&self) -> &'static str {
            "failing"
        }

        async fn generate(
            &self,
            _request: &GenerateRequest,
            _max_tokens: usize,
        ) -> Result<TextStream, VlmError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("partial ".to_string()),
                Err(VlmError::Inference("backend exploded".to_string())),
            ])))
        }
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let response = echo_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_is_independent_of_model_state() {
        let response = failed_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_multipart_never_reaches_the_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = AppState::new(Ok(VlmEngine::with_backend(
            Box::new(CountingBackend {
                calls: Arc::clone(&calls),
            }),
            500,
        )));
        let router = build_router(state, None);

        for uri in ["/process_image/", "/stream_process_image/"] {
            let response = router
                .clone()
                .oneshot(multipart_request(uri, multipart_body(&[])))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert!(body["detail"].is_string(), "{uri}");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_image_upload_is_a_client_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = AppState::new(Ok(VlmEngine::with_backend(
            Box::new(CountingBackend {
                calls: Arc::clone(&calls),
            }),
            500,
        )));
        let router = build_router(state, None);

        let body = multipart_body(&[("files", Some("notes.txt"), b"just some text")]);
        let response = router
            .oneshot(multipart_request("/process_image/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("could not decode image"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_process_image_requires_an_image() {
        let body = multipart_body(&[("text_prompt", None, b"describe")]);
        let response = echo_router()
            .oneshot(multipart_request("/process_image/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("image"));
    }

    #[tokio::test]
    async fn test_process_image_returns_generated_text() {
        let png = png_fixture();
        let body = multipart_body(&[
            ("files", Some("red.png"), png.as_slice()),
            ("text_prompt", None, b"What color is this?"),
        ]);

        let response = echo_router()
            .oneshot(multipart_request("/process_image/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/markdown; charset=utf-8"
        );
        let text = body_text(response).await;
        assert_eq!(text, "Received a 10x10 image. Prompt: What color is this?");
    }

    #[tokio::test]
    async fn test_stream_accepts_prompt_only() {
        let body = multipart_body(&[("text_prompt", None, b"say something")]);
        let response = echo_router()
            .oneshot(multipart_request("/stream_process_image/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "Prompt: say something");
    }

    #[tokio::test]
    async fn test_streamed_chunks_concatenate_to_the_full_answer() {
        let png = png_fixture();
        let parts: [(&str, Option<&str>, &[u8]); 2] = [
            ("files", Some("red.png"), png.as_slice()),
            ("text_prompt", None, b"What color is this?"),
        ];

        let streamed = echo_router()
            .oneshot(multipart_request(
                "/stream_process_image/",
                multipart_body(&parts),
            ))
            .await
            .unwrap();
        let whole = echo_router()
            .oneshot(multipart_request("/process_image/", multipart_body(&parts)))
            .await
            .unwrap();

        assert_eq!(streamed.status(), StatusCode::OK);
        assert_eq!(whole.status(), StatusCode::OK);
        assert_eq!(body_text(streamed).await, body_text(whole).await);
    }

    #[tokio::test]
    async fn test_failed_engine_maps_to_500_with_detail() {
        let png = png_fixture();
        let parts: [(&str, Option<&str>, &[u8]); 1] = [("files", Some("red.png"), png.as_slice())];

        for uri in ["/process_image/", "/stream_process_image/"] {
            let response = failed_router()
                .oneshot(multipart_request(uri, multipart_body(&parts)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            let body: serde_json::Value =
                serde_json::from_str(&body_text(response).await).unwrap();
            assert!(
                body["detail"].as_str().unwrap().contains("weights missing"),
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_midstream_failure_becomes_a_text_chunk() {
        let state = AppState::new(Ok(VlmEngine::with_backend(Box::new(FailingBackend), 500)));
        let router = build_router(state, None);

        let body = multipart_body(&[("text_prompt", None, b"boom")]);
        let response = router
            .oneshot(multipart_request("/stream_process_image/", body))
            .await
            .unwrap();

        // The stream starts before the failure, so the status is 200
        // and the error rides in the body
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "partial Error: inference failed: backend exploded"
        );
    }

    #[tokio::test]
    async fn test_unknown_multipart_fields_are_ignored() {
        let body = multipart_body(&[
            ("bogus", None, b"ignored"),
            ("text_prompt", None, b"hello"),
        ]);
        let response = echo_router()
            .oneshot(multipart_request("/stream_process_image/", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Prompt: hello");
    }
}
