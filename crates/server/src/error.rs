//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vlm_core::VlmError;

/// Renders a [`VlmError`] the way the API promises: a status code and
/// a `{"detail": ...}` JSON body
///
/// Only applies to failures detected before the response starts.
/// Failures inside an already-started stream are delivered as a final
/// text chunk instead, since the status line is on the wire.
#[derive(Debug)]
pub struct ApiError(pub VlmError);

impl From<VlmError> for ApiError {
    fn from(error: VlmError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({
            "detail": self.0.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(error: VlmError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(error).into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_input_maps_to_400() {
        let (status, body) = render(VlmError::InvalidInput("no input".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "invalid input: no input");
    }

    #[tokio::test]
    async fn test_unavailable_maps_to_500() {
        let (status, body) = render(VlmError::Unavailable("daemon down".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("daemon down"));
    }

    #[tokio::test]
    async fn test_inference_maps_to_500() {
        let (status, _) = render(VlmError::Inference("oom".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
