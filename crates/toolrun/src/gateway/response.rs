//! HTTP responses for the run endpoint
//!
//! Every response carries [`RAW_RESPONSE_HEADER`] so hosting frameworks pass
//! the body through verbatim.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::relay::RelayStream;
use crate::classifier::ClassifiedError;

/// Marker header asking the host to send the body unwrapped
pub const RAW_RESPONSE_HEADER: &str = "x-tss-raw-response";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// JSON body of a pre-commit failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Internal detail
    pub error: String,
    /// Sanitized message for the end user
    #[serde(rename = "userMessage")]
    pub user_message: String,
    pub code: String,
}

impl From<&ClassifiedError> for ErrorBody {
    fn from(classified: &ClassifiedError) -> Self {
        Self {
            error: classified.error.clone(),
            user_message: classified.user_message.clone(),
            code: classified.category.code().to_string(),
        }
    }
}

/// Build the JSON error response for a failure before commit
pub fn error_response(classified: &ClassifiedError) -> Response<Body> {
    let body = serde_json::to_string(&ErrorBody::from(classified)).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize error body: {e}");
        String::from(r#"{"error":"internal","userMessage":"","code":"internal"}"#)
    });

    raw_response(classified.status, JSON_CONTENT_TYPE, Body::from(body))
}

/// Build the committed 200 response streaming raw text
pub fn stream_response(stream: RelayStream) -> Response<Body> {
    raw_response(StatusCode::OK, TEXT_CONTENT_TYPE, Body::from_stream(stream))
}

fn raw_response(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(RAW_RESPONSE_HEADER, HeaderValue::from_static("true"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorCategory, UpstreamFailure, classify};
    use bytes::Bytes;
    use futures::StreamExt;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_error_response_shape() {
        let classified = classify(&UpstreamFailure::new("Rate limit exceeded"));
        let response = error_response(&classified);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(response.headers().get(RAW_RESPONSE_HEADER).unwrap(), "true");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Rate limit exceeded");
        assert_eq!(body.code, "rate_limited");
        assert_eq!(body.user_message, ErrorCategory::RateLimited.user_message());
    }

    #[test]
    fn test_error_body_uses_camel_case_user_message() {
        let classified = ClassifiedError::new(ErrorCategory::NotFound, "Unknown tool: x");
        let json = serde_json::to_value(ErrorBody::from(&classified)).unwrap();
        assert!(json.get("userMessage").is_some());
        assert!(json.get("user_message").is_none());
    }

    #[tokio::test]
    async fn test_stream_response_headers_and_body() {
        let chunks: Vec<Result<Bytes, Infallible>> =
            vec![Ok(Bytes::from("Hello ")), Ok(Bytes::from("world"))];
        let response = stream_response(futures::stream::iter(chunks).boxed());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(response.headers().get(RAW_RESPONSE_HEADER).unwrap(), "true");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Hello world");
    }
}
