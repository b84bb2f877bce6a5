//! Upstream failure classification
//!
//! Raw failures arrive in many shapes: transport errors from the HTTP
//! client, non-2xx responses with provider-specific JSON bodies, and error
//! objects embedded in the event stream. All of them are first normalized
//! into an [`UpstreamFailure`] (`kind` + `message`), then mapped onto a
//! fixed set of categories by an ordered predicate table. The first matching
//! rule wins.

use axum::http::StatusCode;
use serde_json::Value;
use std::fmt;

/// Client-visible error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InvalidRequest,
    NotFound,
    Overloaded,
    RateLimited,
    Unauthorized,
    InputTooLong,
    Timeout,
    Internal,
}

impl ErrorCategory {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCategory::InputTooLong => StatusCode::BAD_REQUEST,
            ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Overloaded => "overloaded",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::InputTooLong => "input_too_long",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Internal => "internal",
        }
    }

    /// Sanitized message safe to show an end user
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::InvalidRequest => "⚠️ Please check your input and try again.",
            ErrorCategory::NotFound => "🔍 That tool doesn't exist.",
            ErrorCategory::Overloaded => {
                "🔄 The AI service is currently overloaded. Please try again in a few moments."
            }
            ErrorCategory::RateLimited => {
                "⏱️ Too many requests. Please wait a moment before trying again."
            }
            ErrorCategory::Unauthorized => {
                "🔑 There's a configuration issue with the AI service. Please contact support."
            }
            ErrorCategory::InputTooLong => {
                "📏 Your input is too long. Please shorten it and try again."
            }
            ErrorCategory::Timeout => {
                "⌛ The request took too long to complete. Please try again."
            }
            ErrorCategory::Internal => {
                "❌ Something went wrong while generating content. Please try again, or contact support if the problem persists."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ordered classification rules. Order is significant.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Overloaded,
        &["overloaded", "no available model", "no endpoints available"],
    ),
    (ErrorCategory::RateLimited, &["rate limit", "too many requests"]),
    (
        ErrorCategory::Unauthorized,
        &["api key", "authentication", "unauthorized"],
    ),
    (
        ErrorCategory::InputTooLong,
        &["context length", "too long", "maximum context", "token limit"],
    ),
    (ErrorCategory::Timeout, &["timeout", "timed out"]),
];

/// A raw upstream failure reduced to a type tag and a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// Error type or name reported by the source, if any
    pub kind: Option<String>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    pub fn with_kind(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: message.into(),
        }
    }

    /// Normalize a non-2xx upstream response.
    ///
    /// The HTTP status supplies the kind when it is one we recognize;
    /// otherwise the body's own error type is used.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body)
            .ok()
            .map(|value| Self::from_json(&value));

        let message = match &parsed {
            Some(failure) if !failure.message.is_empty() => failure.message.clone(),
            _ if !body.trim().is_empty() => truncate(body.trim(), 500),
            _ => format!("Upstream returned HTTP {status}"),
        };

        let kind = status_kind(status)
            .map(str::to_string)
            .or_else(|| parsed.and_then(|f| f.kind));

        Self { kind, message }
    }

    /// Normalize an error value of unknown shape.
    ///
    /// Accepts a bare string, `{"message", "type" | "name" | "code"}`, or
    /// either of those wrapped in `{"error": ...}`.
    pub fn from_json(value: &Value) -> Self {
        if let Some(inner) = value.get("error") {
            return Self::from_json(inner);
        }

        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Object(obj) => {
                let kind = ["type", "name"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .map(str::to_string)
                    .or_else(|| match obj.get("code") {
                        Some(Value::String(code)) => Some(code.clone()),
                        Some(Value::Number(n)) => n
                            .as_u64()
                            .and_then(|n| u16::try_from(n).ok())
                            .and_then(status_kind)
                            .map(str::to_string),
                        _ => None,
                    });
                let message = obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Self { kind, message }
            }
            Value::Null => Self::new(String::new()),
            other => Self::new(other.to_string()),
        }
    }

    /// Normalize an HTTP client error
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            Some("timeout")
        } else if error.is_connect() {
            Some("connect")
        } else if error.is_decode() || error.is_body() {
            Some("body")
        } else {
            None
        };

        Self {
            kind: kind.map(str::to_string),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "[{kind}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn status_kind(status: u16) -> Option<&'static str> {
    match status {
        429 => Some("rate_limit"),
        401 | 403 => Some("authentication"),
        503 | 529 => Some("overloaded"),
        408 | 504 => Some("timeout"),
        413 => Some("too_long"),
        _ => None,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// The outcome of classifying a failure: status, operator-facing detail and
/// the sanitized message for the end user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub status: StatusCode,
    /// Internal detail; logged, and returned as the `error` field
    pub error: String,
    pub user_message: String,
}

impl ClassifiedError {
    pub fn new(category: ErrorCategory, error: impl Into<String>) -> Self {
        Self {
            category,
            status: category.status(),
            error: error.into(),
            user_message: category.user_message().to_string(),
        }
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = user_message.into();
        self
    }

    /// Gateway is missing process configuration it needs before calling out
    pub fn configuration(error: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, error).with_user_message(
            "⚙️ The AI service isn't configured correctly. Please contact support.",
        )
    }
}

/// Map a normalized upstream failure onto the error taxonomy
pub fn classify(failure: &UpstreamFailure) -> ClassifiedError {
    let kind = failure
        .kind
        .as_deref()
        .map(normalize_kind)
        .unwrap_or_default();
    let message = failure.message.to_lowercase();

    let category = RULES
        .iter()
        .find(|(_, needles)| {
            needles
                .iter()
                .any(|needle| kind.contains(needle) || message.contains(needle))
        })
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Internal);

    let error = if failure.message.trim().is_empty() {
        match &failure.kind {
            Some(kind) => kind.clone(),
            None => "Unknown upstream error".to_string(),
        }
    } else {
        failure.message.clone()
    };

    ClassifiedError::new(category, error)
}

/// `rate_limit_error`, `RateLimitError` and `APIKeyError` style tags all
/// become space-separated lowercase words.
fn normalize_kind(kind: &str) -> String {
    let chars: Vec<char> = kind.chars().collect();
    let mut out = String::with_capacity(kind.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            out.push(' ');
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let word_start = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if word_start {
                out.push(' ');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
