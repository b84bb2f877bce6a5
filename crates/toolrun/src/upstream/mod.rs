//! Upstream generation provider abstraction
//!
//! A provider opens a token stream for one prompt. Failures can surface in
//! two independent ways: as an in-band [`StreamPart::Error`] read from the
//! stream, or out of band through the stream's [`ErrorSlot`] (the provider's
//! error callback). Consumers must watch both; whichever fires first wins.

mod openai;
mod sse;

pub use openai::OpenAiCompatibleProvider;
pub use sse::{MAX_LINE_BYTES, SseDecoder, SseError, SseEvent};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::classifier::UpstreamFailure;

/// One prompt to generate from
#[derive(Clone)]
pub struct GenerationRequest {
    pub api_key: String,
    pub model_id: String,
    pub system_prompt: String,
    pub prompt: String,
    pub max_output_tokens: Option<u32>,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("system_prompt_len", &self.system_prompt.len())
            .field("prompt_len", &self.prompt.len())
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// A unit read from the upstream stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPart {
    TextDelta(String),
    Finish { reason: Option<String> },
    Error(UpstreamFailure),
}

/// Single-assignment slot for failures reported out of band.
///
/// The first report is kept and later ones are dropped. Clones share the
/// same slot.
#[derive(Clone)]
pub struct ErrorSlot {
    tx: Arc<watch::Sender<Option<UpstreamFailure>>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record a failure. Returns `false` if one was already recorded.
    pub fn report(&self, failure: UpstreamFailure) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(failure);
            true
        })
    }

    pub fn captured(&self) -> Option<UpstreamFailure> {
        Option::clone(&self.tx.borrow())
    }

    /// Resolve once a failure has been recorded
    pub async fn wait(&self) -> UpstreamFailure {
        let mut rx = self.tx.subscribe();
        loop {
            let current = Option::clone(&rx.borrow_and_update());
            if let Some(failure) = current {
                return failure;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSlot")
            .field("captured", &self.captured())
            .finish()
    }
}

/// An open upstream stream and its error callback slot.
///
/// Dropping it releases the underlying connection.
pub struct UpstreamStream {
    pub parts: BoxStream<'static, StreamPart>,
    pub errors: ErrorSlot,
}

impl UpstreamStream {
    pub fn new(parts: impl Stream<Item = StreamPart> + Send + 'static, errors: ErrorSlot) -> Self {
        Self {
            parts: parts.boxed(),
            errors,
        }
    }
}

/// Trait for upstream generation providers
///
/// Implementations make exactly one attempt per call. A failed open is
/// returned to the caller as is.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Open a token stream for the request
    async fn open_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<UpstreamStream, UpstreamFailure>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_slot_first_report_wins() {
        let slot = ErrorSlot::new();
        assert!(slot.captured().is_none());

        assert!(slot.report(UpstreamFailure::new("first")));
        assert!(!slot.report(UpstreamFailure::new("second")));

        assert_eq!(slot.captured(), Some(UpstreamFailure::new("first")));
    }

    #[test]
    fn test_error_slot_clones_share_state() {
        let slot = ErrorSlot::new();
        let clone = slot.clone();
        clone.report(UpstreamFailure::new("from clone"));
        assert_eq!(slot.captured().unwrap().message, "from clone");
    }

    #[tokio::test]
    async fn test_error_slot_wait_returns_existing_failure() {
        let slot = ErrorSlot::new();
        slot.report(UpstreamFailure::new("already"));
        let failure = tokio::time::timeout(Duration::from_secs(1), slot.wait())
            .await
            .expect("wait should resolve immediately");
        assert_eq!(failure.message, "already");
    }

    #[tokio::test]
    async fn test_error_slot_wait_wakes_on_report() {
        let slot = ErrorSlot::new();
        let reporter = slot.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            reporter.report(UpstreamFailure::new("later"));
        });

        let failure = tokio::time::timeout(Duration::from_secs(2), slot.wait())
            .await
            .expect("wait should wake after report");
        assert_eq!(failure.message, "later");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_slot_wait_pends_without_report() {
        let slot = ErrorSlot::new();
        let result = tokio::time::timeout(Duration::from_millis(30), slot.wait()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_generation_request_debug_redacts_key() {
        let request = GenerationRequest {
            api_key: "sk-secret".to_string(),
            model_id: "m".to_string(),
            system_prompt: "s".to_string(),
            prompt: "p".to_string(),
            max_output_tokens: None,
        };
        assert!(!format!("{request:?}").contains("sk-secret"));
    }
}
