//! Test utilities for toolrun
//!
//! [`ScriptedProvider`] replays a fixed sequence of stream parts and
//! out-of-band failures so gateway behavior can be exercised without a
//! network.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::classifier::UpstreamFailure;
use crate::upstream::{ErrorSlot, GenerationProvider, GenerationRequest, StreamPart, UpstreamStream};

/// One step of a scripted upstream stream
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield this part from the stream
    Part(StreamPart),
    /// Report a failure through the error callback, then keep going
    Callback(UpstreamFailure),
    /// Sleep before the next step
    Delay(Duration),
    /// Never produce anything again
    Pending,
}

impl ScriptStep {
    pub fn text(text: &str) -> Self {
        ScriptStep::Part(StreamPart::TextDelta(text.to_string()))
    }

    pub fn finish() -> Self {
        ScriptStep::Part(StreamPart::Finish {
            reason: Some("stop".to_string()),
        })
    }

    pub fn error(message: &str) -> Self {
        ScriptStep::Part(StreamPart::Error(UpstreamFailure::new(message)))
    }

    pub fn callback(message: &str) -> Self {
        ScriptStep::Callback(UpstreamFailure::new(message))
    }
}

/// Provider that replays a script for every call
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: Vec<ScriptStep>,
    open_failure: Option<UpstreamFailure>,
    calls: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
    last_request: Arc<Mutex<Option<GenerationRequest>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            open_failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Provider whose `open_stream` itself fails
    pub fn failing_open(failure: UpstreamFailure) -> Self {
        Self {
            open_failure: Some(failure),
            ..Self::new(Vec::new())
        }
    }

    /// Number of times `open_stream` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the most recently opened stream has been dropped
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Flags the provider as released when the stream state is dropped
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct ScriptState {
    steps: VecDeque<ScriptStep>,
    errors: ErrorSlot,
    _guard: ReleaseGuard,
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn open_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<UpstreamStream, UpstreamFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request);

        if let Some(failure) = &self.open_failure {
            return Err(failure.clone());
        }

        self.released.store(false, Ordering::SeqCst);
        let errors = ErrorSlot::new();
        let state = ScriptState {
            steps: self.script.iter().cloned().collect(),
            errors: errors.clone(),
            _guard: ReleaseGuard(self.released.clone()),
        };

        let parts = stream::unfold(state, |mut state| async move {
            while let Some(step) = state.steps.pop_front() {
                match step {
                    ScriptStep::Part(part) => return Some((part, state)),
                    ScriptStep::Callback(failure) => {
                        state.errors.report(failure);
                    }
                    ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Pending => std::future::pending::<()>().await,
                }
            }
            None
        });

        Ok(UpstreamStream::new(parts, errors))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
