//! Streaming gateway
//!
//! One request moves through `Validating → Configuring → Opening →
//! FirstChunkCheck → Relaying → Closed`. Any failure up to and including the
//! first-chunk check yields a classified error and no bytes of a success
//! response. Once the first unit is known to be good the response is
//! committed; later upstream failures only truncate the stream.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{ClassifiedError, ErrorCategory, UpstreamFailure, classify};
use crate::config::GatewaySettings;
use crate::registry::{ToolDefinition, ToolRegistry, ValidationError};
use crate::template::compile_prompt;
use crate::upstream::{ErrorSlot, GenerationProvider, GenerationRequest, StreamPart, UpstreamStream};

/// Caller payload for a tool run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

impl ToolRequest {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            inputs: HashMap::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

/// Pipeline stage, recorded on log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Configuring,
    Opening,
    FirstChunkCheck,
    Relaying,
    Closed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Configuring => "configuring",
            Stage::Opening => "opening",
            Stage::FirstChunkCheck => "first_chunk_check",
            Stage::Relaying => "relaying",
            Stage::Closed => "closed",
        }
    }
}

/// Committed response body: raw text deltas in upstream order
pub type RelayStream = BoxStream<'static, Result<Bytes, Infallible>>;

/// Result of running a tool up to the commit point
pub enum GatewayOutcome {
    /// First unit was good; relay the rest
    Streaming(RelayStream),
    /// Failed before commit
    Failed(ClassifiedError),
}

impl std::fmt::Debug for GatewayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayOutcome::Streaming(_) => f.write_str("Streaming(..)"),
            GatewayOutcome::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// Runs tools against the upstream provider
pub struct ToolGateway {
    registry: Arc<ToolRegistry>,
    settings: GatewaySettings,
    provider: Arc<dyn GenerationProvider>,
}

impl ToolGateway {
    pub fn new(
        registry: Arc<ToolRegistry>,
        settings: GatewaySettings,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            registry,
            settings,
            provider,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run a tool request up to the commit point
    pub async fn run(&self, request: ToolRequest) -> GatewayOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "tool_run",
            %request_id,
            slug = request.slug.as_deref().unwrap_or(""),
        );
        self.execute(request).instrument(span).await
    }

    async fn execute(&self, request: ToolRequest) -> GatewayOutcome {
        let tool = match self.validate(&request) {
            Ok(tool) => tool,
            Err(e) => {
                let classified = validation_error(&e);
                log_failure(Stage::Validating, &classified);
                return GatewayOutcome::Failed(classified);
            }
        };

        let (api_key, model_id) = match (&self.settings.api_key, &self.settings.model_id) {
            (Some(key), Some(model)) => (key.clone(), model.clone()),
            (None, _) => {
                let classified = ClassifiedError::configuration("Upstream API key is not configured");
                log_failure(Stage::Configuring, &classified);
                return GatewayOutcome::Failed(classified);
            }
            (_, None) => {
                let classified = ClassifiedError::configuration("Upstream model id is not configured");
                log_failure(Stage::Configuring, &classified);
                return GatewayOutcome::Failed(classified);
            }
        };

        let generation = GenerationRequest {
            api_key,
            model_id,
            system_prompt: tool.system_prompt.clone(),
            prompt: compile_prompt(&tool.template, &request.inputs),
            max_output_tokens: self.settings.max_output_tokens,
        };
        debug!(
            stage = Stage::Opening.as_str(),
            provider = self.provider.name(),
            prompt_len = generation.prompt.len(),
            "Opening upstream stream"
        );

        let upstream = match self.provider.open_stream(generation).await {
            Ok(upstream) => upstream,
            Err(failure) => {
                let classified = classify(&failure);
                log_failure(Stage::Opening, &classified);
                return GatewayOutcome::Failed(classified);
            }
        };

        let mut reader = UpstreamReader::new(upstream, self.settings.idle_timeout, Span::current());
        let first = match reader.read().await {
            Unit::Failed(failure) => {
                let classified = classify(&failure);
                log_failure(Stage::FirstChunkCheck, &classified);
                return GatewayOutcome::Failed(classified);
            }
            Unit::Text(text) => Some(text).filter(|t| !t.is_empty()),
            Unit::Skip => None,
            Unit::End => {
                reader.completed = true;
                None
            }
        };

        reader.committed = true;
        info!(stage = Stage::Relaying.as_str(), "Committed to streaming response");
        GatewayOutcome::Streaming(relay(reader, first))
    }

    fn validate(&self, request: &ToolRequest) -> Result<&ToolDefinition, ValidationError> {
        let slug = request
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingSlug)?;

        let tool = self
            .registry
            .lookup(slug)
            .ok_or_else(|| ValidationError::UnknownTool(slug.to_string()))?;

        tool.validate(&request.inputs)?;
        Ok(tool)
    }
}

fn validation_error(error: &ValidationError) -> ClassifiedError {
    let category = error.category();
    let classified = ClassifiedError::new(category, error.to_string());
    match category {
        ErrorCategory::NotFound => classified,
        _ => classified.with_user_message(format!("⚠️ {error}")),
    }
}

fn log_failure(stage: Stage, classified: &ClassifiedError) {
    match stage {
        Stage::Validating => warn!(
            stage = stage.as_str(),
            status = classified.status.as_u16(),
            category = %classified.category,
            error = %classified.error,
            "Tool request rejected"
        ),
        _ => error!(
            stage = stage.as_str(),
            status = classified.status.as_u16(),
            category = %classified.category,
            error = %classified.error,
            "Tool run failed before streaming"
        ),
    }
}

/// What one read of the upstream produced
#[derive(Debug)]
enum Unit {
    Text(String),
    /// A non-text, non-error unit such as a finish marker
    Skip,
    End,
    Failed(UpstreamFailure),
}

/// Owns the upstream stream for one request.
///
/// Dropping the reader drops the stream, which releases the upstream
/// connection on every exit path.
struct UpstreamReader {
    parts: BoxStream<'static, StreamPart>,
    errors: ErrorSlot,
    idle_timeout: Option<Duration>,
    span: Span,
    relayed_bytes: usize,
    /// A streaming response was handed to the client
    committed: bool,
    completed: bool,
}

/// How an upstream reader came to be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    /// Dropped by the gateway on a failure answered with JSON
    BeforeCommit,
    Completed,
    ClientGone,
}

impl UpstreamReader {
    fn new(upstream: UpstreamStream, idle_timeout: Option<Duration>, span: Span) -> Self {
        Self {
            parts: upstream.parts,
            errors: upstream.errors,
            idle_timeout,
            span,
            relayed_bytes: 0,
            committed: false,
            completed: false,
        }
    }

    fn release(&self) -> Release {
        match (self.committed, self.completed) {
            (false, _) => Release::BeforeCommit,
            (true, true) => Release::Completed,
            (true, false) => Release::ClientGone,
        }
    }

    /// Read one unit. The error callback and the stream race; a failure
    /// reported through the callback wins over anything read alongside it.
    async fn read(&mut self) -> Unit {
        let idle_timeout = self.idle_timeout;
        let parts = &mut self.parts;
        let errors = &self.errors;
        let next = async {
            tokio::select! {
                biased;
                failure = errors.wait() => Unit::Failed(failure),
                part = parts.next() => match part {
                    Some(StreamPart::TextDelta(text)) => Unit::Text(text),
                    Some(StreamPart::Finish { reason }) => {
                        debug!(?reason, "Upstream finished");
                        Unit::Skip
                    }
                    Some(StreamPart::Error(failure)) => Unit::Failed(failure),
                    None => Unit::End,
                },
            }
        };

        let unit = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, next).await {
                Ok(unit) => unit,
                Err(_) => Unit::Failed(UpstreamFailure::with_kind(
                    "timeout",
                    format!("Upstream sent nothing for {}s", limit.as_secs_f64()),
                )),
            },
            None => next.await,
        };

        match (unit, self.errors.captured()) {
            (Unit::Failed(failure), _) => Unit::Failed(failure),
            (_, Some(failure)) => Unit::Failed(failure),
            (unit, None) => unit,
        }
    }
}

impl Drop for UpstreamReader {
    fn drop(&mut self) {
        let _enter = self.span.enter();
        match self.release() {
            Release::BeforeCommit => debug!(
                stage = Stage::Closed.as_str(),
                "Upstream reader released before streaming"
            ),
            Release::Completed => debug!(
                stage = Stage::Closed.as_str(),
                bytes = self.relayed_bytes,
                "Upstream reader released"
            ),
            Release::ClientGone => info!(
                stage = Stage::Closed.as_str(),
                bytes = self.relayed_bytes,
                "Client went away mid-stream, upstream reader released"
            ),
        }
    }
}

/// Lazily pull from the upstream as the client consumes the body
fn relay(reader: UpstreamReader, first: Option<String>) -> RelayStream {
    stream::unfold((reader, first), |(mut reader, pending)| {
        let span = reader.span.clone();
        async move {
            if let Some(text) = pending {
                reader.relayed_bytes += text.len();
                return Some((Ok(Bytes::from(text)), (reader, None)));
            }
            if reader.completed {
                return None;
            }

            loop {
                match reader.read().await {
                    Unit::Text(text) if text.is_empty() => continue,
                    Unit::Text(text) => {
                        reader.relayed_bytes += text.len();
                        return Some((Ok(Bytes::from(text)), (reader, None)));
                    }
                    Unit::Skip => continue,
                    Unit::End => {
                        reader.completed = true;
                        return None;
                    }
                    Unit::Failed(failure) => {
                        reader.completed = true;
                        let classified = classify(&failure);
                        error!(
                            stage = Stage::Relaying.as_str(),
                            category = %classified.category,
                            error = %classified.error,
                            bytes = reader.relayed_bytes,
                            "Upstream failed mid-stream, truncating response"
                        );
                        return None;
                    }
                }
            }
        }
        .instrument(span)
    })
    .boxed()
}
