//! OpenAI-compatible streaming chat completions provider
//!
//! Works against OpenAI, OpenRouter and any endpoint that speaks the
//! `/chat/completions` SSE protocol.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::sse::{SseDecoder, SseEvent};
use super::{ErrorSlot, GenerationProvider, GenerationRequest, StreamPart, UpstreamStream};
use crate::classifier::UpstreamFailure;
use crate::error::{Result, ToolrunError};

/// Provider for OpenAI-compatible HTTP APIs
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: &Url, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ToolrunError::Upstream(e.to_string()))?;

        let endpoint = format!("{}/chat/completions", base_url.as_str().trim_end_matches('/'));
        info!("Upstream provider initialized: {}", endpoint);

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleProvider {
    async fn open_stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<UpstreamStream, UpstreamFailure> {
        let body = ChatCompletionRequest {
            model: &request.model_id,
            messages: [
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            stream: true,
            max_tokens: request.max_output_tokens,
        };

        debug!(model = %request.model_id, "Opening upstream stream");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamFailure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamFailure::from_status(status.as_u16(), &text));
        }

        let errors = ErrorSlot::new();
        let parts = decode_parts(response.bytes_stream().boxed(), errors.clone());
        Ok(UpstreamStream::new(parts, errors))
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

struct DecodeState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<StreamPart>,
    errors: ErrorSlot,
    finished: bool,
}

impl DecodeState {
    fn handle(&mut self, events: Vec<SseEvent>) {
        for event in events {
            if self.finished {
                return;
            }
            match event {
                SseEvent::Done => self.finished = true,
                SseEvent::Data(data) => self.pending.extend(parse_chunk(&data)),
            }
        }
    }
}

/// Turn the raw SSE body into stream parts.
///
/// Transport failures and oversized lines are reported through `errors` and
/// end the stream;
/// error payloads inside the stream become [`StreamPart::Error`].
fn decode_parts(
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    errors: ErrorSlot,
) -> impl futures::Stream<Item = StreamPart> + Send + 'static {
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        errors,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(part) = state.pending.pop_front() {
                return Some((part, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => match state.decoder.push(&chunk) {
                    Ok(events) => state.handle(events),
                    Err(e) => {
                        state.errors.report(UpstreamFailure::with_kind("invalid_response", e.to_string()));
                        state.finished = true;
                    }
                },
                Some(Err(e)) => {
                    state.errors.report(UpstreamFailure::from_reqwest(&e));
                    state.finished = true;
                }
                None => {
                    let events = state.decoder.finish();
                    state.handle(events);
                    state.finished = true;
                }
            }
        }
    })
}

fn parse_chunk(data: &str) -> Vec<StreamPart> {
    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Skipping unparseable stream event: {}", e);
            return Vec::new();
        }
    };

    if let Some(error) = chunk.error {
        return vec![StreamPart::Error(UpstreamFailure::from_json(&error))];
    }

    let mut parts = Vec::new();
    for choice in chunk.choices.into_iter().take(1) {
        if let Some(content) = choice.delta.and_then(|d| d.content) {
            if !content.is_empty() {
                parts.push(StreamPart::TextDelta(content));
            }
        }
        if let Some(reason) = choice.finish_reason {
            parts.push(StreamPart::Finish {
                reason: Some(reason),
            });
        }
    }
    parts
}
