//! HTTP client for the tool gateway
//!
//! [`ToolClient::run`] consumes the raw text stream incrementally and can be
//! cancelled at any point by resolving the `cancel` future.

use futures::StreamExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

use toolrun_server::registry::InputField;

use crate::error::{ClientError, ClientResult};

/// Payload for `POST /api/tools/run`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunRequest {
    pub slug: String,
    pub inputs: HashMap<String, String>,
}

impl RunRequest {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            inputs: HashMap::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The caller cancelled before the stream ended
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Everything received, including text delivered before a cancel
    pub text: String,
}

impl RunOutcome {
    fn cancelled(text: String) -> Self {
        Self {
            status: RunStatus::Cancelled,
            text,
        }
    }
}

/// Tool listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListing {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Full public definition of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDetails {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<InputField>,
}

/// Client for a running gateway
#[derive(Debug, Clone)]
pub struct ToolClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ToolClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Usage(format!(
                "Gateway URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::Usage(format!("Invalid gateway URL '{base_url}': {e}")))?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Gateway URL for `segments`, each one percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Usage(format!("Gateway URL '{}' cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn list_tools(&self) -> ClientResult<Vec<ToolListing>> {
        let response = self
            .client
            .get(self.endpoint(&["api", "tools"])?)
            .send()
            .await?;
        let text = ok_body(response).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn show_tool(&self, slug: &str) -> ClientResult<ToolDetails> {
        let response = self
            .client
            .get(self.endpoint(&["api", "tools", slug])?)
            .send()
            .await?;
        let text = ok_body(response).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Run a tool, handing decoded text to `on_text` as it arrives.
    ///
    /// Resolving `cancel` stops the request or read loop promptly and yields
    /// [`RunStatus::Cancelled`] with the text received so far.
    pub async fn run<F, C>(&self, request: &RunRequest, mut on_text: F, cancel: C) -> ClientResult<RunOutcome>
    where
        F: FnMut(&str),
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let send = self
            .client
            .post(self.endpoint(&["api", "tools", "run"])?)
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = &mut cancel => return Ok(RunOutcome::cancelled(String::new())),
            response = send => response?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = tokio::select! {
                biased;
                _ = &mut cancel => return Ok(RunOutcome::cancelled(String::new())),
                text = response.text() => text?,
            };
            tracing::debug!(status, "Gateway rejected run: {}", message);
            return Err(ClientError::Gateway { status, message });
        }

        let mut body = response.bytes_stream();
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    tracing::debug!(bytes = text.len(), "Run cancelled");
                    return Ok(RunOutcome::cancelled(text));
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let decoded = decoder.decode(&bytes);
                        if !decoded.is_empty() {
                            on_text(&decoded);
                            text.push_str(&decoded);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            on_text(&tail);
            text.push_str(&tail);
        }

        Ok(RunOutcome {
            status: RunStatus::Completed,
            text,
        })
    }
}

async fn ok_body(response: reqwest::Response) -> ClientResult<String> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(ClientError::Gateway {
            status: status.as_u16(),
            message: text,
        })
    }
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte sequence split across chunks is held back until the rest
/// arrives. Invalid bytes become U+FFFD. Only [`finish`](Self::finish)
/// flushes an incomplete trailing sequence.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_passes_ascii_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_holds_back_split_sequence() {
        let bytes = "a👋b".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();

        // Split inside the emoji, one byte at a time.
        assert_eq!(decoder.decode(&bytes[..2]), "a");
        assert_eq!(decoder.decode(&bytes[2..3]), "");
        assert_eq!(decoder.decode(&bytes[3..4]), "");
        assert_eq!(decoder.decode(&bytes[4..]), "👋b");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_every_split_point() {
        let text = "héllo wörld ✓ 日本語";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at {split}");
        }
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_truncated_sequence() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&"é".as_bytes()[..1]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_client_rejects_non_http_url() {
        let err = ToolClient::new("localhost:8787").unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
        assert!(ToolClient::new("http://localhost:8787/").is_ok());
    }

    #[test]
    fn test_endpoint_encodes_slug_as_one_segment() {
        let client = ToolClient::new("http://localhost:8787").unwrap();
        let url = client.endpoint(&["api", "tools", "a/b?c#d"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8787/api/tools/a%2Fb%3Fc%23d");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ToolClient::new("http://localhost:8787/gateway/").unwrap();
        let url = client.endpoint(&["api", "tools"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8787/gateway/api/tools");
    }

    #[test]
    fn test_run_request_serializes_slug_and_inputs() {
        let request = RunRequest::new("blog-post-outline").input("topic", "Rust");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["slug"], "blog-post-outline");
        assert_eq!(json["inputs"]["topic"], "Rust");
    }
}
