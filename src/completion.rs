//! Streaming text-completion collaborator.
//!
//! The answer path talks to a local model server over a line-delimited JSON
//! protocol: each line is an object with an optional `response` token and an
//! optional `done` flag. [`NdjsonDecoder`] turns raw bytes into tokens, and
//! [`NdjsonStream`] drives it from an HTTP response body.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::CompletionConfig;

/// Errors talking to the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Connection refused or the body stream broke.
    #[error("{0}")]
    Unavailable(String),
    /// The configured request timeout elapsed, before or during the body.
    #[error("request timed out ({0})")]
    Timeout(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        let message = error_chain(&e);
        if e.is_timeout() {
            CompletionError::Timeout(message)
        } else {
            CompletionError::Unavailable(message)
        }
    }
}

/// `outer: cause: root cause`, since reqwest's own message hides the cause.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Tokens in arrival order. An `Err` item is terminal.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// A service that turns a prompt into a stream of text tokens.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Service name used in user-facing failure messages.
    fn name(&self) -> &str;

    async fn stream(&self, prompt: &str) -> Result<TokenStream, CompletionError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Client for an Ollama-style `/api/generate` endpoint.
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, CompletionError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        debug!(model = %self.model, "completion stream opened");
        Ok(Box::pin(NdjsonStream::new(resp.bytes_stream())))
    }
}

/// Incremental decoder for the line-delimited completion protocol.
///
/// Bytes are buffered until a newline arrives, so lines (and multi-byte
/// characters) split across network chunks decode correctly. Blank and
/// malformed lines are skipped. Once a line carries `done: true` the decoder
/// yields nothing further.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if !self.done {
            self.buffer.extend_from_slice(bytes);
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Next token from the complete lines buffered so far.
    pub fn next_token(&mut self) -> Option<String> {
        while !self.done {
            let pos = self.buffer.iter().position(|b| *b == b'\n')?;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(token) = self.decode_line(&line) {
                return Some(token);
            }
        }
        None
    }

    /// Decode a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        match serde_json::from_str::<GenerateChunk>(text) {
            Ok(chunk) => {
                if chunk.done {
                    self.done = true;
                }
                chunk.response.filter(|r| !r.is_empty())
            }
            Err(e) => {
                debug!(error = %e, "skipping malformed completion line");
                None
            }
        }
    }
}

/// Adapts an HTTP body into a [`TokenStream`].
pub struct NdjsonStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    decoder: NdjsonDecoder,
    finished: bool,
}

impl NdjsonStream {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            decoder: NdjsonDecoder::new(),
            finished: false,
        }
    }
}

impl Stream for NdjsonStream {
    type Item = Result<String, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(token) = this.decoder.next_token() {
                return Poll::Ready(Some(Ok(token)));
            }
            if this.finished || this.decoder.is_done() {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.decoder.push(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(this.decoder.finish().map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
