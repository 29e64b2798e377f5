//! Streamed question answering over the news corpus.
//!
//! [`AnswerStreamer::stream_answer`] picks the best-matching article, embeds
//! it in a fixed prompt and relays the completion service's tokens through a
//! bounded channel. The returned [`AnswerStream`] owns a cancellation token:
//! dropping it (a disconnected HTTP client, for instance) stops the producer
//! and drops the upstream response.

use futures::stream::{Stream, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::completion::CompletionClient;
use crate::retrieve::find_best_in_dir;

pub const NO_MATCH_MESSAGE: &str =
    "I couldn't find any relevant news articles to answer your question.";

pub const TRUNCATION_MARKER: &str = "...(truncated)";

const CHANNEL_CAPACITY: usize = 32;

/// The fixed prompt sent to the completion service.
pub fn build_prompt(name: &str, content: &str, question: &str) -> String {
    format!(
        "You are a helpful news assistant. Use the provided article to answer the user's question clearly and concisely.\n        \nArticle Content ({}):\n{}\n\nQuestion:\n{}\n",
        name, content, question
    )
}

/// Keep at most `max_chars` characters, marking the cut when one happens.
pub fn truncate_context(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[derive(Clone)]
pub struct AnswerStreamer {
    corpus_dir: PathBuf,
    client: Arc<dyn CompletionClient>,
    max_context_chars: usize,
}

impl AnswerStreamer {
    pub fn new(
        corpus_dir: PathBuf,
        client: Arc<dyn CompletionClient>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            corpus_dir,
            client,
            max_context_chars,
        }
    }

    /// Start answering `question`. Must be called inside a Tokio runtime.
    ///
    /// Never fails: a missing article yields one explanatory message and a
    /// service failure yields one diagnostic token, after which the stream
    /// ends.
    pub fn stream_answer(&self, question: &str) -> AnswerStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let producer_cancel = cancel.clone();
        let streamer = self.clone();
        let question = question.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = producer_cancel.cancelled() => {
                    debug!("answer stream cancelled");
                }
                _ = streamer.produce(&question, &tx) => {}
            }
        });

        AnswerStream { rx, cancel }
    }

    async fn produce(&self, question: &str, tx: &mpsc::Sender<String>) {
        let dir = self.corpus_dir.clone();
        let query = question.to_string();
        let found = tokio::task::spawn_blocking(move || find_best_in_dir(&dir, &query)).await;

        let doc = match found {
            Ok(Ok(Some(doc))) => doc,
            Ok(Ok(None)) => {
                info!("no relevant article");
                let _ = tx.send(NO_MATCH_MESSAGE.to_string()).await;
                return;
            }
            Ok(Err(e)) => {
                let _ = tx.send(format!("Error processing article: {:#}", e)).await;
                return;
            }
            Err(e) => {
                let _ = tx.send(format!("Error processing article: {}", e)).await;
                return;
            }
        };

        info!(article = %doc.name, "answering from article");
        let context = truncate_context(&doc.text, self.max_context_chars);
        let prompt = build_prompt(&doc.name, &context, question);

        let mut tokens = match self.client.stream(&prompt).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "completion request failed");
                let _ = tx
                    .send(format!("Error communicating with {}: {}", self.client.name(), e))
                    .await;
                return;
            }
        };

        while let Some(item) = tokens.next().await {
            match item {
                Ok(token) => {
                    if tx.send(token).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "completion stream failed");
                    let _ = tx
                        .send(format!("Error communicating with {}: {}", self.client.name(), e))
                        .await;
                    return;
                }
            }
        }
    }
}

/// Receiving half of an answer. Cancels the producer when dropped.
pub struct AnswerStream {
    rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl AnswerStream {
    /// Next token, or `None` once the answer is complete.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Stop the producer. Tokens already queued may still be received.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn collect_text(mut self) -> String {
        let mut out = String::new();
        while let Some(token) = self.rx.recv().await {
            out.push_str(&token);
        }
        out
    }
}

impl Stream for AnswerStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
