//! A reader that goes away must release the upstream model response, and a
//! model that stalls past the request timeout must end the answer with a
//! single diagnostic.

use axum::{body::Body, routing::post, Router};
use bytes::Bytes;
use futures::StreamExt;
use news_harness::answer::AnswerStreamer;
use news_harness::completion::OllamaClient;
use news_harness::config::CompletionConfig;
use news_harness::extract::BuiltinExtractor;
use news_harness::models::ExtractOptions;
use news_harness::server::{router, AppState};
use serde_json::json;
use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Sets its flag when the response body owning it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Model stub that emits a token every 50ms for as long as anyone reads.
async fn spawn_endless_model(dropped: Arc<AtomicBool>) -> String {
    let app = Router::new().route(
        "/api/generate",
        post(move || {
            let guard = DropFlag(dropped.clone());
            async move {
                let tokens = futures::stream::unfold((guard, 0u64), |(guard, n)| async move {
                    if n > 0 {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    let line = format!("{{\"response\":\"t{} \"}}\n", n);
                    Some((Ok::<_, Infallible>(Bytes::from(line)), (guard, n + 1)))
                });
                Body::from_stream(tokens)
            }
        }),
    );
    spawn(app).await
}

/// Model stub that sends one token and then goes silent.
async fn spawn_stalled_model() -> String {
    let app = Router::new().route(
        "/api/generate",
        post(|| async {
            let first = futures::stream::once(async {
                Ok::<_, Infallible>(Bytes::from_static(b"{\"response\":\"Storms \"}\n"))
            });
            Body::from_stream(first.chain(futures::stream::pending()))
        }),
    );
    spawn(app).await
}

fn corpus() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("news");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("storm.md"), "# Storm\n\nA storm hit the coast overnight.").unwrap();
    (tmp, dir)
}

fn streamer(corpus: PathBuf, model_url: String, timeout_secs: u64) -> AnswerStreamer {
    let client = OllamaClient::new(&CompletionConfig {
        url: model_url,
        model: "test-model".to_string(),
        timeout_secs,
        max_context_chars: 10_000,
    })
    .unwrap();
    AnswerStreamer::new(corpus, Arc::new(client), 10_000)
}

async fn wait_for(flag: &AtomicBool) -> bool {
    for _ in 0..100 {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_dropping_answer_releases_model_response() {
    let dropped = Arc::new(AtomicBool::new(false));
    let model_url = spawn_endless_model(dropped.clone()).await;
    let (_tmp, dir) = corpus();

    let mut answer = streamer(dir, model_url, 30).stream_answer("storm coast");
    assert_eq!(answer.recv().await.as_deref(), Some("t0 "));
    assert!(!dropped.load(Ordering::SeqCst));

    drop(answer);
    assert!(wait_for(&dropped).await, "model response body was never dropped");
}

#[tokio::test]
async fn test_disconnecting_from_ask_releases_model_response() {
    let dropped = Arc::new(AtomicBool::new(false));
    let model_url = spawn_endless_model(dropped.clone()).await;
    let (_tmp, dir) = corpus();
    let state = AppState::new(
        dir.clone(),
        streamer(dir, model_url, 30),
        Arc::new(BuiltinExtractor),
        ExtractOptions::default(),
    );
    let url = spawn(router(state)).await;

    let mut resp = reqwest::Client::new()
        .post(format!("{}/ask", url))
        .json(&json!({ "question": "What about the storm?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let first = resp.chunk().await.unwrap().unwrap();
    assert!(first.starts_with(b"t0"));

    drop(resp);
    assert!(wait_for(&dropped).await, "model response body was never dropped");
}

#[tokio::test]
async fn test_stalled_model_times_out_with_one_diagnostic() {
    let model_url = spawn_stalled_model().await;
    let (_tmp, dir) = corpus();

    let answer = streamer(dir, model_url, 1).stream_answer("storm coast");
    let tokens: Vec<String> = tokio::time::timeout(Duration::from_secs(10), answer.collect())
        .await
        .expect("answer did not finish after the request timeout");

    assert_eq!(tokens.len(), 2, "tokens: {:?}", tokens);
    assert_eq!(tokens[0], "Storms ");
    assert!(tokens[1].starts_with("Error communicating with Ollama:"));
    assert!(tokens[1].contains("timed out"), "diagnostic: {}", tokens[1]);
}
