use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use news_harness::completion::{CompletionClient, CompletionError, OllamaClient};
use news_harness::config::CompletionConfig;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(url: &str) -> OllamaClient {
    OllamaClient::new(&CompletionConfig {
        url: url.to_string(),
        model: "test-model".to_string(),
        timeout_secs: 5,
        max_context_chars: 10_000,
    })
    .unwrap()
}

/// A `/api/generate` stub that replies with `chunks` verbatim and records
/// each request body.
fn ndjson_stub(chunks: Vec<&'static str>, seen: Arc<Mutex<Vec<serde_json::Value>>>) -> Router {
    Router::new().route(
        "/api/generate",
        post(move |Json(body): Json<serde_json::Value>| {
            let chunks = chunks.clone();
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(body);
                let parts = chunks
                    .into_iter()
                    .map(|c| Ok::<_, Infallible>(Bytes::from_static(c.as_bytes())));
                Body::from_stream(futures::stream::iter(parts))
            }
        }),
    )
}

#[tokio::test]
async fn test_tokens_arrive_in_order_across_chunk_splits() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let url = spawn(ndjson_stub(
        vec![
            "{\"response\":\"Hel",
            "lo\"}\n{\"response\":\" wor",
            "ld\"}\nnot json at all\n\n",
            "{\"response\":\"\",\"done\":true}\n{\"response\":\"ignored\"}\n",
        ],
        seen.clone(),
    ))
    .await;

    let stream = client_for(&url).stream("Say hello").await.unwrap();
    let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
    assert_eq!(tokens, vec!["Hello", " world"]);

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "test-model");
    assert_eq!(requests[0]["prompt"], "Say hello");
    assert_eq!(requests[0]["stream"], true);
}

#[tokio::test]
async fn test_stream_ends_when_connection_closes_without_done() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let url = spawn(ndjson_stub(
        vec!["{\"response\":\"partial\"}\n{\"response\":\" tail\"}"],
        seen,
    ))
    .await;

    let stream = client_for(&url).stream("q").await.unwrap();
    let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
    assert_eq!(tokens, vec!["partial", " tail"]);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::NOT_FOUND, "model 'test-model' not found").into_response() }),
    );
    let url = spawn(app).await;

    match client_for(&url).stream("q").await {
        Err(CompletionError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    // Bind and drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client_for(&format!("http://{}", addr)).stream("q").await;
    assert!(matches!(result, Err(CompletionError::Unavailable(_))));
}

#[tokio::test]
async fn test_stalled_body_reports_timeout() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async {
            let first = futures::stream::once(async {
                Ok::<_, Infallible>(Bytes::from_static(b"{\"response\":\"early\"}\n"))
            });
            Body::from_stream(first.chain(futures::stream::pending()))
        }),
    );
    let url = spawn(app).await;
    let client = OllamaClient::new(&CompletionConfig {
        url,
        model: "test-model".to_string(),
        timeout_secs: 1,
        max_context_chars: 10_000,
    })
    .unwrap();

    let items: Vec<_> = client.stream("q").await.unwrap().collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "early");
    match &items[1] {
        Err(err @ CompletionError::Timeout(_)) => {
            assert!(err.to_string().starts_with("request timed out"));
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}
