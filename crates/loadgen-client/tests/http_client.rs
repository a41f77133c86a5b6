use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use loadgen_client::{CompletionClient, CompletionRequest, HttpCompletionClient};
use loadgen_common::chat::Conversation;
use loadgen_common::config::CompletionParams;
use loadgen_common::LoadgenError;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<(Option<String>, Value)>>>);

async fn chat(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
    seen.0.lock().unwrap().push((auth, body));
    Json(json!({
        "id": "chatcmpl-1",
        "model": "llama3-70b-8192",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Crescendo provides CX services."}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 300, "completion_tokens": 42, "total_tokens": 342, "total_time": 0.25}
    }))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}/v1", addr.ip(), addr.port())
}

fn request() -> CompletionRequest {
    CompletionRequest::new(Conversation::default(), &CompletionParams::default())
}

#[tokio::test]
async fn sends_fixed_parameters_and_bearer_key() {
    let seen = Seen::default();
    let app = Router::new().route("/v1/chat/completions", post(chat)).with_state(seen.clone());
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&base, Some("test-key".into()), None).unwrap();
    let resp = client.complete(&request()).await.unwrap();
    assert_eq!(resp.text().unwrap(), "Crescendo provides CX services.");
    assert_eq!(resp.total_tokens(), 342);
    assert_eq!(resp.total_time(), 0.25);

    let seen = seen.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], "llama3-70b-8192");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["top_p"], 1.0);
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["stream"], false);
    assert!(body["stop"].is_null());
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][2]["content"], "Hello! How can we help?");
}

#[tokio::test]
async fn missing_key_sends_no_auth_header() {
    let seen = Seen::default();
    let app = Router::new().route("/v1/chat/completions", post(chat)).with_state(seen.clone());
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&format!("{base}/"), None, None).unwrap();
    client.complete(&request()).await.unwrap();
    assert!(seen.0.lock().unwrap()[0].0.is_none());
}

#[tokio::test]
async fn missing_usage_defaults_to_zero() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"choices": [{"message": {"role": "assistant", "content": null}}]})) }),
    );
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&base, None, None).unwrap();
    let resp = client.complete(&request()).await.unwrap();
    assert_eq!(resp.total_tokens(), 0);
    assert_eq!(resp.total_time(), 0.0);
    assert_eq!(resp.text().unwrap(), "");
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let app = Router::new().route("/v1/chat/completions", post(|| async { Json(json!({"choices": []})) }));
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&base, None, None).unwrap();
    let resp = client.complete(&request()).await.unwrap();
    assert!(matches!(resp.text(), Err(LoadgenError::EmptyResponse)));
}

#[tokio::test]
async fn non_success_status_maps_to_api_error() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&base, None, None).unwrap();
    match client.complete(&request()).await {
        Err(LoadgenError::Api { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn garbage_body_maps_to_decode_error() {
    let app = Router::new().route("/v1/chat/completions", post(|| async { "not json" }));
    let base = serve(app).await;

    let client = HttpCompletionClient::new(&base, None, None).unwrap();
    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LoadgenError::Decode(_)));
}

#[tokio::test]
async fn refused_connection_maps_to_transport_error() {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpCompletionClient::new(&format!("http://{addr}/v1"), None, None).unwrap();
    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, LoadgenError::Transport(_)));
}

#[tokio::test]
async fn truncated_error_body_still_reports_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut req = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            req.extend_from_slice(&chunk[..n]);
            if request_complete(&req) {
                break;
            }
        }
        // promises 100 bytes, sends 7, then hangs up
        let _ = sock
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
            .await;
        let _ = sock.shutdown().await;
    });

    let client = HttpCompletionClient::new(&format!("http://{addr}/v1"), None, None).unwrap();
    match client.complete(&request()).await {
        Err(LoadgenError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.starts_with("<unreadable body"), "body was {body:?}");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

// True once the headers and `content-length` bytes of body have arrived.
fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else { return false };
    let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let len: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + len
}
