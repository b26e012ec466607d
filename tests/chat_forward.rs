use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use thinkbridge_rs::config::AppConfig;
use thinkbridge_rs::routing::dispatch::dispatch_request;
use thinkbridge_rs::state::AppState;

async fn spawn_backend(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/v1"), server)
}

fn build_state(base_url: String, configure: impl FnOnce(&mut AppConfig)) -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.backend.base_url = base_url;
    config.backend.api_key = "backend-secret".to_string();
    configure(&mut config);
    Arc::new(AppState::from_config(config).expect("state"))
}

fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serialize request")))
        .expect("build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    (status, headers, body.to_vec())
}

fn sse_response(body: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from(body))
        .expect("stream response")
}

fn data_events(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .expect("utf8 body")
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_non_stream_routes_and_splices_reasoning() {
    let seen = Arc::new(Mutex::new(None::<(Value, Option<String>)>));
    let seen_clone = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let seen = Arc::clone(&seen_clone);
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                *seen.lock().unwrap() = Some((body, auth));
                Json(json!({
                    "id": "backend-id",
                    "model": "deepseek-ai/deepseek-v3.1",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": "42",
                            "reasoning_content": "think hard"
                        },
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
                }))
            }
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |config| {
        config.features.show_reasoning = true;
    });

    let (status, headers, body) = send(
        state,
        chat_request(&json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "answer?"}],
            "max_tokens": 5000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");

    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["object"], "chat.completion");
    assert_eq!(payload["model"], "gpt-4o");
    assert!(payload["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(
        payload["choices"][0]["message"]["content"],
        "<think>\nthink hard</think>\n\n42"
    );
    assert!(payload["choices"][0]["message"].get("reasoning_content").is_none());
    assert_eq!(payload["usage"]["total_tokens"], 7);

    let (forwarded, auth) = seen.lock().unwrap().clone().expect("backend was called");
    assert_eq!(auth.as_deref(), Some("Bearer backend-secret"));
    assert_eq!(forwarded["model"], "deepseek-ai/deepseek-v3.1");
    assert_eq!(forwarded["max_tokens"], 2048);
    assert_eq!(forwarded["temperature"], 0.7);
    assert_eq!(forwarded["top_p"], 1.0);
    assert_eq!(forwarded["stream"], false);
    assert!(forwarded.get("chat_template_kwargs").is_none());

    server.abort();
}

#[tokio::test]
async fn test_thinking_mode_adds_extension_and_fallback_routes() {
    let seen = Arc::new(Mutex::new(None::<Value>));
    let seen_clone = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let seen = Arc::clone(&seen_clone);
            async move {
                *seen.lock().unwrap() = Some(body);
                Json(json!({
                    "choices": [{"message": {"content": "ok"}}]
                }))
            }
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |config| {
        config.features.enable_thinking_mode = true;
    });

    let (status, _, body) = send(
        state,
        chat_request(&json!({
            "model": "claude-3-opus-20240229",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["choices"][0]["message"]["role"], "assistant");
    assert_eq!(payload["choices"][0]["finish_reason"], "stop");
    assert_eq!(payload["usage"]["total_tokens"], 0);

    let forwarded = seen.lock().unwrap().clone().expect("backend was called");
    assert_eq!(forwarded["model"], "meta/llama-3.1-405b-instruct");
    assert_eq!(forwarded["chat_template_kwargs"], json!({"thinking": true}));
    assert_eq!(forwarded["temperature"], 0.2);
    assert_eq!(forwarded["max_tokens"], 1024);

    server.abort();
}

#[tokio::test]
async fn test_stream_splices_reasoning_and_ends_with_done() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            sse_response(concat!(
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"reasoning_content\":\"a\"}}]}\n\n",
                ": keep-alive\n\n",
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"reasoning_content\":\"b\"}}]}\n\n",
                "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"c\"},\"finish_reason\":\"stop\"}]}\n\n",
                "data: [DONE]\n\n"
            ))
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |config| {
        config.features.show_reasoning = true;
    });

    let (status, headers, body) = send(
        state,
        chat_request(&json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");

    let events = data_events(&body);
    assert_eq!(events.len(), 4);
    assert_eq!(events[3], "data: [DONE]");

    let mut content = String::new();
    for event in &events[..3] {
        let json: Value =
            serde_json::from_str(event.strip_prefix("data: ").expect("data prefix")).unwrap();
        let delta = &json["choices"][0]["delta"];
        assert!(delta.get("reasoning_content").is_none());
        assert_eq!(json["id"], "c1");
        content.push_str(delta["content"].as_str().unwrap());
    }
    assert_eq!(content, "<think>\nab</think>\n\nc");

    server.abort();
}

#[tokio::test]
async fn test_stream_forwards_malformed_line_and_continues() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            sse_response(concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"x\"}}]}\n\n",
                "data: {not json\n\n",
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"y\",\"reasoning_content\":\"hidden\"}}]}\n\n",
                "data: [DONE]\n\n"
            ))
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |_| {});

    let (status, _, body) = send(
        state,
        chat_request(&json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let events = data_events(&body);
    assert_eq!(events.len(), 4);
    assert_eq!(events[1], "data: {not json");
    let last: Value = serde_json::from_str(events[2].strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(last["choices"][0]["delta"]["content"], "y");
    assert_eq!(events[3], "data: [DONE]");

    server.abort();
}

#[tokio::test]
async fn test_backend_rate_limit_is_echoed() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"message": "rate limited"}})),
            )
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |_| {});

    for stream in [false, true] {
        let (status, _, body) = send(
            Arc::clone(&state),
            chat_request(&json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": stream
            })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        let payload: Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(
            payload,
            json!({"error": {"message": "rate limited", "type": "api_error", "code": 429}})
        );
    }

    server.abort();
}

#[tokio::test]
async fn test_empty_choices_is_api_error() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"choices": []})) }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |_| {});

    let (status, _, body) = send(
        state,
        chat_request(&json!({"model": "gpt-4o", "messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["type"], "api_error");
    assert_eq!(payload["error"]["code"], 502);

    server.abort();
}

#[tokio::test]
async fn test_backend_timeout_maps_to_504() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"choices": [{"message": {"content": "late"}}]}))
        }),
    );
    let (base_url, server) = spawn_backend(app).await;
    let state = build_state(base_url, |config| {
        config.server.timeout = 1;
    });

    let (status, _, body) = send(
        state,
        chat_request(&json!({"model": "gpt-4o", "messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["type"], "timeout_error");
    assert_eq!(payload["error"]["code"], 504);

    server.abort();
}

#[tokio::test]
async fn test_unreachable_backend_is_proxy_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let state = build_state(format!("http://{addr}/v1"), |_| {});

    let (status, _, body) = send(
        state,
        chat_request(&json!({"model": "gpt-4o", "messages": []})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["type"], "proxy_error");
}

#[tokio::test]
async fn test_invalid_request_body_is_400() {
    let state = build_state("http://127.0.0.1:9/v1".to_string(), |_| {});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from("{\"messages\": []}"))
        .unwrap();
    let (status, _, body) = send(state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["type"], "invalid_request_error");
    assert_eq!(payload["error"]["code"], 400);
}

#[tokio::test]
async fn test_unknown_path_and_wrong_method() {
    let state = build_state("http://127.0.0.1:9/v1".to_string(), |_| {});

    let (status, _, body) = send(Arc::clone(&state), get("/v1/foo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["type"], "invalid_request_error");
    assert_eq!(payload["error"]["code"], 404);

    let (status, _, body) = send(state, get("/v1/chat/completions")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["code"], 405);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let state = build_state("http://127.0.0.1:9/v1".to_string(), |_| {});
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from(vec![b' '; 2 * 1024 * 1024 + 1]))
        .unwrap();
    let (status, _, body) = send(state, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let payload: Value = serde_json::from_slice(&body).expect("json payload");
    assert_eq!(payload["error"]["code"], 413);
}

#[tokio::test]
async fn test_health_and_models_endpoints() {
    let state = build_state("http://127.0.0.1:9/v1".to_string(), |config| {
        config.features.enable_thinking_mode = true;
    });

    let (status, _, body) = send(Arc::clone(&state), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload, json!({"status": "ok", "service": "thinkbridge-rs"}));

    let (status, _, body) = send(Arc::clone(&state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["reasoning_display"], false);
    assert_eq!(payload["thinking_mode"], true);

    let (status, _, body) = send(state, get("/v1/models")).await;
    assert_eq!(status, StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["object"], "list");
    let data = payload["data"].as_array().unwrap();
    assert!(!data.is_empty());
    assert!(data.iter().any(|m| m["id"] == "gpt-4o"));
    assert!(data.iter().all(|m| m["owned_by"] == "thinkbridge"));
}
