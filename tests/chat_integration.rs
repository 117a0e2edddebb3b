//! Integration tests for the chat HTTP API
//!
//! The full axum app runs with an in-memory store and a scripted provider
//! adapter, so requests exercise routing, storage and response shaping
//! without touching the network.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chatroute::{
    catalog::ProviderKind,
    chat::InMemoryChatStore,
    config::Config,
    handlers::{AppState, app, chat::FAILURE_REPLY_PREFIX},
    message::Role,
    middleware::{REQUEST_ID_HEADER, USER_ID_HEADER},
    router::ALL_UNAVAILABLE,
};
use common::{ScriptedAdapter, Step, abc_catalog};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const ALICE: &str = "alice";
const BOB: &str = "bob";

fn build_app(adapters: Vec<Arc<ScriptedAdapter>>) -> Router {
    let router = common::router_with(abc_catalog(), adapters);
    let metrics = Arc::new(chatroute::metrics::Metrics::new().expect("should create Metrics"));
    let state = AppState::from_parts(
        Arc::new(Config::default()),
        Arc::new(router),
        Arc::new(InMemoryChatStore::new()),
        metrics,
    );
    app(state)
}

fn setup() -> (Router, Arc<ScriptedAdapter>) {
    let adapter = Arc::new(ScriptedAdapter::new(ProviderKind::Inference));
    (build_app(vec![adapter.clone()]), adapter)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response should be JSON")
    };
    (status, json)
}

fn post_chat(user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(USER_ID_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(USER_ID_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// POST /api/chat
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_requires_user() {
    let (app, adapter) = setup();

    let (status, body) = send(&app, post_chat(None, json!({"message": "hi"}))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(adapter.called_ids().is_empty());
}

#[tokio::test]
async fn test_chat_rejects_empty_turn() {
    let (app, adapter) = setup();

    let (status, body) = send(&app, post_chat(Some(ALICE), json!({"message": "   "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message or attachment required");
    assert!(adapter.called_ids().is_empty());
}

#[tokio::test]
async fn test_new_chat_round_trip() {
    let (app, adapter) = setup();

    let (status, body) = send(
        &app,
        post_chat(Some(ALICE), json!({"message": "What is Rust?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let chat_id = body["chatId"].as_str().expect("chatId").to_string();
    assert_eq!(body["userMessage"]["role"], "user");
    assert_eq!(body["userMessage"]["content"], "What is Rust?");
    assert_eq!(body["assistantMessage"]["role"], "assistant");
    assert_eq!(body["assistantMessage"]["content"], "ok from a");
    assert_eq!(body["modelUsed"], "Model A");
    assert_eq!(adapter.called_ids(), ["a"]);

    // Title comes from the first message
    let (status, detail) = send(&app, get(&format!("/api/chat/{}", chat_id), ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["id"], chat_id.as_str());
    assert_eq!(detail["title"], "What is Rust?");
    assert!(detail.get("userId").is_none());
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_follow_up_turn_includes_history() {
    let (app, adapter) = setup();

    let (_, first) = send(&app, post_chat(Some(ALICE), json!({"message": "first"}))).await;
    let chat_id = first["chatId"].as_str().unwrap();

    let (status, second) = send(
        &app,
        post_chat(
            Some(ALICE),
            json!({"chatId": chat_id, "message": "second", "model": "b"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["chatId"], chat_id);
    assert_eq!(second["modelUsed"], "Model B");

    // system, first user turn, first reply, new user turn
    let calls = adapter.calls();
    let last = &calls[1].messages;
    assert_eq!(last.len(), 4);
    assert_eq!(last[0].role, Role::System);
    assert_eq!(last[1].content.text(), "first");
    assert_eq!(last[2].role, Role::Assistant);
    assert_eq!(last[2].content.text(), "ok from a");
    assert_eq!(last[3].content.text(), "second");
}

#[tokio::test]
async fn test_image_attachment_reaches_adapter() {
    let (app, adapter) = setup();

    let (status, body) = send(
        &app,
        post_chat(
            Some(ALICE),
            json!({
                "attachments": [{
                    "filename": "cat.png",
                    "url": "data:image/png;base64,AAAA",
                    "type": "image/png",
                    "size": 4
                }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userMessage"]["attachments"][0]["filename"], "cat.png");

    let calls = adapter.calls();
    assert_eq!(calls[0].image_refs.len(), 1);
    let user_turn = calls[0].messages.last().unwrap();
    assert_eq!(user_turn.content.text(), "Please analyze this image.");
    assert_eq!(user_turn.content.image_count(), 1);
}

#[tokio::test]
async fn test_failed_routing_is_stored_as_assistant_reply() {
    let adapter = Arc::new(
        ScriptedAdapter::new(ProviderKind::Inference).script("c", vec![Step::rate_limited()]),
    );
    let app = build_app(vec![adapter.clone()]);

    let (status, body) = send(
        &app,
        post_chat(Some(ALICE), json!({"message": "hi", "model": "c"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["assistantMessage"]["content"],
        format!("{}{}", FAILURE_REPLY_PREFIX, ALL_UNAVAILABLE)
    );
    assert!(body.get("modelUsed").is_none());
}

#[tokio::test]
async fn test_no_configured_providers_replies_with_error_text() {
    let app = build_app(Vec::new());

    let (status, body) = send(&app, post_chat(Some(ALICE), json!({"message": "hi"}))).await;

    assert_eq!(status, StatusCode::OK);
    let content = body["assistantMessage"]["content"].as_str().unwrap();
    assert!(content.starts_with(FAILURE_REPLY_PREFIX));
}

#[tokio::test]
async fn test_unknown_chat_id_is_not_found() {
    let (app, adapter) = setup();

    let (status, body) = send(
        &app,
        post_chat(Some(ALICE), json!({"chatId": "missing", "message": "hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Chat not found");
    assert!(adapter.called_ids().is_empty());
}

#[tokio::test]
async fn test_chat_of_another_user_is_not_found() {
    let (app, _adapter) = setup();

    let (_, created) = send(&app, post_chat(Some(ALICE), json!({"message": "mine"}))).await;
    let chat_id = created["chatId"].as_str().unwrap();

    let (status, _) = send(
        &app,
        post_chat(Some(BOB), json!({"chatId": chat_id, "message": "hijack"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/api/chat/{}", chat_id), BOB)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat history
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_chats_is_scoped_and_counts_messages() {
    let (app, _adapter) = setup();

    let (_, first) = send(&app, post_chat(Some(ALICE), json!({"message": "one"}))).await;
    let first_id = first["chatId"].as_str().unwrap();
    send(
        &app,
        post_chat(Some(ALICE), json!({"chatId": first_id, "message": "again"})),
    )
    .await;
    send(&app, post_chat(Some(BOB), json!({"message": "bob's chat"}))).await;

    let (status, list) = send(&app, get("/api/chats", ALICE)).await;

    assert_eq!(status, StatusCode::OK);
    let chats = list.as_array().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], first_id);
    assert_eq!(chats[0]["messageCount"], 4);
}

#[tokio::test]
async fn test_delete_chat_then_not_found() {
    let (app, _adapter) = setup();

    let (_, created) = send(&app, post_chat(Some(ALICE), json!({"message": "bye"}))).await;
    let uri = format!("/api/chat/{}", created["chatId"].as_str().unwrap());

    let (status, body) = send(&app, delete(&uri, ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chat deleted");

    let (status, _) = send(&app, get(&uri, ALICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting again is still a success
    let (status, _) = send(&app, delete(&uri, ALICE)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_history_endpoints_require_user() {
    let (app, _adapter) = setup();

    let request = Request::builder()
        .uri("/api/chats")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─────────────────────────────────────────────────────────────────────────────
// Service endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_sets_request_id_header() {
    let (app, _adapter) = setup();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("request id header")
        .to_str()
        .unwrap();
    assert!(uuid::Uuid::parse_str(header).is_ok());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({"status": "OK"}));
}

#[tokio::test]
async fn test_models_lists_auto_then_catalog_and_preference() {
    let (app, _adapter) = setup();

    let (status, before) = send(
        &app,
        Request::builder()
            .uri("/api/models")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = before["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["auto", "a", "b", "c"]);
    assert!(before.get("preferred").is_none());

    send(&app, post_chat(Some(ALICE), json!({"message": "hi"}))).await;

    let (_, after) = send(
        &app,
        Request::builder()
            .uri("/api/models")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(after["preferred"], "Model A");
}

#[tokio::test]
async fn test_metrics_endpoint_reflects_chat_turns() {
    let (app, _adapter) = setup();

    send(&app, post_chat(Some(ALICE), json!({"message": "count me"}))).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("chatroute_attempts_total{model=\"a\",result=\"success\"} 1"));
    assert!(text.contains("chatroute_route_outcomes_total{result=\"success\",selection=\"auto\"} 1"));
}
