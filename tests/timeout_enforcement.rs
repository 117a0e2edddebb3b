//! Integration tests for timeout enforcement
//!
//! Runs the router over the real inference adapter against a wiremock server
//! whose responses are delayed, so the per-attempt deadline fires on a live
//! HTTP request rather than a scripted sleep.

use chatroute::catalog::{Catalog, ModelCandidate, ProviderKind};
use chatroute::message::NormalizedMessage;
use chatroute::metrics::{AttemptResult, Metrics};
use chatroute::providers::{AdapterSet, InferenceAdapter};
use chatroute::router::{ALL_UNAVAILABLE, ModelRouter, ModelSelection, RouterRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

const DEADLINE: Duration = Duration::from_millis(200);

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    }))
}

/// Slow model ranked first, fast model second
async fn setup() -> (MockServer, ModelRouter) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "slow-upstream"})))
        .respond_with(completion("too late").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "fast-upstream"})))
        .respond_with(completion("quick answer"))
        .mount(&server)
        .await;

    let catalog = Arc::new(Catalog::new(vec![
        ModelCandidate::new("slow", "Slow Model", 1, ProviderKind::Inference)
            .with_upstream_model("slow-upstream"),
        ModelCandidate::new("fast", "Fast Model", 2, ProviderKind::Inference)
            .with_upstream_model("fast-upstream"),
    ]));
    let adapters = AdapterSet::new().with(Arc::new(InferenceAdapter::new(
        reqwest::Client::new(),
        &server.uri(),
        "test-token",
    )));
    let metrics = Arc::new(Metrics::new().expect("should create Metrics"));
    let router = ModelRouter::new(catalog, adapters, metrics).with_deadline(DEADLINE);

    (server, router)
}

fn request(selection: &str) -> RouterRequest {
    RouterRequest::new(
        vec![
            NormalizedMessage::system("sys"),
            NormalizedMessage::user("hello"),
        ],
        ModelSelection::from(selection),
    )
}

#[tokio::test]
async fn test_auto_abandons_slow_model_and_uses_next() {
    let (_server, router) = setup().await;

    let started = Instant::now();
    let outcome = router.route(&request("auto")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.response(), Some("quick answer"));
    assert_eq!(outcome.model_used(), Some("Fast Model"));
    assert!(
        elapsed < Duration::from_secs(3),
        "slow model should be abandoned at the deadline, took {:?}",
        elapsed
    );
    assert_eq!(
        router.metrics().attempts_count("slow", AttemptResult::Timeout),
        1
    );
    assert_eq!(router.preferred_model().map(|c| c.id()), Some("fast"));
}

#[tokio::test]
async fn test_specific_slow_model_times_out_as_unavailable() {
    let (_server, router) = setup().await;

    let started = Instant::now();
    let outcome = router.route(&request("slow")).await.unwrap();

    assert_eq!(outcome.error(), Some(ALL_UNAVAILABLE));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_fast_model_within_deadline_succeeds() {
    let (_server, router) = setup().await;

    let outcome = router.route(&request("fast")).await.unwrap();

    assert_eq!(outcome.response(), Some("quick answer"));
    assert_eq!(
        router.metrics().attempts_count("fast", AttemptResult::Success),
        1
    );
}
