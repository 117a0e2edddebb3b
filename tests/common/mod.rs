//! Shared helpers for integration tests
//!
//! `ScriptedAdapter` stands in for a real provider: each model id gets a
//! queue of steps (reply, fail, stall) consumed one per call, and every call
//! is recorded for later assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use chatroute::catalog::{Catalog, ModelCandidate, ProviderKind};
use chatroute::message::{ImageRef, NormalizedMessage};
use chatroute::metrics::Metrics;
use chatroute::providers::{AdapterSet, ProviderAdapter, ProviderError};
use chatroute::router::ModelRouter;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted call does
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(ProviderError),
    /// Never answers within any reasonable deadline
    Stall,
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Self::Reply(text.to_string())
    }

    pub fn rate_limited() -> Self {
        Self::Fail(ProviderError::new("Too Many Requests").with_status(429))
    }

    pub fn hard(message: &str) -> Self {
        Self::Fail(ProviderError::new(message).with_status(400))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_id: String,
    pub messages: Vec<NormalizedMessage>,
    pub image_refs: Vec<ImageRef>,
}

pub struct ScriptedAdapter {
    kind: ProviderKind,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAdapter {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue steps for one model id; unscripted calls reply "ok from {id}"
    pub fn script(self, model_id: &str, steps: Vec<Step>) -> Self {
        self.push(model_id, steps);
        self
    }

    pub fn push(&self, model_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model_id.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model_id).collect()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn invoke(
        &self,
        candidate: &ModelCandidate,
        messages: &[NormalizedMessage],
        image_refs: &[ImageRef],
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model_id: candidate.id().to_string(),
            messages: messages.to_vec(),
            image_refs: image_refs.to_vec(),
        });

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(candidate.id())
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
            None => Ok(format!("ok from {}", candidate.id())),
        }
    }
}

/// Three inference candidates: a (1), b (2), c (3)
pub fn abc_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new(vec![
        ModelCandidate::new("a", "Model A", 1, ProviderKind::Inference),
        ModelCandidate::new("b", "Model B", 2, ProviderKind::Inference),
        ModelCandidate::new("c", "Model C", 3, ProviderKind::Inference),
    ]))
}

pub fn router_with(catalog: Arc<Catalog>, adapters: Vec<Arc<ScriptedAdapter>>) -> ModelRouter {
    let set = adapters
        .into_iter()
        .fold(AdapterSet::new(), |set, adapter| set.with(adapter));
    let metrics = Arc::new(Metrics::new().expect("should create Metrics"));
    ModelRouter::new(catalog, set, metrics).with_deadline(Duration::from_millis(8_000))
}
