//! Static model catalog
//!
//! The catalog is the full set of upstream models the router may call. It is
//! built once at startup from configuration and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Upstream provider family that serves a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions endpoint (GitHub Models / Azure AI Inference)
    Inference,
    /// Bytez hosted models (text only)
    Bytez,
}

impl ProviderKind {
    /// Convert to string representation for logging and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::Bytez => "bytez",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single model the router can try
///
/// Fields are private; instances come from configuration deserialization or
/// from [`ModelCandidate::new`], and are validated by `Config::validate()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelCandidate {
    id: String,
    display_name: String,
    /// Ascending: lower values are tried first in auto mode
    priority: u32,
    provider: ProviderKind,
    /// Model name sent upstream; defaults to `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upstream_model: Option<String>,
}

impl ModelCandidate {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        priority: u32,
        provider: ProviderKind,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            priority,
            provider,
            upstream_model: None,
        }
    }

    /// Set the upstream model name
    pub fn with_upstream_model(mut self, model: impl Into<String>) -> Self {
        self.upstream_model = Some(model.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Model name to put in the upstream request body
    pub fn upstream_model(&self) -> &str {
        self.upstream_model.as_deref().unwrap_or(&self.id)
    }
}

/// The default catalog used when the config file has no `[[models]]` entries
pub fn default_models() -> Vec<ModelCandidate> {
    vec![
        ModelCandidate::new("gpt-4.1", "GPT-4.1", 1, ProviderKind::Inference)
            .with_upstream_model("openai/gpt-4.1"),
        ModelCandidate::new("gpt-4.1-bytez", "GPT-4.1 BYTEZ", 2, ProviderKind::Bytez)
            .with_upstream_model("openai/gpt-4.1"),
        ModelCandidate::new("gpt-4.1-mini", "GPT-4.1 MINI", 3, ProviderKind::Inference)
            .with_upstream_model("openai/gpt-4.1-mini"),
    ]
}

/// Ordered set of all candidates
///
/// Candidates are kept sorted ascending by priority. The sort is stable, so
/// candidates sharing a priority keep their configured order.
#[derive(Debug, Clone)]
pub struct Catalog {
    candidates: Vec<ModelCandidate>,
}

impl Catalog {
    pub fn new(mut candidates: Vec<ModelCandidate>) -> Self {
        candidates.sort_by_key(|c| c.priority);
        Self { candidates }
    }

    /// All candidates in ascending priority order
    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    /// Look up a candidate by id
    pub fn find(&self, id: &str) -> Option<&ModelCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    /// Position of a candidate in priority order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.candidates.iter().position(|c| c.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&ModelCandidate> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Provider families referenced by at least one candidate
    pub fn providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = Vec::new();
        for candidate in &self.candidates {
            if !kinds.contains(&candidate.provider) {
                kinds.push(candidate.provider);
            }
        }
        kinds
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_models())
    }
}
