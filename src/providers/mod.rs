//! Provider adapters
//!
//! Each adapter is a thin translation shim between the normalized message
//! list and one upstream provider's wire format. Adapters never retry and
//! never apply a deadline; both belong to the router.

pub mod bytez;
pub mod inference;

pub use bytez::BytezAdapter;
pub use inference::InferenceAdapter;

use crate::catalog::{ModelCandidate, ProviderKind};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::message::{ImageRef, NormalizedMessage};
use crate::router::rate_limit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Provider-reported error code
///
/// SDKs report throttling as a number, a numeric string, or a symbolic code
/// such as `"RateLimitReached"`; both shapes are kept for classification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Numeric(i64),
    Text(String),
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(code) => write!(f, "{}", code),
            Self::Text(code) => f.write_str(code),
        }
    }
}

/// Normalized provider failure
///
/// Carries the `(status, code, message)` triple the rate-limit classifier
/// expects. All vendor-specific unwrapping happens before one of these is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    status: Option<u16>,
    code: Option<ErrorCode>,
    message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Build from a transport-level failure (connect, TLS, body decode)
    pub fn transport(error: reqwest::Error) -> Self {
        let mut err = Self::new(error.to_string());
        err.status = error.status().map(|s| s.as_u16());
        err
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this failure is provider-side throttling
    pub fn is_rate_limited(&self) -> bool {
        rate_limit::is_rate_limited(self.status, self.code.as_ref(), Some(&self.message))
    }
}

/// One upstream provider family
///
/// `invoke` returns the raw reply text. Empty replies are returned as-is;
/// the router decides what counts as usable content.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider family served by this adapter
    fn kind(&self) -> ProviderKind;

    /// Send the conversation to the candidate's upstream model
    async fn invoke(
        &self,
        candidate: &ModelCandidate,
        messages: &[NormalizedMessage],
        image_refs: &[ImageRef],
    ) -> Result<String, ProviderError>;
}

/// Adapters keyed by provider family
///
/// Only providers with a configured credential get an adapter. An empty set
/// means the router has nothing it can call.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own provider kind
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Build the HTTP adapters for every provider that has a credential
    ///
    /// # Errors
    /// Returns `AppError::Config` if the shared HTTP client cannot be built
    /// (TLS backend initialization failure).
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client for provider adapters");
            AppError::Config(format!("failed to build HTTP client: {}", e))
        })?;

        let mut set = Self::new();

        match config.upstream.token() {
            Some(token) => {
                set = set.with(Arc::new(InferenceAdapter::new(
                    http.clone(),
                    config.upstream.endpoint(),
                    token,
                )));
            }
            None => tracing::warn!(
                provider = %ProviderKind::Inference,
                "No upstream token configured, inference models are disabled"
            ),
        }

        match config.bytez.api_key() {
            Some(key) => {
                set = set.with(Arc::new(BytezAdapter::new(
                    http,
                    config.bytez.base_url(),
                    key,
                )));
            }
            None => tracing::warn!(
                provider = %ProviderKind::Bytez,
                "No Bytez API key configured, Bytez models are disabled"
            ),
        }

        tracing::info!(adapter_count = set.len(), "Provider adapters initialized");
        Ok(set)
    }
}
