//! Model selection and failover
//!
//! [`ModelRouter`] turns one chat turn into one [`RouterOutcome`]. It orders
//! the candidates for the requested [`ModelSelection`], tries them one at a
//! time under a per-attempt deadline, and decides after each failure whether
//! to move on to the next candidate or stop.
//!
//! ## Failure policy
//!
//! | failure | auto, more candidates left | auto, last candidate | specific model |
//! |---|---|---|---|
//! | timeout / rate limited | next | "all unavailable" | "all unavailable" |
//! | empty reply / other | next | surface message | surface message |

pub mod deadline;
mod preference;
pub mod rate_limit;

pub use deadline::{DEFAULT_MODEL_TIMEOUT_MS, DeadlineError, with_deadline};
pub use rate_limit::is_rate_limited;

use preference::AutoPreference;

use crate::catalog::{Catalog, ModelCandidate, ProviderKind};
use crate::config::Config;
use crate::error::AppResult;
use crate::message::{ImageRef, NormalizedMessage};
use crate::metrics::{AttemptResult, Metrics, SelectionKind};
use crate::providers::{AdapterSet, ProviderError};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Selection value meaning "let the router choose"
pub const AUTO: &str = "auto";

/// Final failure message once every candidate has been tried
///
/// Per-candidate errors are logged, never shown to the end user.
pub const ALL_UNAVAILABLE: &str = "All models are currently unavailable. Please try again later.";

/// Which model the caller asked for
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSelection {
    #[default]
    Auto,
    Specific(String),
}

impl ModelSelection {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => AUTO,
            Self::Specific(id) => id,
        }
    }

    fn kind(&self) -> SelectionKind {
        match self {
            Self::Auto => SelectionKind::Auto,
            Self::Specific(_) => SelectionKind::Specific,
        }
    }
}

impl From<&str> for ModelSelection {
    fn from(value: &str) -> Self {
        if value == AUTO {
            Self::Auto
        } else {
            Self::Specific(value.to_string())
        }
    }
}

impl From<String> for ModelSelection {
    fn from(value: String) -> Self {
        if value == AUTO {
            Self::Auto
        } else {
            Self::Specific(value)
        }
    }
}

impl From<ModelSelection> for String {
    fn from(value: ModelSelection) -> Self {
        match value {
            ModelSelection::Auto => AUTO.to_string(),
            ModelSelection::Specific(id) => id,
        }
    }
}

impl std::fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to [`ModelRouter::route`]
#[derive(Debug, Clone)]
pub struct RouterRequest {
    /// Conversation with the system message first
    pub messages: Vec<NormalizedMessage>,
    pub selection: ModelSelection,
    /// Images of the current turn, for adapters that cannot take image parts
    pub image_refs: Vec<ImageRef>,
}

impl RouterRequest {
    pub fn new(messages: Vec<NormalizedMessage>, selection: ModelSelection) -> Self {
        Self {
            messages,
            selection,
            image_refs: Vec::new(),
        }
    }

    pub fn with_images(mut self, image_refs: Vec<ImageRef>) -> Self {
        self.image_refs = image_refs;
        self
    }
}

/// Result of one routed chat turn
///
/// Serializes as `{"success": true, "response", "modelUsed"}` or
/// `{"success": false, "error"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
    Success {
        /// Trimmed, never blank
        response: String,
        /// Display name of the candidate that answered
        model_used: String,
    },
    Failure {
        error: String,
    },
}

impl RouterOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::Failure { .. } => None,
        }
    }

    pub fn model_used(&self) -> Option<&str> {
        match self {
            Self::Success { model_used, .. } => Some(model_used),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

impl Serialize for RouterOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success {
                response,
                model_used,
            } => {
                let mut s = serializer.serialize_struct("RouterOutcome", 3)?;
                s.serialize_field("success", &true)?;
                s.serialize_field("response", response)?;
                s.serialize_field("modelUsed", model_used)?;
                s.end()
            }
            Self::Failure { error } => {
                let mut s = serializer.serialize_struct("RouterOutcome", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("error", error)?;
                s.end()
            }
        }
    }
}

/// Raised before any attempt when nothing can be called at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No provider credentials are configured (set GITHUB_TOKEN or AI_API_KEY, or BYTEZ_KEY)")]
    NoCredentials,
}

/// Why a single candidate attempt failed
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttemptError {
    #[error("{label} did not respond in time")]
    Timeout { label: String },

    #[error("{0}")]
    RateLimited(ProviderError),

    #[error("{label} returned an empty response")]
    EmptyReply { label: String },

    #[error("No credentials configured for the {provider} provider")]
    NoAdapter { provider: ProviderKind },

    #[error("{0}")]
    Provider(ProviderError),
}

impl AttemptError {
    /// Transient failures always move on to the next candidate
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RateLimited(_))
    }

    fn result_label(&self) -> AttemptResult {
        match self {
            Self::Timeout { .. } => AttemptResult::Timeout,
            Self::RateLimited(_) => AttemptResult::RateLimited,
            Self::EmptyReply { .. } => AttemptResult::EmptyReply,
            Self::NoAdapter { .. } | Self::Provider(_) => AttemptResult::Failed,
        }
    }
}

impl From<DeadlineError<ProviderError>> for AttemptError {
    fn from(err: DeadlineError<ProviderError>) -> Self {
        match err {
            DeadlineError::Elapsed { label, .. } => Self::Timeout { label },
            DeadlineError::Failed(e) if e.is_rate_limited() => Self::RateLimited(e),
            DeadlineError::Failed(e) => Self::Provider(e),
        }
    }
}

/// Multi-provider router with failover and a sticky auto preference
pub struct ModelRouter {
    catalog: Arc<Catalog>,
    adapters: AdapterSet,
    preference: AutoPreference,
    deadline: Duration,
    metrics: Arc<Metrics>,
}

impl ModelRouter {
    /// Create a router with an empty preference and the default deadline
    pub fn new(catalog: Arc<Catalog>, adapters: AdapterSet, metrics: Arc<Metrics>) -> Self {
        Self {
            catalog,
            adapters,
            preference: AutoPreference::new(),
            deadline: Duration::from_millis(DEFAULT_MODEL_TIMEOUT_MS),
            metrics,
        }
    }

    /// Build the router described by the configuration
    ///
    /// # Errors
    /// Returns `AppError::Config` if the provider HTTP client cannot be built.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> AppResult<Self> {
        let catalog = Arc::new(config.catalog());
        let adapters = AdapterSet::from_config(config)?;
        Ok(Self::new(catalog, adapters, metrics)
            .with_deadline(Duration::from_millis(config.routing.model_timeout_ms())))
    }

    /// Override the per-attempt deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Make `id` the sticky auto choice
    ///
    /// Returns false, leaving the preference untouched, when `id` is not in
    /// the catalog.
    pub fn prefer(&self, id: &str) -> bool {
        match self.catalog.position(id) {
            Some(position) => {
                self.preference.record(position);
                true
            }
            None => false,
        }
    }

    /// Whether at least one catalog candidate has a configured adapter
    pub fn has_callable_candidate(&self) -> bool {
        self.catalog
            .providers()
            .into_iter()
            .any(|kind| self.adapters.get(kind).is_some())
    }

    /// Candidate the next auto request will try first because of stickiness
    pub fn preferred_model(&self) -> Option<&ModelCandidate> {
        self.preference
            .get()
            .and_then(|position| self.catalog.get(position))
    }

    /// Ordered attempt list for a selection
    ///
    /// Auto: catalog priority order, with the sticky winner moved to the
    /// front. Specific: that one candidate, or nothing if the id is unknown.
    /// The returned list is a private copy; the catalog is never reordered.
    pub fn candidates(&self, selection: &ModelSelection) -> Vec<&ModelCandidate> {
        match selection {
            ModelSelection::Specific(id) => self.catalog.find(id).into_iter().collect(),
            ModelSelection::Auto => {
                let mut ordered: Vec<&ModelCandidate> = self.catalog.candidates().iter().collect();
                if let Some(position) = self.preference.get() {
                    if position > 0 && position < ordered.len() {
                        let favored = ordered.remove(position);
                        ordered.insert(0, favored);
                    }
                }
                ordered
            }
        }
    }

    /// Route one chat turn
    ///
    /// Provider failures never surface as `Err`; they become
    /// `RouterOutcome::Failure`. `Err` means no catalog candidate has a
    /// configured provider, checked before any candidate is attempted.
    pub async fn route(&self, request: &RouterRequest) -> Result<RouterOutcome, ConfigurationError> {
        if !self.has_callable_candidate() {
            tracing::error!(
                selection = %request.selection,
                "No catalog model has a configured provider credential, refusing to route"
            );
            return Err(ConfigurationError::NoCredentials);
        }

        let selection = &request.selection;
        let candidates = self.candidates(selection);

        tracing::debug!(
            selection = %selection,
            candidate_count = candidates.len(),
            candidates = ?candidates.iter().map(|c| c.id()).collect::<Vec<_>>(),
            image_count = request.image_refs.len(),
            "Routing chat request"
        );

        if candidates.is_empty() {
            tracing::warn!(selection = %selection, "Requested model is not in the catalog");
            return Ok(self.finish(selection, RouterOutcome::failure(ALL_UNAVAILABLE)));
        }

        let last = candidates.len() - 1;
        for (index, candidate) in candidates.iter().enumerate() {
            let started = Instant::now();
            let result = self.attempt(candidate, request).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            let label = match &result {
                Ok(_) => AttemptResult::Success,
                Err(e) => e.result_label(),
            };
            if let Err(e) = self.metrics.record_attempt(candidate.id(), label, elapsed_ms) {
                self.metrics.metrics_recording_failure("record_attempt");
                tracing::error!(
                    error = %e,
                    model_id = %candidate.id(),
                    "Metrics recording failed. Observability degraded but request continues."
                );
            }

            match result {
                Ok(reply) => {
                    if selection.is_auto() {
                        self.prefer(candidate.id());
                    }

                    tracing::info!(
                        selection = %selection,
                        model_id = %candidate.id(),
                        attempt = index + 1,
                        elapsed_ms = elapsed_ms,
                        "Model replied successfully"
                    );

                    return Ok(self.finish(
                        selection,
                        RouterOutcome::Success {
                            response: reply.trim().to_string(),
                            model_used: candidate.display_name().to_string(),
                        },
                    ));
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        selection = %selection,
                        model_id = %candidate.id(),
                        attempt = index + 1,
                        error = %e,
                        "Transient failure, trying next model"
                    );
                }
                Err(e) => {
                    if !selection.is_auto() || index == last {
                        tracing::error!(
                            selection = %selection,
                            model_id = %candidate.id(),
                            attempt = index + 1,
                            error = %e,
                            "Model failed, giving up"
                        );
                        return Ok(self.finish(selection, RouterOutcome::failure(e.to_string())));
                    }

                    tracing::warn!(
                        selection = %selection,
                        model_id = %candidate.id(),
                        attempt = index + 1,
                        error = %e,
                        "Model failed in auto mode, trying next model"
                    );
                }
            }
        }

        tracing::error!(
            selection = %selection,
            attempted = candidates.len(),
            "All candidate models exhausted"
        );
        Ok(self.finish(selection, RouterOutcome::failure(ALL_UNAVAILABLE)))
    }

    /// One candidate, one upstream call, under the deadline
    async fn attempt(
        &self,
        candidate: &ModelCandidate,
        request: &RouterRequest,
    ) -> Result<String, AttemptError> {
        let adapter = self
            .adapters
            .get(candidate.provider())
            .ok_or(AttemptError::NoAdapter {
                provider: candidate.provider(),
            })?;

        let reply = with_deadline(
            adapter.invoke(candidate, &request.messages, &request.image_refs),
            candidate.display_name(),
            self.deadline,
        )
        .await
        .map_err(AttemptError::from)?;

        if reply.trim().is_empty() {
            return Err(AttemptError::EmptyReply {
                label: candidate.display_name().to_string(),
            });
        }

        Ok(reply)
    }

    fn finish(&self, selection: &ModelSelection, outcome: RouterOutcome) -> RouterOutcome {
        if let Err(e) = self
            .metrics
            .record_outcome(selection.kind(), outcome.is_success())
        {
            self.metrics.metrics_recording_failure("record_outcome");
            tracing::error!(
                error = %e,
                "Metrics recording failed. Observability degraded but request continues."
            );
        }
        outcome
    }
}
