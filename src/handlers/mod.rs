//! HTTP request handlers for the chatroute API

use crate::chat::{ChatStore, InMemoryChatStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::router::ModelRouter;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod chat;
pub mod chats;
pub mod health;
pub mod metrics;
pub mod models;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    router: Arc<ModelRouter>,
    store: Arc<dyn ChatStore>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new AppState from configuration
    ///
    /// Builds provider adapters for every configured credential and an
    /// in-memory chat store.
    ///
    /// # Errors
    /// Returns an error if metrics registration or HTTP client construction
    /// fails.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?);
        let router = Arc::new(ModelRouter::from_config(&config, metrics.clone())?);

        tracing::info!(
            model_count = router.catalog().len(),
            deadline_ms = router.deadline().as_millis() as u64,
            "Model router initialized"
        );

        Ok(Self::from_parts(
            config,
            router,
            Arc::new(InMemoryChatStore::new()),
            metrics,
        ))
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: Arc<Config>,
        router: Arc<ModelRouter>,
        store: Arc<dyn ChatStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            router,
            store,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn store(&self) -> &dyn ChatStore {
        self.store.as_ref()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the HTTP application with all routes and middleware
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/api/models", get(models::handler))
        .route("/api/chat", post(chat::handler))
        .route("/api/chats", get(chats::list))
        .route("/api/chat/{chat_id}", get(chats::get).delete(chats::delete))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
