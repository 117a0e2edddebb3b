//! Models endpoint handler
//!
//! Lists the selectable models via GET /api/models: the `auto` option first,
//! then the catalog in priority order.

use crate::catalog::ProviderKind;
use crate::handlers::AppState;
use crate::router::AUTO;
use axum::{Json, extract::State};
use serde::Serialize;

/// Response for GET /api/models
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    /// Display name of the model auto mode will try first, if one has won
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
}

/// GET /api/models handler
pub async fn handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let router = state.router();

    let mut models = Vec::with_capacity(router.catalog().len() + 1);
    models.push(ModelInfo {
        id: AUTO.to_string(),
        name: "Auto".to_string(),
        priority: None,
        provider: None,
    });
    models.extend(router.catalog().candidates().iter().map(|c| ModelInfo {
        id: c.id().to_string(),
        name: c.display_name().to_string(),
        priority: Some(c.priority()),
        provider: Some(c.provider()),
    }));

    let preferred = router
        .preferred_model()
        .map(|c| c.display_name().to_string());

    tracing::debug!(
        total_models = models.len(),
        preferred = ?preferred,
        "Listed selectable models"
    );

    Json(ModelsResponse { models, preferred })
}
