use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Settings;
use crate::providers::{ProviderKind, ProviderRegistry};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    app_name: String,
    providers: ProviderListing,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProviderListing {
    pub llm: Vec<String>,
    pub search: Vec<String>,
    pub scraper: Vec<String>,
    pub default_llm: String,
}

impl ProviderListing {
    fn from_registry(registry: &ProviderRegistry, settings: &Settings) -> Self {
        Self {
            llm: registry.registered(ProviderKind::Llm),
            search: registry.registered(ProviderKind::Search),
            scraper: registry.registered(ProviderKind::Scraper),
            default_llm: settings.llm.default_provider.clone(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_name: state.settings.server.app_name.clone(),
            providers: ProviderListing::from_registry(&state.registry, &state.settings),
        }),
    )
}

pub async fn list_providers(
    State(registry): State<Arc<ProviderRegistry>>,
    State(settings): State<Arc<Settings>>,
) -> Json<ProviderListing> {
    Json(ProviderListing::from_registry(&registry, &settings))
}
