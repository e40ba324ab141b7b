use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::providers::ProviderRegistry;
use crate::services::{ChatService, EventBus, InvestorService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ProviderRegistry>,
    pub chat_service: Arc<ChatService>,
    pub investor_service: Arc<InvestorService>,
    pub event_bus: Arc<EventBus>,
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(state: &AppState) -> Self {
        state.chat_service.clone()
    }
}

impl FromRef<AppState> for Arc<InvestorService> {
    fn from_ref(state: &AppState) -> Self {
        state.investor_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProviderRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
