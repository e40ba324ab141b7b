pub mod config;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod services;
pub mod state;
pub mod utils;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{info, warn};

use config::Settings;
use providers::ProviderRegistry;
use services::conversation::{ConversationStore, JsonFileStore};
use services::{ChatService, ConversationMemory, EventBus, InvestorService};
use state::AppState;

/// Wires registry, memory and services from settings.
pub async fn build_state(settings: Settings) -> Result<AppState> {
    let registry = Arc::new(ProviderRegistry::new());
    providers::register_builtin(&registry, &settings);
    info!(
        "Registered providers: llm={:?}, search={:?}, scraper={:?}",
        registry.registered(providers::ProviderKind::Llm),
        registry.registered(providers::ProviderKind::Search),
        registry.registered(providers::ProviderKind::Scraper)
    );

    let store: Option<Arc<dyn ConversationStore>> = if settings.memory.persistence_enabled {
        let store = JsonFileStore::open(&settings.memory.persistence_path).await?;
        info!("Persisting conversations to {}", settings.memory.persistence_path);
        Some(Arc::new(store))
    } else {
        None
    };

    Ok(assemble_state(settings, registry, store))
}

/// Builds services around an already populated registry.
pub fn assemble_state(
    settings: Settings,
    registry: Arc<ProviderRegistry>,
    store: Option<Arc<dyn ConversationStore>>,
) -> AppState {
    let event_bus = Arc::new(EventBus::default());
    let memory =
        ConversationMemory::new(settings.memory.clone(), settings.pagination.page_size, store);

    let investor_service = Arc::new(InvestorService::new(
        registry.clone(),
        settings.search.clone(),
        settings.scraper.clone(),
        event_bus.clone(),
    ));

    let chat_service = Arc::new(ChatService::new(
        registry.clone(),
        memory,
        investor_service.clone(),
        event_bus.clone(),
        settings.llm.clone(),
    ));

    AppState {
        settings: Arc::new(settings),
        registry,
        chat_service,
        investor_service,
        event_bus,
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat_handler))
        .route("/chat/stream", post(handlers::chat::chat_stream_handler))
        .route("/search-investors", post(handlers::search::search_investors_handler))
        .route("/conversations", get(handlers::conversation::list_conversations))
        .route(
            "/conversation/{id}",
            get(handlers::conversation::get_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route("/providers", get(handlers::health::list_providers));

    let body_limit = state.settings.server.request_body_limit_bytes;
    let cors = cors_layer(&state.settings.server.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(cors)
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::new())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

/// Periodic memory eviction, lock pruning and cache purging until shutdown is signalled.
pub fn spawn_maintenance(
    state: &AppState,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let chat_service = state.chat_service.clone();
    let investor_service = state.investor_service.clone();
    let period =
        std::time::Duration::from_secs(state.settings.memory.cleanup_interval_seconds.max(1));
    let mut shutdown = shutdown;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = chat_service.memory().evict();
                    let pruned = chat_service.locks().prune();
                    let purged = investor_service.cache().purge_expired();
                    tracing::debug!(
                        "Maintenance: {} conversations evicted, {} locks pruned, \
                         {} cache entries purged",
                        evicted,
                        pruned,
                        purged
                    );
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}
