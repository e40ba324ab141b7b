use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

use crate::models::{ChatRequest, ChatResponse};
use crate::services::ChatService;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    State(chat_service): State<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = chat_service.process_message(request).await?;
    info!(
        "Chat completed for {} in {}ms ({} investors)",
        response.conversation_id, response.processing_time_ms, response.total_investors_found
    );
    Ok(Json(response))
}

pub async fn chat_stream_handler(
    State(chat_service): State<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let events = chat_service.process_message_stream(request)?;
    let stream = events.map(|event| Ok(create_sse_event(event.event_type(), &event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// Helper: Create SSE event
fn create_sse_event<T: serde::Serialize>(event_type: &str, data: &T) -> Event {
    Event::default()
        .event(event_type)
        .data(serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string()))
}
