use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::services::conversation::{ConversationContext, ConversationSummary};
use crate::services::ChatService;
use crate::utils::error::ApiError;

#[derive(Serialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ConversationDetail {
    pub summary: ConversationSummary,
    #[serde(flatten)]
    pub context: ConversationContext,
}

pub async fn list_conversations(
    State(chat_service): State<Arc<ChatService>>,
) -> Json<ConversationList> {
    let conversations = chat_service.memory().list().await;
    Json(ConversationList {
        total: conversations.len(),
        conversations,
    })
}

pub async fn get_conversation(
    State(chat_service): State<Arc<ChatService>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let context = chat_service.conversation(&conversation_id).await?;
    Ok(Json(ConversationDetail {
        summary: context.summary(),
        context,
    }))
}

pub async fn delete_conversation(
    State(chat_service): State<Arc<ChatService>>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    chat_service.delete_conversation(&conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
