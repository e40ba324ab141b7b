use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::investor::{InvestorProfile, SearchResult};

pub const MAX_MESSAGE_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ===== REQUEST MODELS =====

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub model_provider: Option<String>,
}

impl ChatRequest {
    /// Trimmed message text, or a description of why it is unacceptable.
    pub fn validated_message(&self) -> Result<String, String> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err("Message cannot be empty".to_string());
        }
        let len = message.chars().count();
        if len > MAX_MESSAGE_CHARS {
            return Err(format!(
                "Message is too long ({} characters, maximum {})",
                len, MAX_MESSAGE_CHARS
            ));
        }
        Ok(message.to_string())
    }
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationInfo {
    pub current_page: usize,
    pub page_size: usize,
    pub total_investors: usize,
    pub has_more_investors: bool,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
    pub conversation_id: String,
    pub sectors_discussed: Vec<String>,
    pub total_investors_found: usize,
    pub model_used: String,
    pub processing_time_ms: u64,
    pub pagination: PaginationInfo,
}
