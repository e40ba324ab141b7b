use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::pagination::PaginationState;
use crate::models::{ChatMessage, InvestorProfile, SearchResult};

/// Search results carried into a prompt snapshot.
pub const SNAPSHOT_RESULTS: usize = 20;

/// Accumulated state of one chat session.
///
/// Invariants: no two investors share a case-insensitive name, no two search
/// results share a URL, sectors are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub investors: Vec<InvestorProfile>,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub pagination: PaginationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, page_size: usize) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            investors: Vec::new(),
            search_results: Vec::new(),
            sectors: Vec::new(),
            pagination: PaginationState::new(page_size),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Idle longer than `ttl` as of `now`.
    pub fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at > ttl
    }

    /// Appends a message, keeping at most `max_messages` of the newest.
    pub fn push_message(&mut self, message: ChatMessage, max_messages: usize) {
        self.messages.push(message);
        if max_messages > 0 && self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Appends investors whose lowercased name is not already present.
    /// Returns how many were added.
    pub fn add_investors(&mut self, investors: &[InvestorProfile]) -> usize {
        let mut seen: HashSet<String> =
            self.investors.iter().map(InvestorProfile::identity_key).collect();
        let before = self.investors.len();
        for investor in investors {
            let key = investor.identity_key();
            if key.is_empty() {
                continue;
            }
            if seen.insert(key) {
                self.investors.push(investor.clone());
            }
        }
        self.investors.len() - before
    }

    pub fn add_search_results(&mut self, results: &[SearchResult]) -> usize {
        let mut seen: HashSet<String> = self.search_results.iter().map(|r| r.url.clone()).collect();
        let before = self.search_results.len();
        for result in results {
            if seen.insert(result.url.clone()) {
                self.search_results.push(result.clone());
            }
        }
        self.search_results.len() - before
    }

    pub fn add_sectors(&mut self, sectors: &[String]) {
        let mut seen: HashSet<String> = self.sectors.iter().map(|s| s.to_lowercase()).collect();
        for sector in sectors {
            let trimmed = sector.trim();
            if !trimmed.is_empty() && seen.insert(trimmed.to_lowercase()) {
                self.sectors.push(trimmed.to_string());
            }
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            conversation_id: self.conversation_id.clone(),
            message_count: self.messages.len(),
            investors_found: self.investors.len(),
            search_results_count: self.search_results.len(),
            sectors_discussed: self.sectors.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Read-only view sized for prompt building.
    pub fn snapshot(&self, history_window: usize) -> ContextSnapshot {
        ContextSnapshot {
            conversation_id: self.conversation_id.clone(),
            messages: tail(&self.messages, history_window),
            investors: self.investors.clone(),
            search_results: tail(&self.search_results, SNAPSHOT_RESULTS),
            sectors: self.sectors.clone(),
            pagination: self.pagination,
            summary: self.summary(),
        }
    }
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: usize,
    pub investors_found: usize,
    pub search_results_count: usize,
    pub sectors_discussed: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub conversation_id: String,
    /// Newest `history_window` messages, oldest first.
    pub messages: Vec<ChatMessage>,
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
    pub sectors: Vec<String>,
    pub pagination: PaginationState,
    pub summary: ConversationSummary,
}
