use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::pagination::{page, Page};
use super::store::ConversationStore;
use super::types::{ContextSnapshot, ConversationContext, ConversationSummary};
use crate::config::MemoryConfig;
use crate::models::{ChatMessage, InvestorProfile, SearchResult};

/// Longest honoured idle TTL; larger configured values are clamped to it.
const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
}

/// New material produced by one chat turn.
#[derive(Debug, Clone, Default)]
pub struct TurnUpdate {
    pub user_message: String,
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
    pub sectors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub snapshot: ContextSnapshot,
    pub new_investors: usize,
    pub new_search_results: usize,
}

/// In-process conversation contexts with TTL and ceiling eviction, optionally
/// mirrored to a [`ConversationStore`].
///
/// Callers that run multi-step turns must serialize them per conversation id;
/// individual operations here are atomic per entry.
#[derive(Clone)]
pub struct ConversationMemory {
    contexts: Arc<DashMap<String, ConversationContext>>,
    store: Option<Arc<dyn ConversationStore>>,
    config: MemoryConfig,
    page_size: usize,
}

impl ConversationMemory {
    pub fn new(
        config: MemoryConfig,
        page_size: usize,
        store: Option<Arc<dyn ConversationStore>>,
    ) -> Self {
        info!(
            "Initializing conversation memory (max={}, ttl={}h, persistence={})",
            config.max_conversations,
            config.ttl_hours,
            store.is_some()
        );
        Self {
            contexts: Arc::new(DashMap::new()),
            store,
            config,
            page_size: page_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Context for `id`, reloading from durable storage on a miss.
    pub async fn get(&self, id: &str) -> Option<ConversationContext> {
        if let Some(entry) = self.contexts.get(id) {
            return Some(entry.value().clone());
        }

        let store = self.store.as_ref()?;
        match store.load(id).await {
            Ok(Some(context)) => {
                debug!("Reloaded conversation {} from storage", id);
                self.insert_with_eviction(context.clone());
                Some(context)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load conversation {}: {}", id, e);
                None
            }
        }
    }

    /// Existing context for `id` or a fresh one. Creating may evict older
    /// contexts to stay under the ceiling.
    pub async fn get_or_create(&self, id: &str) -> ConversationContext {
        if let Some(context) = self.get(id).await {
            return context;
        }

        let context = ConversationContext::new(id, self.page_size);
        self.insert_with_eviction(context.clone());
        info!("Created conversation {}", id);
        self.persist(&context).await;
        context
    }

    /// Appends the user message and merges the turn's findings. When new
    /// investors arrive the page cursor moves to the first of them.
    pub async fn merge_turn(&self, id: &str, update: TurnUpdate) -> MergeOutcome {
        self.get_or_create(id).await;

        let merged = self.mutate(id, |context| {
            let previous_total = context.investors.len();
            if !update.user_message.is_empty() {
                let message = ChatMessage::user(update.user_message.clone());
                context.push_message(message, self.config.max_messages_per_conversation);
            }
            let new_investors = context.add_investors(&update.investors);
            let new_search_results = context.add_search_results(&update.search_results);
            context.add_sectors(&update.sectors);
            if new_investors > 0 {
                context.pagination.show_item(previous_total);
            }
            (new_investors, new_search_results)
        });

        let (context, (new_investors, new_search_results)) = match merged {
            Some(merged) => merged,
            None => {
                // Evicted between creation and mutation; start over with a fresh entry.
                let mut context = ConversationContext::new(id, self.page_size);
                let message = ChatMessage::user(update.user_message);
                context.push_message(message, self.config.max_messages_per_conversation);
                let new_investors = context.add_investors(&update.investors);
                let new_search_results = context.add_search_results(&update.search_results);
                context.add_sectors(&update.sectors);
                self.insert_with_eviction(context.clone());
                (context, (new_investors, new_search_results))
            }
        };

        self.persist(&context).await;
        debug!(
            "Merged turn into {}: +{} investors, +{} results",
            id, new_investors, new_search_results
        );

        MergeOutcome {
            snapshot: context.snapshot(self.config.history_window),
            new_investors,
            new_search_results,
        }
    }

    /// Appends an assistant message. Fails with `NotFound` when no context
    /// exists for `id`; replies are never recorded into a fresh context.
    pub async fn record_assistant_reply(&self, id: &str, text: &str) -> Result<(), MemoryError> {
        let context = self
            .mutate(id, |context| {
                let message = ChatMessage::assistant(text);
                context.push_message(message, self.config.max_messages_per_conversation);
            })
            .map(|(context, _)| context)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;

        self.persist(&context).await;
        Ok(())
    }

    /// Advances the page cursor and returns the page to show. `None` when the
    /// conversation does not exist.
    pub async fn next_page(&self, id: &str) -> Option<Page<InvestorProfile>> {
        self.get(id).await?;
        let (context, index) =
            self.mutate(id, |context| context.pagination.advance(context.investors.len()))?;
        self.persist(&context).await;
        Some(page(&context.investors, index, context.pagination.page_size))
    }

    /// The page currently under the cursor.
    pub async fn current_page(&self, id: &str) -> Option<Page<InvestorProfile>> {
        let context = self.get(id).await?;
        Some(page(
            &context.investors,
            context.pagination.current_page,
            context.pagination.page_size,
        ))
    }

    /// Removes the context from memory and storage. Returns whether it existed
    /// in either.
    pub async fn delete(&self, id: &str) -> bool {
        let in_memory = self.contexts.remove(id).is_some();
        let on_disk = match &self.store {
            Some(store) => match store.delete(id).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!("Failed to delete stored conversation {}: {}", id, e);
                    false
                }
            },
            None => false,
        };
        if in_memory || on_disk {
            info!("Deleted conversation {}", id);
        }
        in_memory || on_disk
    }

    /// Summaries of live and stored conversations, most recently updated first.
    pub async fn list(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<ConversationSummary> =
            self.contexts.iter().map(|entry| entry.value().summary()).collect();

        if let Some(store) = &self.store {
            match store.list_ids().await {
                Ok(ids) => {
                    for id in ids {
                        if self.contexts.contains_key(&id) {
                            continue;
                        }
                        match store.load(&id).await {
                            Ok(Some(context)) => summaries.push(context.summary()),
                            Ok(None) => {}
                            Err(e) => warn!("Skipping unreadable conversation {}: {}", id, e),
                        }
                    }
                }
                Err(e) => warn!("Failed to list stored conversations: {}", e),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// TTL then ceiling eviction. Returns the number removed from memory;
    /// stored copies are kept.
    pub fn evict(&self) -> usize {
        self.evict_at(Utc::now(), self.config.max_conversations)
    }

    fn evict_at(&self, now: DateTime<Utc>, ceiling: usize) -> usize {
        let hours = self.config.ttl_hours.clamp(0, MAX_TTL_HOURS);
        let ttl = Duration::try_hours(hours).unwrap_or_else(Duration::zero);
        let before = self.contexts.len();
        self.contexts.retain(|_, context| !context.is_idle(now, ttl));
        let expired = before - self.contexts.len();

        let mut overflow = 0;
        if self.contexts.len() > ceiling {
            let mut by_age: Vec<(DateTime<Utc>, String)> = self
                .contexts
                .iter()
                .map(|entry| (entry.value().updated_at, entry.key().clone()))
                .collect();
            by_age.sort();

            let excess = self.contexts.len() - ceiling;
            for (_, id) in by_age.into_iter().take(excess) {
                if self.contexts.remove(&id).is_some() {
                    overflow += 1;
                }
            }
        }

        if expired + overflow > 0 {
            info!("Evicted {} expired and {} overflow conversations", expired, overflow);
        }
        expired + overflow
    }

    fn insert_with_eviction(&self, context: ConversationContext) {
        if !self.contexts.contains_key(&context.conversation_id)
            && self.contexts.len() >= self.config.max_conversations
        {
            self.evict_at(Utc::now(), self.config.max_conversations.saturating_sub(1));
        }
        self.contexts.insert(context.conversation_id.clone(), context);
    }

    /// Applies `f` under the entry lock and returns a copy of the result.
    fn mutate<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ConversationContext) -> R,
    ) -> Option<(ConversationContext, R)> {
        let mut entry = self.contexts.get_mut(id)?;
        let out = f(entry.value_mut());
        entry.value_mut().touch();
        Some((entry.value().clone(), out))
    }

    async fn persist(&self, context: &ConversationContext) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(context).await {
            warn!("Failed to persist conversation {}: {}", context.conversation_id, e);
        }
    }
}
