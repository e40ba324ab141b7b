//! Per-turn orchestration: classify the message, page through or search for
//! investors, merge into conversation memory, ask the model for a reply.

use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::LlmConfig;
use crate::models::{ChatRequest, ChatResponse, InvestorProfile, PaginationInfo};
use crate::providers::{LlmContext, LlmProvider, ProviderRegistry, RegistryError};
use crate::services::conversation::{
    self, ContextSnapshot, ConversationContext, ConversationMemory, Page, TurnUpdate,
};
use crate::services::event_bus::{EventBus, InvestorEvent};
use crate::services::intent::{MessageClassifier, MessageIntent};
use crate::services::investor_service::{Discovery, InvestorService};
use crate::utils::KeyedLock;

/// Search results returned with each response.
const RESPONSE_RESULTS: usize = 10;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    ProviderUnavailable(#[from] RegistryError),

    #[error("{0}")]
    NotFound(String),
}

/// Incremental records of a streamed chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Start {
        conversation_id: String,
    },
    Status {
        message: String,
    },
    InvestorsFound {
        count: usize,
        showing: usize,
        has_more: bool,
        remaining: usize,
        investors: Vec<InvestorProfile>,
    },
    PaginationInfo {
        current_page: usize,
        showing: usize,
        total: usize,
        has_more: bool,
        remaining: usize,
    },
    ContentStart,
    Content {
        text: String,
    },
    Done(ChatResponse),
    Error {
        error: String,
    },
}

impl ChatStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatStreamEvent::Start { .. } => "start",
            ChatStreamEvent::Status { .. } => "status",
            ChatStreamEvent::InvestorsFound { .. } => "investors_found",
            ChatStreamEvent::PaginationInfo { .. } => "pagination_info",
            ChatStreamEvent::ContentStart => "content_start",
            ChatStreamEvent::Content { .. } => "content",
            ChatStreamEvent::Done(_) => "done",
            ChatStreamEvent::Error { .. } => "error",
        }
    }
}

/// Everything a turn has settled before the reply is generated.
struct TurnState {
    snapshot: ContextSnapshot,
    page: Page<InvestorProfile>,
    new_investors: usize,
    search_failed: bool,
}

pub struct ChatService {
    registry: Arc<ProviderRegistry>,
    memory: ConversationMemory,
    investors: Arc<InvestorService>,
    events: Arc<EventBus>,
    llm_config: LlmConfig,
    locks: KeyedLock,
}

impl ChatService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        memory: ConversationMemory,
        investors: Arc<InvestorService>,
        events: Arc<EventBus>,
        llm_config: LlmConfig,
    ) -> Self {
        Self {
            registry,
            memory,
            investors,
            events,
            llm_config,
            locks: KeyedLock::new(),
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn locks(&self) -> &KeyedLock {
        &self.locks
    }

    pub fn default_provider(&self) -> &str {
        &self.llm_config.default_provider
    }

    pub async fn conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationContext, ChatError> {
        self.memory
            .get(conversation_id)
            .await
            .ok_or_else(|| {
                ChatError::NotFound(format!("Conversation {} not found", conversation_id))
            })
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        let _turn = self.locks.lock(conversation_id).await;
        if self.memory.delete(conversation_id).await {
            Ok(())
        } else {
            Err(ChatError::NotFound(format!("Conversation {} not found", conversation_id)))
        }
    }

    pub async fn process_message(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let started = Instant::now();
        let message = request.validated_message().map_err(ChatError::Validation)?;
        let conversation_id = conversation_id_for(&request);

        let _turn = self.locks.lock(&conversation_id).await;
        info!("Chat turn for {} ({} chars)", conversation_id, message.chars().count());
        self.events.publish(
            Some(&conversation_id),
            InvestorEvent::MessageReceived { message: message.clone() },
        );

        let intent = MessageClassifier::classify(&message);
        let provider_name = self.provider_name(&request);

        if intent == MessageIntent::Pagination {
            let (state, reply) = self.paginate(&conversation_id, &message).await;
            self.record_reply(&conversation_id, &reply).await;
            return Ok(self.finish(&conversation_id, reply, &state, &provider_name, started));
        }

        let llm = match self.resolve_llm(&provider_name).await {
            Ok(llm) => llm,
            Err(e) => {
                error!("Failed to get LLM provider '{}': {}", provider_name, e);
                self.memory.merge_turn(&conversation_id, user_only(&message)).await;
                return Err(e.into());
            }
        };

        let state = self.prepare(&conversation_id, &message, intent).await;
        let context = llm_context(&state);

        let reply = match llm.generate_response(&state.snapshot.messages, &context).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("LLM generation failed: {}", e);
                apology(&e)
            }
        };
        self.record_reply(&conversation_id, &reply).await;

        Ok(self.finish(&conversation_id, reply, &state, &provider_name, started))
    }

    /// Streaming variant of [`process_message`](Self::process_message).
    /// Validation happens before the stream starts; later failures arrive as
    /// `error` events.
    pub fn process_message_stream(
        self: Arc<Self>,
        request: ChatRequest,
    ) -> Result<impl Stream<Item = ChatStreamEvent> + Send + 'static, ChatError> {
        let message = request.validated_message().map_err(ChatError::Validation)?;
        let conversation_id = conversation_id_for(&request);
        let provider_name = self.provider_name(&request);
        let service = self;

        Ok(async_stream::stream! {
            let started = Instant::now();
            yield ChatStreamEvent::Start { conversation_id: conversation_id.clone() };

            let _turn = service.locks.lock(&conversation_id).await;
            service.events.publish(
                Some(&conversation_id),
                InvestorEvent::MessageReceived { message: message.clone() },
            );

            let intent = MessageClassifier::classify(&message);

            if intent == MessageIntent::Pagination {
                let (state, reply) = service.paginate(&conversation_id, &message).await;
                if state.page.items.is_empty() {
                    yield ChatStreamEvent::Status {
                        message: "All investors have been shown.".to_string(),
                    };
                } else {
                    let start = state.page.page_index * state.page.page_size + 1;
                    let end = start + state.page.items.len() - 1;
                    yield ChatStreamEvent::Status {
                        message: format!(
                            "Showing investors {}-{} of {}",
                            start, end, state.page.total
                        ),
                    };
                    yield ChatStreamEvent::PaginationInfo {
                        current_page: state.page.page_index,
                        showing: state.page.items.len(),
                        total: state.page.total,
                        has_more: state.page.has_more,
                        remaining: state.page.remaining(),
                    };
                }
                yield ChatStreamEvent::ContentStart;
                yield ChatStreamEvent::Content { text: reply.clone() };
                service.record_reply(&conversation_id, &reply).await;
                let done = service.finish(&conversation_id, reply, &state, &provider_name, started);
                yield ChatStreamEvent::Done(done);
                return;
            }

            let llm = match service.resolve_llm(&provider_name).await {
                Ok(llm) => llm,
                Err(e) => {
                    error!("Failed to get LLM provider '{}': {}", provider_name, e);
                    service.memory.merge_turn(&conversation_id, user_only(&message)).await;
                    yield ChatStreamEvent::Error { error: e.to_string() };
                    return;
                }
            };

            if intent == MessageIntent::Search {
                let sectors = MessageClassifier::extract_sectors(&message);
                yield ChatStreamEvent::Status {
                    message: format!("Searching for investors in {}...", sectors.join(", ")),
                };
            }

            let state = service.prepare(&conversation_id, &message, intent).await;
            if state.search_failed {
                yield ChatStreamEvent::Status {
                    message: "Investor search is unavailable right now, \
                              answering from what we already have."
                        .to_string(),
                };
            }
            if state.new_investors > 0 {
                yield ChatStreamEvent::InvestorsFound {
                    count: state.new_investors,
                    showing: state.page.items.len(),
                    has_more: state.page.has_more,
                    remaining: state.page.remaining(),
                    investors: state.page.items.clone(),
                };
            }

            let context = llm_context(&state);
            yield ChatStreamEvent::ContentStart;

            let mut full_response = String::new();
            let mut failure = None;
            match llm.generate_stream(&state.snapshot.messages, &context).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(text) => {
                                full_response.push_str(&text);
                                yield ChatStreamEvent::Content { text };
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e),
            }

            if let Some(e) = failure {
                error!("LLM streaming failed: {}", e);
                let reply = apology(&e);
                service.record_reply(&conversation_id, &reply).await;
                yield ChatStreamEvent::Error { error: reply };
                return;
            }

            service.record_reply(&conversation_id, &full_response).await;
            let done =
                service.finish(&conversation_id, full_response, &state, &provider_name, started);
            yield ChatStreamEvent::Done(done);
        })
    }

    fn provider_name(&self, request: &ChatRequest) -> String {
        request
            .model_provider
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.llm_config.default_provider.as_str())
            .to_lowercase()
    }

    async fn resolve_llm(&self, name: &str) -> Result<Arc<dyn LlmProvider>, RegistryError> {
        let config = self.llm_config.provider(name).unwrap_or_default();
        self.registry.llm(name, &config, true).await
    }

    /// Records the user message and walks the page cursor forward. The reply
    /// is rendered from memory without calling any provider.
    async fn paginate(&self, conversation_id: &str, message: &str) -> (TurnState, String) {
        let outcome = self.memory.merge_turn(conversation_id, user_only(message)).await;
        let page = match self.memory.next_page(conversation_id).await {
            Some(page) => page,
            None => conversation::page(&outcome.snapshot.investors, 0, self.memory.page_size()),
        };
        debug!(
            "Pagination turn for {}: page {} ({} items)",
            conversation_id,
            page.page_index,
            page.items.len()
        );

        let reply = render_page(&page);
        let state = TurnState {
            snapshot: outcome.snapshot,
            page,
            new_investors: 0,
            search_failed: false,
        };
        (state, reply)
    }

    /// Optional search, then merge into memory. A failed search degrades to
    /// no new investors.
    async fn prepare(
        &self,
        conversation_id: &str,
        message: &str,
        intent: MessageIntent,
    ) -> TurnState {
        let mut update = user_only(message);
        let mut search_failed = false;

        if intent == MessageIntent::Search {
            let sectors = MessageClassifier::extract_sectors(message);
            let limit = self.investors.default_limit();
            match self
                .investors
                .find_investors(&sectors, None, limit, true, Some(conversation_id))
                .await
            {
                Ok(Discovery { investors, search_results, .. }) => {
                    info!("Found {} investors for sectors {:?}", investors.len(), sectors);
                    update.investors = investors;
                    update.search_results = search_results;
                }
                Err(e) => {
                    warn!("Investor search failed, continuing without new investors: {}", e);
                    search_failed = true;
                }
            }
            update.sectors = sectors;
        }

        let outcome = self.memory.merge_turn(conversation_id, update).await;
        let page = match self.memory.current_page(conversation_id).await {
            Some(page) => page,
            None => conversation::page(&outcome.snapshot.investors, 0, self.memory.page_size()),
        };

        TurnState {
            snapshot: outcome.snapshot,
            page,
            new_investors: outcome.new_investors,
            search_failed,
        }
    }

    async fn record_reply(&self, conversation_id: &str, reply: &str) {
        if let Err(e) = self.memory.record_assistant_reply(conversation_id, reply).await {
            warn!("Assistant reply not recorded: {}", e);
        }
    }

    fn finish(
        &self,
        conversation_id: &str,
        reply: String,
        state: &TurnState,
        provider_name: &str,
        started: Instant,
    ) -> ChatResponse {
        let processing_time_ms = started.elapsed().as_millis() as u64;
        let snapshot = &state.snapshot;

        self.events.publish(
            Some(conversation_id),
            InvestorEvent::ResponseGenerated {
                processing_time_ms,
                investors_in_memory: snapshot.investors.len(),
            },
        );

        let results = &snapshot.search_results;
        ChatResponse {
            message: reply,
            investors: snapshot.investors.clone(),
            search_results: results[results.len().saturating_sub(RESPONSE_RESULTS)..].to_vec(),
            conversation_id: conversation_id.to_string(),
            sectors_discussed: snapshot.sectors.clone(),
            total_investors_found: snapshot.investors.len(),
            model_used: provider_name.to_string(),
            processing_time_ms,
            pagination: pagination_info(&state.page),
        }
    }
}

fn conversation_id_for(request: &ChatRequest) -> String {
    request
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn user_only(message: &str) -> TurnUpdate {
    TurnUpdate {
        user_message: message.to_string(),
        ..TurnUpdate::default()
    }
}

fn apology(err: &impl std::fmt::Display) -> String {
    format!("Sorry, an error occurred while generating a response: {}", err)
}

/// Prompt context for a generated reply. The page under the cursor is flagged
/// as a continuation once the user has paged past the first one.
fn llm_context(state: &TurnState) -> LlmContext {
    let snapshot = &state.snapshot;
    LlmContext {
        conversation_id: snapshot.conversation_id.clone(),
        sectors: snapshot.sectors.clone(),
        investors: state.page.items.clone(),
        total_investors: snapshot.investors.len(),
        current_page: state.page.page_index,
        page_size: state.page.page_size,
        is_pagination: state.page.page_index > 0,
        search_results: snapshot.search_results.clone(),
        summary: Some(snapshot.summary.clone()),
    }
}

fn pagination_info(page: &Page<InvestorProfile>) -> PaginationInfo {
    PaginationInfo {
        current_page: page.page_index,
        page_size: page.page_size,
        total_investors: page.total,
        has_more_investors: page.has_more,
        remaining: page.remaining(),
    }
}

/// Plain-text listing of one page of investors.
fn render_page(page: &Page<InvestorProfile>) -> String {
    if page.total == 0 {
        return "I haven't found any investors in this conversation yet. Tell me about your startup \
                and I'll search for investors that fit."
            .to_string();
    }
    if page.items.is_empty() {
        return format!(
            "That's everyone so far: all {} investors have been shown. \
             Ask me to search again to find new ones.",
            page.total
        );
    }

    let first = page.page_index * page.page_size + 1;
    let last = first + page.items.len() - 1;
    let mut out = format!("Here are investors {}-{} of {}:\n", first, last, page.total);

    for (offset, investor) in page.items.iter().enumerate() {
        let mut line = format!("\n{}. {}", first + offset, investor.name);
        match (&investor.title, &investor.company) {
            (Some(title), Some(company)) => line.push_str(&format!(", {} at {}", title, company)),
            (Some(title), None) => line.push_str(&format!(", {}", title)),
            (None, Some(company)) => line.push_str(&format!(" ({})", company)),
            (None, None) => {}
        }
        if let Some(location) = &investor.location {
            line.push_str(&format!(", {}", location));
        }
        if let Some(url) = &investor.linkedin_url {
            line.push_str(&format!("\n   {}", url));
        }
        out.push_str(&line);
    }

    if page.has_more {
        out.push_str(&format!(
            "\n\n{} more investors available. Say \"more\" to see the next page.",
            page.remaining()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryConfig, ScraperConfig, SearchConfig};
    use crate::models::{MessageRole, SearchResult};
    use crate::providers::testing::{registry_with, FakeLlm, FakeScraper, FakeSearch};
    use std::time::Duration;

    struct Harness {
        service: Arc<ChatService>,
        llm: Arc<FakeLlm>,
        search: Arc<FakeSearch>,
    }

    fn linkedin_results(n: usize) -> Vec<SearchResult> {
        (0..n)
            .map(|i| {
                SearchResult::new(
                    format!("Investor {i} - Partner | LinkedIn"),
                    format!("https://www.linkedin.com/in/investor-{i}"),
                    "Seed investor.",
                )
            })
            .collect()
    }

    fn harness_with(llm: FakeLlm, search: FakeSearch) -> Harness {
        let llm = Arc::new(llm);
        let search = Arc::new(search);
        let registry = registry_with(llm.clone(), search.clone(), Arc::new(FakeScraper::default()));
        let events = Arc::new(EventBus::default());

        let search_config = SearchConfig {
            max_retries: 1,
            backoff_base_ms: 1,
            num_results: 30,
            ..SearchConfig::default()
        };
        let scraper_config = ScraperConfig { delay_ms: 0, ..ScraperConfig::default() };
        let investors = Arc::new(InvestorService::new(
            registry.clone(),
            search_config,
            scraper_config,
            events.clone(),
        ));
        let memory_config = MemoryConfig { persistence_enabled: false, ..MemoryConfig::default() };
        let memory = ConversationMemory::new(memory_config, 10, None);

        let service = ChatService::new(registry, memory, investors, events, LlmConfig::default());
        Harness { service: Arc::new(service), llm, search }
    }

    fn harness(results: usize) -> Harness {
        harness_with(
            FakeLlm::replying("Here is what I found."),
            FakeSearch::new(linkedin_results(results)),
        )
    }

    fn request(message: &str, conversation_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            model_provider: None,
        }
    }

    #[tokio::test]
    async fn test_search_turn_returns_investors_and_reply() {
        let h = harness(12);
        let response = h
            .service
            .process_message(request("Find seed investors for my AI startup", Some("c1")))
            .await
            .unwrap();

        assert_eq!(response.message, "Here is what I found.");
        assert_eq!(response.total_investors_found, 12);
        assert_eq!(response.investors.len(), 12);
        assert_eq!(response.search_results.len(), 10);
        assert_eq!(response.sectors_discussed, vec!["ai"]);
        assert_eq!(response.model_used, "gemini");
        assert_eq!(response.pagination.current_page, 0);
        assert!(response.pagination.has_more_investors);

        let context = h.llm.last_context().unwrap();
        assert_eq!(context.investors.len(), 10);
        assert_eq!(context.total_investors, 12);
        assert!(context.summary.is_some());

        let stored = h.service.memory().get("c1").await.unwrap();
        let roles: Vec<MessageRole> = stored.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[tokio::test]
    async fn test_follow_up_after_paging_marks_continuation() {
        let h = harness(25);
        h.service
            .process_message(request("Looking for fintech investors", Some("c1")))
            .await
            .unwrap();
        assert!(!h.llm.last_context().unwrap().is_pagination);

        h.service.process_message(request("show more", Some("c1"))).await.unwrap();
        h.service
            .process_message(request("Which of these focus on payments?", Some("c1")))
            .await
            .unwrap();

        let context = h.llm.last_context().unwrap();
        assert!(context.is_pagination);
        assert_eq!(context.current_page, 1);
        assert_eq!(context.investors[0].name, "Investor 10");
    }

    #[tokio::test]
    async fn test_pagination_turn_makes_no_provider_calls() {
        let h = harness(25);
        h.service
            .process_message(request("Looking for fintech investors", Some("c1")))
            .await
            .unwrap();
        let searches = h.search.calls();
        let generations = h.llm.generate_calls();

        let second = h.service.process_message(request("show more", Some("c1"))).await.unwrap();
        assert_eq!(second.pagination.current_page, 1);
        assert!(second.pagination.has_more_investors);
        assert!(second.message.contains("Here are investors 11-20 of 25"));
        assert!(second.message.contains("Investor 10"));

        let third = h.service.process_message(request("next", Some("c1"))).await.unwrap();
        assert_eq!(third.pagination.current_page, 2);
        assert!(!third.pagination.has_more_investors);
        assert!(third.message.contains("21-25 of 25"));

        let beyond = h.service.process_message(request("more", Some("c1"))).await.unwrap();
        assert!(beyond.message.contains("all 25 investors have been shown"));
        assert_eq!(beyond.total_investors_found, 25);

        assert_eq!(h.search.calls(), searches);
        assert_eq!(h.llm.generate_calls(), generations);
    }

    #[tokio::test]
    async fn test_failed_search_degrades_to_existing_investors() {
        let search = FakeSearch::new(linkedin_results(3)).failing_times(10);
        let h = harness_with(FakeLlm::replying("ok"), search);
        let response = h
            .service
            .process_message(request("find healthcare investors", Some("c1")))
            .await
            .unwrap();

        assert_eq!(response.message, "ok");
        assert_eq!(response.total_investors_found, 0);
        assert_eq!(response.sectors_discussed, vec!["healthcare"]);
        assert_eq!(h.search.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_generation_becomes_apology() {
        let h = harness_with(FakeLlm::replying("unused").failing(), FakeSearch::new(vec![]));
        let response = h.service.process_message(request("hello there", Some("c1"))).await.unwrap();

        assert!(response
            .message
            .starts_with("Sorry, an error occurred while generating a response:"));
        let stored = h.service.memory().get("c1").await.unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_after_recording_user_message() {
        let h = harness(3);
        let mut req = request("find AI investors", Some("c1"));
        req.model_provider = Some("mystery".to_string());

        let err = h.service.process_message(req).await.unwrap_err();
        match err {
            ChatError::ProviderUnavailable(RegistryError::NotFound { available, .. }) => {
                assert_eq!(available, vec!["gemini".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(h.search.calls(), 0);
        let stored = h.service.memory().get("c1").await.unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert!(stored.investors.is_empty());
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_work() {
        let h = harness(3);
        let err = h.service.process_message(request("   ", Some("c1"))).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert!(h.service.memory().is_empty());

        assert!(matches!(
            h.service.clone().process_message_stream(request("", None)),
            Err(ChatError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generated_conversation_id() {
        let h = harness(0);
        let response = h.service.process_message(request("hello", None)).await.unwrap();
        assert!(uuid::Uuid::parse_str(&response.conversation_id).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_conversation_are_serialized() {
        let h = harness_with(
            FakeLlm::replying("ok"),
            FakeSearch::new(linkedin_results(5)).with_delay(Duration::from_millis(30)),
        );
        let a = h.service.process_message(request("find AI investors", Some("c1")));
        let b = h.service.process_message(request("find fintech investors", Some("c1")));
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        let stored = h.service.memory().get("c1").await.unwrap();
        assert_eq!(stored.messages.len(), 4);
        let roles: Vec<MessageRole> = stored.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
        assert_eq!(stored.investors.len(), 5);
        assert_eq!(stored.sectors, vec!["ai", "fintech"]);
    }

    #[tokio::test]
    async fn test_stream_emits_events_in_order() {
        let h = harness_with(FakeLlm::replying("Two words"), FakeSearch::new(linkedin_results(3)));
        let events: Vec<ChatStreamEvent> = h
            .service
            .clone()
            .process_message_stream(request("find AI investors", Some("c1")))
            .unwrap()
            .collect()
            .await;

        let types: Vec<&str> = events.iter().map(ChatStreamEvent::event_type).collect();
        assert_eq!(
            types,
            vec![
                "start",
                "status",
                "investors_found",
                "content_start",
                "content",
                "content",
                "done"
            ]
        );

        let ChatStreamEvent::Done(done) = events.last().unwrap() else {
            panic!("last event should be done");
        };
        assert_eq!(done.message, "Two words");
        assert_eq!(done.total_investors_found, 3);

        let stored = h.service.memory().get("c1").await.unwrap();
        assert_eq!(stored.messages.last().unwrap().content, "Two words");
    }

    #[tokio::test]
    async fn test_stream_pagination_without_provider_calls() {
        let h = harness(15);
        h.service.process_message(request("find AI investors", Some("c1"))).await.unwrap();
        let generations = h.llm.generate_calls();

        let events: Vec<ChatStreamEvent> = h
            .service
            .clone()
            .process_message_stream(request("more investors please", Some("c1")))
            .unwrap()
            .collect()
            .await;

        let types: Vec<&str> = events.iter().map(ChatStreamEvent::event_type).collect();
        assert_eq!(
            types,
            vec!["start", "status", "pagination_info", "content_start", "content", "done"]
        );
        assert_eq!(h.llm.generate_calls(), generations);
    }

    #[tokio::test]
    async fn test_stream_reports_unknown_provider() {
        let h = harness(0);
        let mut req = request("hi", Some("c1"));
        req.model_provider = Some("nope".to_string());

        let events: Vec<ChatStreamEvent> =
            h.service.clone().process_message_stream(req).unwrap().collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type(), "error");
    }

    #[tokio::test]
    async fn test_conversation_lookup_and_delete() {
        let h = harness(0);
        h.service.process_message(request("hello", Some("c1"))).await.unwrap();

        assert_eq!(h.service.conversation("c1").await.unwrap().messages.len(), 2);
        h.service.delete_conversation("c1").await.unwrap();
        assert!(matches!(h.service.conversation("c1").await, Err(ChatError::NotFound(_))));
        assert!(matches!(h.service.delete_conversation("c1").await, Err(ChatError::NotFound(_))));
    }

    #[test]
    fn test_stream_event_wire_shape() {
        let json = serde_json::to_value(ChatStreamEvent::Content { text: "hi".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "content", "text": "hi"}));
    }

    #[test]
    fn test_render_empty_conversation() {
        let page = crate::services::conversation::page::<InvestorProfile>(&[], 0, 10);
        assert!(render_page(&page).starts_with("I haven't found any investors"));
    }
}
