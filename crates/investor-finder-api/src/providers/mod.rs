//! Pluggable backends for the three capabilities the chat service consumes:
//! text generation, web search and profile scraping.
//!
//! Each capability is a trait object stored in the [`ProviderRegistry`] under a
//! lowercased name. Implementations are built lazily from registered factories.

pub mod error;
pub mod llm;
pub mod registry;
pub mod scraper;
pub mod search;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use futures::stream::Stream;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;

use crate::models::{ChatMessage, InvestorProfile, SearchResult};
use crate::services::conversation::ConversationSummary;

pub use error::{ProviderError, RegistryError};
pub use registry::ProviderRegistry;

/// Stream of generated text chunks.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Llm,
    Search,
    Scraper,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Llm => "llm",
            ProviderKind::Search => "search",
            ProviderKind::Scraper => "scraper",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an LLM provider may weave into its prompt besides the history.
#[derive(Debug, Clone, Default)]
pub struct LlmContext {
    pub conversation_id: String,
    pub sectors: Vec<String>,
    /// Investors on the current page only.
    pub investors: Vec<InvestorProfile>,
    pub total_investors: usize,
    pub current_page: usize,
    pub page_size: usize,
    /// The investor page continues an earlier listing.
    pub is_pagination: bool,
    pub search_results: Vec<SearchResult>,
    pub summary: Option<ConversationSummary>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Runs once before the first request made through the registry.
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<String, ProviderError>;

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<TextStream, ProviderError>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// A single raw query against the backend.
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    /// Investor-oriented search across the given sectors.
    async fn search_investors(
        &self,
        sectors: &[String],
        location: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>;

    async fn extract_emails(&self, _url: &str) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

#[async_trait]
pub trait ScraperProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn can_handle(&self, url: &str) -> bool;

    async fn scrape_profile(&self, url: &str) -> Result<Option<InvestorProfile>, ProviderError>;

    /// Builds a profile from search metadata alone, without fetching the page.
    fn profile_from_search_result(&self, _result: &SearchResult) -> Option<InvestorProfile> {
        None
    }

    async fn enrich_profile(
        &self,
        profile: &InvestorProfile,
    ) -> Result<InvestorProfile, ProviderError>;
}

/// Registers every bundled backend under its public name.
pub fn register_builtin(registry: &ProviderRegistry, settings: &crate::config::Settings) {
    use registry::ProviderFactory;
    use std::sync::Arc;

    registry.register(
        "openai",
        ProviderFactory::llm(|cfg| {
            let provider = llm::OpenAiProvider::new(cfg.clone())?;
            Ok(Arc::new(provider) as Arc<dyn LlmProvider>)
        }),
    );
    registry.register(
        "gemini",
        ProviderFactory::llm(|cfg| {
            let provider = llm::GeminiProvider::new(cfg.clone())?;
            Ok(Arc::new(provider) as Arc<dyn LlmProvider>)
        }),
    );
    let api_version = settings.llm.anthropic_version.clone();
    registry.register(
        "anthropic",
        ProviderFactory::llm(move |cfg| {
            let provider = llm::AnthropicProvider::new(cfg.clone(), api_version.clone())?;
            Ok(Arc::new(provider) as Arc<dyn LlmProvider>)
        }),
    );

    let search_config = settings.search.clone();
    registry.register(
        "google",
        ProviderFactory::search(move || {
            let provider = search::GoogleSearchProvider::new(&search_config)?;
            Ok(Arc::new(provider) as Arc<dyn SearchProvider>)
        }),
    );

    let scraper_config = settings.scraper.clone();
    registry.register(
        "linkedin",
        ProviderFactory::scraper(move || {
            let provider = scraper::LinkedInScraper::new(&scraper_config)?;
            Ok(Arc::new(provider) as Arc<dyn ScraperProvider>)
        }),
    );
}
