//! Scripted providers for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::registry::ProviderFactory;
use super::{
    LlmContext, LlmProvider, ProviderError, ProviderRegistry, ScraperProvider, SearchProvider,
    TextStream,
};
use crate::models::{ChatMessage, InvestorProfile, SearchResult};

/// Registry wired to shared fakes under the built-in names `gemini`,
/// `google` and `linkedin`.
pub fn registry_with(
    llm: Arc<FakeLlm>,
    search: Arc<FakeSearch>,
    scraper: Arc<FakeScraper>,
) -> Arc<ProviderRegistry> {
    let registry = ProviderRegistry::new();
    registry.register(
        "gemini",
        ProviderFactory::llm(move |_| Ok(llm.clone() as Arc<dyn LlmProvider>)),
    );
    registry.register(
        "google",
        ProviderFactory::search(move || Ok(search.clone() as Arc<dyn SearchProvider>)),
    );
    registry.register(
        "linkedin",
        ProviderFactory::scraper(move || Ok(scraper.clone() as Arc<dyn ScraperProvider>)),
    );
    Arc::new(registry)
}

/// Local Custom Search lookalike. The first `fast_calls` requests answer
/// with ten LinkedIn hits; later ones stall for `stall` first. Returns the
/// endpoint URL and a request counter.
pub async fn search_backend(fast_calls: usize, stall: Duration) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = axum::Router::new().route(
        "/search",
        axum::routing::get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) >= fast_calls {
                    tokio::time::sleep(stall).await;
                }
                let items: Vec<serde_json::Value> = (0..10)
                    .map(|i| {
                        serde_json::json!({
                            "title": format!("Investor {i} - Partner | LinkedIn"),
                            "link": format!("https://www.linkedin.com/in/investor-{i}"),
                            "snippet": "Seed investor.",
                        })
                    })
                    .collect();
                axum::Json(serde_json::json!({ "items": items }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/search"), hits)
}

pub struct FakeLlm {
    reply: String,
    model: String,
    fail_generation: bool,
    fail_shutdown: bool,
    init_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    contexts: Mutex<Vec<LlmContext>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            model: "fake-model".to_string(),
            fail_generation: false,
            fail_shutdown: false,
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_generation = true;
        self
    }

    pub fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> Option<LlmContext> {
        self.contexts.lock().last().cloned()
    }

    fn record(&self, context: &LlmContext) -> Result<(), ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(context.clone());
        if self.fail_generation {
            return Err(ProviderError::request("fake", "model overloaded"));
        }
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_shutdown {
            return Err(ProviderError::request("fake", "socket already closed"));
        }
        Ok(())
    }

    async fn generate_response(
        &self,
        _messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<String, ProviderError> {
        self.record(context)?;
        Ok(self.reply.clone())
    }

    async fn generate_stream(
        &self,
        _messages: &[ChatMessage],
        context: &LlmContext,
    ) -> Result<TextStream, ProviderError> {
        self.record(context)?;
        let chunks: Vec<Result<String, ProviderError>> = self
            .reply
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

pub struct FakeSearch {
    results: Vec<SearchResult>,
    failures_left: AtomicUsize,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            failures_left: AtomicUsize::new(0),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the first `n` investor searches.
    pub fn failing_times(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake-search"
    }

    async fn search(
        &self,
        _query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        Ok(self.results.iter().take(num_results).cloned().collect())
    }

    async fn search_investors(
        &self,
        _sectors: &[String],
        _location: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ProviderError::request("fake-search", "quota exceeded"));
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn extract_emails(&self, url: &str) -> Result<Vec<String>, ProviderError> {
        if url.contains("contact") {
            Ok(vec!["partner@example-fund.com".to_string()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[derive(Default)]
pub struct FakeScraper {
    fail_for: Vec<String>,
    enrich_delay: Option<Duration>,
    enrich_calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    shutdown_calls: AtomicUsize,
}

impl FakeScraper {
    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            fail_for: names.iter().map(|n| n.to_lowercase()).collect(),
            ..Self::default()
        }
    }

    pub fn with_enrich_delay(mut self, delay: Duration) -> Self {
        self.enrich_delay = Some(delay);
        self
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScraperProvider for FakeScraper {
    fn name(&self) -> &str {
        "fake-scraper"
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("linkedin.com/in/")
    }

    async fn scrape_profile(&self, url: &str) -> Result<Option<InvestorProfile>, ProviderError> {
        let slug = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        Ok(Some(InvestorProfile::new(slug.replace('-', " ")).with_source("linkedin")))
    }

    fn profile_from_search_result(&self, result: &SearchResult) -> Option<InvestorProfile> {
        let name = result.title.split(" - ").next()?.trim();
        if name.is_empty() {
            return None;
        }
        let mut profile = InvestorProfile::new(name).with_source("linkedin");
        profile.linkedin_url = Some(result.url.clone());
        Some(profile)
    }

    async fn enrich_profile(
        &self,
        profile: &InvestorProfile,
    ) -> Result<InvestorProfile, ProviderError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.enrich_delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_for.contains(&profile.identity_key()) {
            return Err(ProviderError::request("fake-scraper", "profile unavailable"));
        }
        let mut enriched = profile.clone();
        enriched.bio = Some(format!("{} invests early.", profile.name));
        enriched.source = format!("{}_enriched", profile.source);
        Ok(enriched)
    }
}
