//! Investor discovery: search with retry, URL-based classification of hits
//! into profiles, bounded LinkedIn enrichment and result memoization.

use futures::future::join_all;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ScraperConfig, SearchConfig};
use crate::models::{InvestorProfile, SearchResult};
use crate::providers::{
    ProviderError, ProviderRegistry, RegistryError, ScraperProvider, SearchProvider,
};
use crate::services::event_bus::{EventBus, InvestorEvent};
use crate::services::search_cache::{CacheKey, CachedSearch, SearchCache};
use crate::utils::text::{clip, contains_keyword};
use crate::utils::Limiters;

const MAX_NAME_CHARS: usize = 100;
const MAX_BIO_CHARS: usize = 500;

/// Words that mark a title segment as an organization rather than a person.
const COMPANY_WORDS: &[&str] = &["inc", "ltd", "llc", "capital", "ventures", "fund"];

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Investor search failed after {attempts} attempts: {last}")]
    SearchFailed { attempts: u32, last: ProviderError },
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
    pub cached: bool,
}

pub struct InvestorService {
    registry: Arc<ProviderRegistry>,
    search_config: SearchConfig,
    scraper_config: ScraperConfig,
    limiters: Limiters,
    cache: SearchCache,
    events: Arc<EventBus>,
}

impl InvestorService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        search_config: SearchConfig,
        scraper_config: ScraperConfig,
        events: Arc<EventBus>,
    ) -> Self {
        let cache = SearchCache::new(search_config.cache_ttl_minutes, search_config.cache_capacity);
        let limiters = Limiters::new(&scraper_config);
        Self {
            registry,
            search_config,
            scraper_config,
            limiters,
            cache,
            events,
        }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn default_limit(&self) -> usize {
        self.search_config.num_results
    }

    /// Finds investors for `sectors` near `location` (default location when
    /// absent). Fails only when the search provider cannot be resolved or
    /// every attempt failed; callers in a chat turn degrade on error.
    pub async fn find_investors(
        &self,
        sectors: &[String],
        location: Option<&str>,
        limit: usize,
        enrich: bool,
        conversation_id: Option<&str>,
    ) -> Result<Discovery, DiscoveryError> {
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.search_config.default_location.as_str())
            .to_string();

        let key = CacheKey::new(sectors, &location, limit);
        if let Some(hit) = self.cache.get(&key) {
            info!("Serving {} cached investors for {:?}", hit.investors.len(), sectors);
            self.events.publish(
                conversation_id,
                InvestorEvent::SearchCompleted {
                    investors: hit.investors.len(),
                    search_results: hit.search_results.len(),
                    cached: true,
                },
            );
            return Ok(Discovery {
                investors: hit.investors,
                search_results: hit.search_results,
                cached: true,
            });
        }

        self.events.publish(
            conversation_id,
            InvestorEvent::SearchStarted { sectors: sectors.to_vec(), location: location.clone() },
        );

        let search = match self.registry.search(&self.search_config.provider, true).await {
            Ok(provider) => provider,
            Err(e) => {
                self.events.publish(
                    conversation_id,
                    InvestorEvent::SearchFailed { error: e.to_string() },
                );
                return Err(e.into());
            }
        };

        let attempt = self.search_with_retry(search.as_ref(), sectors, &location, limit).await;
        let search_results = match attempt {
            Ok(results) => results,
            Err(e) => {
                warn!("Investor search failed: {}", e);
                self.events.publish(
                    conversation_id,
                    InvestorEvent::SearchFailed { error: e.to_string() },
                );
                return Err(e);
            }
        };

        let scraper = match self.registry.scraper(&self.scraper_config.provider, true).await {
            Ok(scraper) => Some(scraper),
            Err(e) => {
                warn!("Scraper unavailable, continuing without it: {}", e);
                None
            }
        };

        let mut investors = self
            .profiles_from_results(&search_results, search.as_ref(), scraper.as_deref())
            .await;
        info!(
            "Found {} investors from {} search results",
            investors.len(),
            search_results.len()
        );

        if enrich && self.scraper_config.enabled {
            if let Some(scraper) = scraper {
                let (enriched, attempted, succeeded) =
                    self.enrich_profiles(scraper, investors).await;
                investors = enriched;
                self.events.publish(
                    conversation_id,
                    InvestorEvent::EnrichmentCompleted { attempted, enriched: succeeded },
                );
            }
        }

        self.events.publish(
            conversation_id,
            InvestorEvent::SearchCompleted {
                investors: investors.len(),
                search_results: search_results.len(),
                cached: false,
            },
        );

        self.cache.put(
            key,
            CachedSearch { investors: investors.clone(), search_results: search_results.clone() },
        );

        Ok(Discovery { investors, search_results, cached: false })
    }

    /// Bounded retries with a per-attempt timeout and jittered exponential
    /// backoff between attempts.
    async fn search_with_retry(
        &self,
        provider: &dyn SearchProvider,
        sectors: &[String],
        location: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, DiscoveryError> {
        let attempts = self.search_config.max_attempts();
        let attempt_timeout = self.search_config.attempt_timeout();
        let mut last = ProviderError::NotInitialized { provider: provider.name().to_string() };

        for attempt in 1..=attempts {
            let search = provider.search_investors(sectors, location, limit);
            match tokio::time::timeout(attempt_timeout, search).await {
                Ok(Ok(results)) => {
                    debug!("Search attempt {} returned {} results", attempt, results.len());
                    return Ok(results);
                }
                Ok(Err(e)) => {
                    warn!("Search attempt {}/{} failed: {}", attempt, attempts, e);
                    last = e;
                }
                Err(_) => {
                    warn!("Search attempt {}/{} timed out", attempt, attempts);
                    last = ProviderError::Timeout {
                        provider: provider.name().to_string(),
                        seconds: attempt_timeout.as_secs(),
                    };
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        Err(DiscoveryError::SearchFailed { attempts, last })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.search_config.backoff_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16)));
        let jitter = if base == 0 { 0 } else { rand::rng().random_range(0..=base / 4) };
        Duration::from_millis(exp + jitter)
    }

    async fn profiles_from_results(
        &self,
        results: &[SearchResult],
        search: &dyn SearchProvider,
        scraper: Option<&dyn ScraperProvider>,
    ) -> Vec<InvestorProfile> {
        let mut seen = HashSet::new();
        let mut investors = Vec::new();

        for result in results {
            let Some(profile) = self.classify(result, search, scraper).await else {
                continue;
            };
            if seen.insert(profile.identity_key()) {
                investors.push(profile);
            }
        }
        investors
    }

    async fn classify(
        &self,
        result: &SearchResult,
        search: &dyn SearchProvider,
        scraper: Option<&dyn ScraperProvider>,
    ) -> Option<InvestorProfile> {
        let url = result.url.as_str();

        if url.contains("linkedin.com/in/") {
            let scraper = scraper?;
            if let Some(profile) = scraper.profile_from_search_result(result) {
                return named(profile);
            }
            return match scraper.scrape_profile(url).await {
                Ok(profile) => profile.and_then(named),
                Err(e) => {
                    warn!("Profile scrape failed for {}: {}", url, e);
                    None
                }
            };
        }

        if url.contains("linkedin.com/company/") {
            let company = first_segment(&result.title, " | ");
            let mut profile =
                InvestorProfile::new(clip(company, MAX_NAME_CHARS)).with_source("linkedin_company");
            profile.company = Some(company.to_string());
            profile.linkedin_url = Some(result.url.clone());
            profile.bio = bio_from(&result.snippet);
            return named(profile);
        }

        if url.contains("crunchbase.com/person") {
            let name = first_segment(&result.title, " - ").replace(" | Crunchbase", "");
            let mut profile =
                InvestorProfile::new(clip(name.trim(), MAX_NAME_CHARS)).with_source("crunchbase");
            profile.bio = bio_from(&result.snippet);
            return named(profile);
        }

        if url.contains("angel.co") || url.contains("wellfound.com") {
            let name = first_segment(&result.title, " - ")
                .replace(" | AngelList", "")
                .replace(" | Wellfound", "");
            let mut profile =
                InvestorProfile::new(clip(name.trim(), MAX_NAME_CHARS)).with_source("angellist");
            profile.bio = bio_from(&result.snippet);
            return named(profile);
        }

        let (name, company) = person_from_title(&result.title)?;
        let mut profile = InvestorProfile::new(name);
        profile.company = company;
        profile.bio = bio_from(&result.snippet);
        if self.search_config.extract_emails {
            match search.extract_emails(url).await {
                Ok(emails) => profile.email = emails.into_iter().next(),
                Err(e) => debug!("Email extraction failed for {}: {}", url, e),
            }
        }
        Some(profile)
    }

    /// Enriches up to `max_enrich` LinkedIn profiles concurrently under the
    /// scrape limiter. Output order matches input order; failures keep the
    /// original profile. Returns (profiles, attempted, enriched).
    async fn enrich_profiles(
        &self,
        scraper: Arc<dyn ScraperProvider>,
        investors: Vec<InvestorProfile>,
    ) -> (Vec<InvestorProfile>, usize, usize) {
        let mut budget = self.scraper_config.max_enrich;
        let timeout = self.scraper_config.timeout();

        let tasks = investors.into_iter().map(|investor| {
            let eligible = budget > 0 && investor.linkedin_url.is_some();
            if eligible {
                budget -= 1;
            }
            let scraper = scraper.clone();
            let limiters = self.limiters.clone();

            async move {
                if !eligible {
                    return (investor, false, false);
                }

                let slot = Limiters::acquire_timed(
                    limiters.scrape.clone(),
                    limiters.acquire_timeout,
                    "scrape",
                )
                .await;
                let _permit = match slot {
                    Ok((permit, waited)) => {
                        debug!("Scrape slot for {} after {:?}", investor.name, waited);
                        permit
                    }
                    Err(e) => {
                        warn!("Skipping enrichment of {}: {}", investor.name, e);
                        return (investor, true, false);
                    }
                };

                if !limiters.scrape_delay.is_zero() {
                    tokio::time::sleep(limiters.scrape_delay).await;
                }

                match tokio::time::timeout(timeout, scraper.enrich_profile(&investor)).await {
                    Ok(Ok(enriched)) => (enriched, true, true),
                    Ok(Err(e)) => {
                        warn!("Failed to enrich {}: {}", investor.name, e);
                        (investor, true, false)
                    }
                    Err(_) => {
                        warn!("Enrichment of {} timed out after {:?}", investor.name, timeout);
                        (investor, true, false)
                    }
                }
            }
        });
        let tasks: Vec<_> = tasks.collect();

        let outcomes = join_all(tasks).await;
        let attempted = outcomes.iter().filter(|(_, tried, _)| *tried).count();
        let enriched = outcomes.iter().filter(|(_, _, ok)| *ok).count();
        info!("Enriched {}/{} investor profiles", enriched, attempted);

        (outcomes.into_iter().map(|(profile, _, _)| profile).collect(), attempted, enriched)
    }
}

fn named(profile: InvestorProfile) -> Option<InvestorProfile> {
    if profile.name.trim().is_empty() {
        None
    } else {
        Some(profile)
    }
}

fn first_segment<'a>(title: &'a str, separator: &str) -> &'a str {
    title.split(separator).next().unwrap_or(title).trim()
}

fn bio_from(snippet: &str) -> Option<String> {
    let snippet = snippet.trim();
    if snippet.is_empty() {
        None
    } else {
        Some(clip(snippet, MAX_BIO_CHARS))
    }
}

/// "Jane Doe - Acme Ventures" style titles. The first segment counts as a
/// person when it has at most four words and no company marker.
fn person_from_title(title: &str) -> Option<(String, Option<String>)> {
    let mut parts = title.split(" - ");
    let candidate = parts.next()?.trim();
    let company = parts.next()?.trim();

    let lowered = candidate.to_lowercase();
    if candidate.is_empty()
        || candidate.split_whitespace().count() > 4
        || COMPANY_WORDS.iter().any(|w| contains_keyword(&lowered, w))
    {
        return None;
    }

    let company = (!company.is_empty()).then(|| clip(company, MAX_NAME_CHARS));
    Some((clip(candidate, MAX_NAME_CHARS), company))
}
