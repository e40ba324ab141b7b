use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::models::SearchResult;
use crate::providers::{ProviderError, SearchProvider};

const PROVIDER: &str = "google";
const MAX_PER_REQUEST: usize = 10;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

#[derive(Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search JSON API backend.
pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    engine_id: String,
    base_url: String,
    timeout_seconds: u64,
}

impl GoogleSearchProvider {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        if config.google_api_key.trim().is_empty()
            || config.google_search_engine_id.trim().is_empty()
        {
            return Err(ProviderError::configuration(
                PROVIDER,
                "google_api_key and google_search_engine_id are required",
            ));
        }
        let client = Client::builder()
            .timeout(config.query_timeout())
            .build()
            .map_err(|e| ProviderError::configuration(PROVIDER, e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.google_api_key.clone(),
            engine_id: config.google_search_engine_id.clone(),
            base_url: config.base_url.clone(),
            timeout_seconds: config.query_timeout().as_secs(),
        })
    }

    fn request_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: PROVIDER.to_string(),
                seconds: self.timeout_seconds,
            }
        } else {
            ProviderError::request(PROVIDER, e)
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(PROVIDER, response).await);
        }
        response.text().await.map_err(|e| ProviderError::parse(PROVIDER, e))
    }
}

/// Query fan-out for one investor search, most targeted first.
pub fn investor_queries(sectors: &[String], location: &str) -> Vec<String> {
    let sector = sectors.join(" OR ");
    let loc = if location.trim().is_empty() {
        String::new()
    } else {
        format!("\"{}\"", location.trim())
    };

    vec![
        format!("site:linkedin.com/in/ investor {sector} partner Silicon Valley OR \"San Francisco\" OR \"New York\""),
        format!("site:linkedin.com/in/ \"venture capital\" {sector} {loc}"),
        format!("site:linkedin.com/in/ \"managing partner\" OR \"general partner\" VC {sector} {loc}"),
        format!("site:linkedin.com/in/ \"angel investor\" {sector} {loc}"),
        format!("site:linkedin.com/in/ \"investment director\" OR \"principal\" venture {sector} {loc}"),
        format!("site:linkedin.com/in/ VC partner {sector} \"Menlo Park\" OR \"Palo Alto\" OR \"Boston\""),
        format!("site:linkedin.com/in/ seed investor {sector} \"Los Angeles\" OR \"Austin\" OR \"Seattle\""),
        format!("\"partner\" \"venture capital\" {sector} investor portfolio {loc}"),
        format!("VC fund {sector} \"managing director\" OR \"partner\" {loc}"),
        format!("site:crunchbase.com/person investor {sector} {loc}"),
        format!("site:angel.co investor {sector} {loc}"),
    ]
    .into_iter()
    .map(|q| q.trim().to_string())
    .collect()
}

/// LinkedIn posts and articles are never investor profiles.
pub fn is_profile_candidate(url: &str) -> bool {
    !url.contains("/posts/") && !url.contains("/pulse/")
}

pub fn extract_emails_from_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|email| {
            let lower = email.to_lowercase();
            ![".png", ".jpg", ".gif", ".css", ".js"].iter().any(|ext| lower.ends_with(ext))
                && !lower.contains("example")
                && !lower.contains("test")
        })
        .filter(|email| seen.insert(email.to_lowercase()))
        .collect()
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let num = num_results.clamp(1, MAX_PER_REQUEST).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(PROVIDER, response).await);
        }

        let body: CustomSearchResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                ProviderError::parse(PROVIDER, e)
            }
        })?;

        let results: Vec<SearchResult> = body
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| SearchResult::new(item.title, item.link, item.snippet))
            .collect();

        debug!("Google search returned {} results for: {:.50}", results.len(), query);
        Ok(results)
    }

    async fn search_investors(
        &self,
        sectors: &[String],
        location: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let queries = investor_queries(sectors, location);
        let mut results = Vec::new();
        let mut seen_urls = HashSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for query in &queries {
            match self.search(query, MAX_PER_REQUEST).await {
                Ok(batch) => {
                    succeeded += 1;
                    for result in batch {
                        if is_profile_candidate(&result.url)
                            && seen_urls.insert(result.url.clone())
                        {
                            results.push(result);
                        }
                    }
                }
                Err(e @ ProviderError::Timeout { .. }) => {
                    // Stop the fan-out; results gathered so far are kept.
                    warn!(
                        "Search query timed out, keeping {} results: {:.50}...",
                        results.len(),
                        query
                    );
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    warn!("Search query failed: {:.50}... - {}", query, e);
                    last_error = Some(e);
                }
            }

            if results.len() >= limit {
                break;
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        results.truncate(limit);
        info!("Investor search found {} unique results for sectors {:?}", results.len(), sectors);
        Ok(results)
    }

    async fn extract_emails(&self, url: &str) -> Result<Vec<String>, ProviderError> {
        let page = self.fetch_page(url).await?;
        Ok(extract_emails_from_text(&page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::search_backend;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn config_for(base_url: String) -> SearchConfig {
        SearchConfig {
            google_api_key: "key".to_string(),
            google_search_engine_id: "cx".to_string(),
            base_url,
            timeout_seconds: 1,
            ..SearchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_stalled_query_keeps_earlier_results() {
        let (url, hits) = search_backend(1, Duration::from_secs(3)).await;
        let provider = GoogleSearchProvider::new(&config_for(url)).unwrap();

        let results = provider
            .search_investors(&["ai".to_string()], "United States", 30)
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stalled_first_query_is_a_timeout() {
        let (url, hits) = search_backend(0, Duration::from_secs(3)).await;
        let provider = GoogleSearchProvider::new(&config_for(url)).unwrap();

        let err = provider
            .search_investors(&["ai".to_string()], "United States", 30)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout { seconds: 1, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = GoogleSearchProvider::new(&SearchConfig::default()).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_queries_cover_profile_sources() {
        let queries = investor_queries(&["ai".to_string(), "fintech".to_string()], "New York");
        assert_eq!(queries.len(), 11);
        assert!(queries[1].contains("ai OR fintech"));
        assert!(queries[1].ends_with("\"New York\""));
        assert!(queries.iter().any(|q| q.starts_with("site:crunchbase.com/person")));
        assert!(queries.iter().any(|q| q.starts_with("site:angel.co")));
    }

    #[test]
    fn test_posts_and_articles_filtered() {
        assert!(is_profile_candidate("https://www.linkedin.com/in/jane-doe"));
        assert!(!is_profile_candidate("https://www.linkedin.com/posts/jane-doe_abc"));
        assert!(!is_profile_candidate("https://www.linkedin.com/pulse/why-ai"));
    }

    #[test]
    fn test_email_extraction_filters_noise() {
        let html = "Reach jane@acmevc.com or JANE@acmevc.com. logo@2x.png \
                    demo@example.com qa@test.io partners@acme-capital.co";
        assert_eq!(
            extract_emails_from_text(html),
            vec!["jane@acmevc.com".to_string(), "partners@acme-capital.co".to_string()]
        );
    }
}
