use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An investor candidate assembled from search results and scraped pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub investment_focus: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_source() -> String {
    "web_search".to_string()
}

impl InvestorProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            title: None,
            company: None,
            linkedin_url: None,
            email: None,
            location: None,
            bio: None,
            investment_focus: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            source: default_source(),
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Dedup identity inside one conversation.
    pub fn identity_key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

/// A raw hit from the web-search backend. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            relevance_score: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestorSearchRequest {
    pub sectors: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub enrich: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorSearchResponse {
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
    pub total: usize,
    pub cached: bool,
}
