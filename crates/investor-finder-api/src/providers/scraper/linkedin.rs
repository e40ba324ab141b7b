use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::models::{InvestorProfile, SearchResult};
use crate::providers::{ProviderError, ScraperProvider};
use crate::utils::text::{clip, contains_keyword, title_case};

const PROVIDER: &str = "linkedin";
const MAX_FOCUS_FROM_TEXT: usize = 5;
const MAX_FOCUS_MERGED: usize = 8;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"linkedin\.com/in/([^/?#]+)").expect("valid slug regex"));
static COMPANY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" at ([^\.·\n]+)").expect("valid company regex"));
static LOCATION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"([A-Z][a-z]+(?: [A-Z][a-z]+)*(?:,\s*[A-Z][a-z]+(?: [A-Z][a-z]+)*)?(?:\s+Area)?)\s*·",
        r"Location:\s*([^\.·\n]+)",
        r"(?i:based in|located in)\s+([^\.·\n]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid location regex"))
    .collect()
});

static META_OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static META_OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static H1: Lazy<Selector> = Lazy::new(|| selector("h1"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static ABOUT_SECTION: Lazy<Selector> =
    Lazy::new(|| selector("section#about-section, section.summary"));
static EXPERIENCE_ITEMS: Lazy<Selector> = Lazy::new(|| selector("section#experience-section li"));
static EXPERIENCE_TITLE: Lazy<Selector> = Lazy::new(|| selector("h3"));
static EXPERIENCE_COMPANY: Lazy<Selector> = Lazy::new(|| selector("h4"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

const FOCUS_KEYWORDS: &[(&str, &[&str])] = &[
    ("health", &["health", "healthcare", "biotech", "medtech", "medical"]),
    ("ai", &["ai", "artificial intelligence", "machine learning", "ml", "deep learning"]),
    ("fintech", &["fintech", "finance", "banking", "payments", "crypto", "blockchain"]),
    ("e-commerce", &["e-commerce", "ecommerce", "retail", "marketplace", "d2c"]),
    ("saas", &["saas", "software", "b2b", "enterprise"]),
    ("edtech", &["edtech", "education", "learning"]),
    ("cleantech", &["climate", "cleantech", "sustainability", "green", "energy"]),
    ("gaming", &["gaming", "games", "esports"]),
    ("mobility", &["mobility", "transportation", "automotive", "ev"]),
    ("foodtech", &["food", "foodtech", "agtech", "agriculture"]),
];

/// Fields recovered from a profile page, all optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedDetails {
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub investment_focus: Vec<String>,
    pub experience: Vec<String>,
}

impl ScrapedDetails {
    fn is_empty(&self) -> bool {
        *self == ScrapedDetails::default()
    }
}

/// Public LinkedIn profile scraper. Pages are fetched without login, so
/// only OpenGraph metadata and JSON-LD are reliably present.
pub struct LinkedInScraper {
    client: Client,
    cache: DashMap<String, ScrapedDetails>,
}

impl LinkedInScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::configuration(PROVIDER, e.to_string()))?;
        Ok(Self { client, cache: DashMap::new() })
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(PROVIDER, response).await);
        }
        response.text().await.map_err(|e| ProviderError::parse(PROVIDER, e))
    }
}

/// Focus categories mentioned in free text, table order, at most five.
pub fn investment_focus(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    FOCUS_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| contains_keyword(&lowered, kw)))
        .map(|(category, _)| category.to_string())
        .take(MAX_FOCUS_FROM_TEXT)
        .collect()
}

/// Splits "Name - Title | LinkedIn" style headings.
fn split_heading(heading: &str) -> (Option<String>, Option<String>) {
    if heading.contains(" - ") {
        let mut parts = heading.split(" - ");
        let name = parts.next().map(|n| n.trim().to_string());
        let title = parts
            .next()
            .map(|t| t.replace(" | LinkedIn", "").trim().to_string())
            .filter(|t| !t.is_empty());
        (name.filter(|n| !n.is_empty()), title)
    } else if heading.contains(" | ") {
        (heading.split(" | ").next().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()), None)
    } else {
        let name = heading.replace(" | LinkedIn", "").trim().to_string();
        ((!name.is_empty()).then_some(name), None)
    }
}

fn find_location(text: &str) -> Option<String> {
    LOCATION_RES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| clip(m.as_str().trim(), 100))
        .filter(|l| !l.is_empty())
}

fn find_company(text: &str) -> Option<String> {
    COMPANY_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clip(m.as_str().trim(), 100))
        .filter(|c| !c.is_empty())
}

/// Profile from search-listing metadata (title + snippet) alone.
pub fn profile_from_listing(title: &str, snippet: &str, url: &str) -> Option<InvestorProfile> {
    let (name, headline) = split_heading(title);
    let mut profile = InvestorProfile::new(name?).with_source(PROVIDER);
    profile.title = headline;
    profile.linkedin_url = Some(url.to_string());

    if !snippet.is_empty() {
        profile.bio = Some(clip(snippet, 500));
        profile.company = find_company(snippet);
        profile.location = find_location(snippet);
        profile.investment_focus = investment_focus(snippet);
    }
    Some(profile)
}

/// Name recovered from the profile URL slug.
pub fn profile_from_url(url: &str) -> Option<InvestorProfile> {
    let slug = SLUG_RE.captures(url)?.get(1)?.as_str();
    let name = title_case(&slug.replace('-', " "));
    if name.is_empty() {
        return None;
    }
    let mut profile = InvestorProfile::new(name).with_source(PROVIDER);
    profile.linkedin_url = Some(url.to_string());
    Some(profile)
}

fn meta_content(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn element_text(el: scraper::ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn json_ld_person(doc: &Html, details: &mut ScrapedDetails) {
    for script in doc.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let person = match &value {
            Value::Object(map) if map.contains_key("@graph") => value["@graph"]
                .as_array()
                .and_then(|items| items.iter().find(|i| i["@type"] == "Person"))
                .cloned(),
            Value::Object(_) => Some(value.clone()),
            _ => None,
        };
        let Some(person) = person else {
            continue;
        };

        let text = |v: &Value| v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        details.name = details.name.take().or_else(|| text(&person["name"]));
        details.title = details.title.take().or_else(|| text(&person["jobTitle"]));
        let works_for = match &person["worksFor"] {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        details.company = details.company.take().or_else(|| text(&works_for["name"]));
        let address = &person["address"];
        details.location = details
            .location
            .take()
            .or_else(|| {
                text(&address["addressLocality"]).or_else(|| text(&address["addressRegion"]))
            });
        break;
    }
}

/// Everything recoverable from a public profile page.
pub fn parse_profile_page(html: &str) -> ScrapedDetails {
    let doc = Html::parse_document(html);
    let mut details = ScrapedDetails::default();

    json_ld_person(&doc, &mut details);

    if let Some(og_title) = meta_content(&doc, &META_OG_TITLE) {
        let (name, headline) = split_heading(&og_title);
        details.name = details.name.take().or(name);
        details.title = details.title.take().or(headline);
    }

    if details.name.is_none() {
        details.name = doc
            .select(&H1)
            .next()
            .map(element_text)
            .map(|n| clip(&n, 100))
            .filter(|n| !n.is_empty());
    }

    let about = doc.select(&ABOUT_SECTION).next().map(element_text).filter(|t| !t.is_empty());
    let description = meta_content(&doc, &META_OG_DESCRIPTION);

    if let Some(about) = about {
        details.bio = Some(clip(&about, 800));
    } else if let Some(desc) = &description {
        details.bio = Some(clip(desc, 500));
    }
    if let Some(desc) = &description {
        details.company = details.company.take().or_else(|| find_company(desc));
        details.location = details.location.take().or_else(|| find_location(desc));
    }
    if let Some(bio) = &details.bio {
        details.investment_focus = investment_focus(bio);
    }

    details.experience = doc
        .select(&EXPERIENCE_ITEMS)
        .filter_map(|item| {
            let title = item.select(&EXPERIENCE_TITLE).next().map(element_text)?;
            let company = item.select(&EXPERIENCE_COMPANY).next().map(element_text)?;
            Some(format!("{} @ {}", title, company))
        })
        .take(3)
        .collect();

    details
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Fills only missing fields, keeps the longer bio, unions focus tags.
pub fn merge_profiles(original: &InvestorProfile, details: &ScrapedDetails) -> InvestorProfile {
    let mut merged = original.clone();

    if merged.name.trim().is_empty() {
        if let Some(name) = &details.name {
            merged.name = name.clone();
        }
    }
    for (field, value) in [
        (&mut merged.title, &details.title),
        (&mut merged.company, &details.company),
        (&mut merged.location, &details.location),
    ] {
        if is_blank(field) && value.is_some() {
            *field = value.clone();
        }
    }

    match (&merged.bio, &details.bio) {
        (None, Some(bio)) => merged.bio = Some(bio.clone()),
        (Some(current), Some(bio)) if bio.chars().count() > current.chars().count() => {
            merged.bio = Some(bio.clone())
        }
        _ => {}
    }

    for tag in &details.investment_focus {
        if !merged.investment_focus.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            merged.investment_focus.push(tag.clone());
        }
    }
    merged.investment_focus.truncate(MAX_FOCUS_MERGED);

    if merged.experience.is_empty() {
        merged.experience = details.experience.clone();
    }

    merged.source = format!("{}_enriched", original.source);
    merged
}

#[async_trait]
impl ScraperProvider for LinkedInScraper {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        info!("LinkedIn scraper ready");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        let cleared = self.cache.len();
        self.cache.clear();
        info!("LinkedIn scraper cleaned up ({} cached pages dropped)", cleared);
        Ok(())
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("linkedin.com/in/")
    }

    async fn scrape_profile(&self, url: &str) -> Result<Option<InvestorProfile>, ProviderError> {
        let html = match self.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("LinkedIn fetch failed for {}: {}", url, e);
                return Ok(profile_from_url(url));
            }
        };

        let details = parse_profile_page(&html);
        let Some(name) = details.name.clone() else {
            return Ok(profile_from_url(url));
        };

        let mut profile = InvestorProfile::new(name).with_source(PROVIDER);
        profile.title = details.title.clone();
        profile.company = details.company.clone();
        profile.location = details.location.clone();
        profile.bio = details.bio.clone();
        profile.investment_focus = details.investment_focus.clone();
        profile.experience = details.experience.clone();
        profile.linkedin_url = Some(url.to_string());
        self.cache.insert(url.to_string(), details);
        Ok(Some(profile))
    }

    fn profile_from_search_result(&self, result: &SearchResult) -> Option<InvestorProfile> {
        profile_from_listing(&result.title, &result.snippet, &result.url)
    }

    async fn enrich_profile(
        &self,
        profile: &InvestorProfile,
    ) -> Result<InvestorProfile, ProviderError> {
        let Some(url) = profile.linkedin_url.as_deref() else {
            return Ok(profile.clone());
        };

        if let Some(cached) = self.cache.get(url) {
            debug!("Enrichment cache hit for {}", url);
            return Ok(merge_profiles(profile, cached.value()));
        }

        let html = self.fetch(url).await?;
        let details = parse_profile_page(&html);
        if details.is_empty() {
            return Ok(profile.clone());
        }
        let merged = merge_profiles(profile, &details);
        self.cache.insert(url.to_string(), details);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_PAGE: &str = r#"<!doctype html>
<html><head>
<meta property="og:title" content="Jane Doe - General Partner at Acme Ventures | LinkedIn">
<meta property="og:description" content="General Partner at Acme Ventures. Investing in fintech and AI. Based in San Francisco">
<script type="application/ld+json">{"@context":"https://schema.org","@graph":[{"@type":"WebPage"},{"@type":"Person","name":"Jane Doe","jobTitle":"General Partner","worksFor":[{"name":"Acme Ventures"}],"address":{"addressLocality":"San Francisco"}}]}</script>
</head><body>
<h1>Jane Doe</h1>
<section id="experience-section"><ul>
<li><h3>General Partner</h3><h4>Acme Ventures</h4></li>
<li><h3>Principal</h3><h4>Beta Capital</h4></li>
</ul></section>
</body></html>"#;

    #[test]
    fn test_listing_parses_name_title_and_details() {
        let profile = profile_from_listing(
            "Jane Doe - Partner | LinkedIn",
            "Partner at Acme Ventures. San Francisco, California · Investing in fintech and healthcare.",
            "https://www.linkedin.com/in/jane-doe",
        )
        .unwrap();

        assert_eq!(profile.name, "Jane Doe");
        assert_eq!(profile.title.as_deref(), Some("Partner"));
        assert_eq!(profile.company.as_deref(), Some("Acme Ventures"));
        assert_eq!(profile.location.as_deref(), Some("San Francisco, California"));
        assert_eq!(profile.investment_focus, vec!["health".to_string(), "fintech".to_string()]);
        assert_eq!(profile.source, "linkedin");
    }

    #[test]
    fn test_listing_with_pipe_heading() {
        let profile = profile_from_listing(
            "John Smith | LinkedIn",
            "",
            "https://linkedin.com/in/js",
        )
        .unwrap();
        assert_eq!(profile.name, "John Smith");
        assert!(profile.title.is_none());
        assert!(profile.bio.is_none());
    }

    #[test]
    fn test_name_from_url_slug() {
        let profile =
            profile_from_url("https://www.linkedin.com/in/mary-ann-smith?trk=abc").unwrap();
        assert_eq!(profile.name, "Mary Ann Smith");
        assert!(profile_from_url("https://example.com/team").is_none());
    }

    #[test]
    fn test_profile_page_prefers_json_ld() {
        let details = parse_profile_page(PROFILE_PAGE);
        assert_eq!(details.name.as_deref(), Some("Jane Doe"));
        assert_eq!(details.title.as_deref(), Some("General Partner"));
        assert_eq!(details.company.as_deref(), Some("Acme Ventures"));
        assert_eq!(details.location.as_deref(), Some("San Francisco"));
        assert_eq!(details.investment_focus, vec!["ai".to_string(), "fintech".to_string()]);
        assert_eq!(details.experience, vec![
            "General Partner @ Acme Ventures".to_string(),
            "Principal @ Beta Capital".to_string(),
        ]);
    }

    #[test]
    fn test_profile_page_falls_back_to_h1() {
        let details = parse_profile_page("<html><body><h1>  Ada   Lovelace </h1></body></html>");
        assert_eq!(details.name.as_deref(), Some("Ada Lovelace"));
        assert!(details.bio.is_none());
    }

    #[test]
    fn test_focus_is_capped_at_five() {
        let focus =
            investment_focus("health, AI, fintech, retail, SaaS, edtech, climate and gaming");
        assert_eq!(focus.len(), 5);
        assert_eq!(focus[0], "health");
    }

    #[test]
    fn test_merge_fills_gaps_and_keeps_longer_bio() {
        let mut original = InvestorProfile::new("Jane Doe").with_source("linkedin");
        original.title = Some("Partner".to_string());
        original.bio = Some("Short".to_string());
        original.investment_focus = vec!["ai".to_string()];

        let details = ScrapedDetails {
            title: Some("General Partner".to_string()),
            company: Some("Acme Ventures".to_string()),
            bio: Some("A much longer biography".to_string()),
            investment_focus: vec!["AI".to_string(), "fintech".to_string()],
            ..ScrapedDetails::default()
        };

        let merged = merge_profiles(&original, &details);

        assert_eq!(merged.title.as_deref(), Some("Partner"));
        assert_eq!(merged.company.as_deref(), Some("Acme Ventures"));
        assert_eq!(merged.bio.as_deref(), Some("A much longer biography"));
        assert_eq!(merged.investment_focus, vec!["ai".to_string(), "fintech".to_string()]);
        assert_eq!(merged.source, "linkedin_enriched");
    }

    #[test]
    fn test_merge_caps_focus_tags() {
        let mut original = InvestorProfile::new("X");
        original.investment_focus = (0..6).map(|i| format!("t{i}")).collect();
        let details = ScrapedDetails {
            investment_focus: (6..12).map(|i| format!("t{i}")).collect(),
            ..ScrapedDetails::default()
        };
        assert_eq!(merge_profiles(&original, &details).investment_focus.len(), 8);
    }

    #[tokio::test]
    async fn test_enrich_without_url_is_identity() {
        let scraper = LinkedInScraper::new(&ScraperConfig::default()).unwrap();
        let profile = InvestorProfile::new("No Url");
        let enriched = scraper.enrich_profile(&profile).await.unwrap();
        assert_eq!(enriched, profile);
    }

    #[tokio::test]
    async fn test_shutdown_clears_page_cache() {
        let scraper = LinkedInScraper::new(&ScraperConfig::default()).unwrap();
        scraper.cache.insert("https://linkedin.com/in/a".to_string(), ScrapedDetails::default());
        scraper.shutdown().await.unwrap();
        assert_eq!(scraper.cached_pages(), 0);
    }
}
