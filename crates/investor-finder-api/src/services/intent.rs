//! Message intent classification.
//!
//! Decides per chat turn whether the user wants the next page of already
//! found investors, a fresh investor search, or plain conversation.

use tracing::debug;

use crate::utils::text::contains_keyword;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIntent {
    /// "more", "next", "show more": walk the stored investor list.
    Pagination,

    /// Investor search vocabulary without a pagination trigger.
    Search,

    /// Anything else goes straight to the model.
    Chat,
}

pub const PAGINATION_TRIGGERS: &[&str] = &[
    "more",
    "next",
    "continue",
    "show more",
    "additional",
    "other investors",
    "remaining",
    "next 10",
    "more investors",
];

pub const SEARCH_TRIGGERS: &[&str] = &[
    "investor",
    "investors",
    "investment",
    "invest",
    "funding",
    "capital",
    "raise",
    "raising",
    "find",
    "search",
    "look for",
    "looking for",
    "startup",
    "venture",
    "vc",
    "angel",
    "seed",
    "series a",
    "series b",
];

/// Sector tag and the keywords that select it. Order is the output order.
pub const SECTOR_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "healthcare",
        &["health", "healthcare", "medical", "biotech", "medtech", "pharma", "healthtech"],
    ),
    (
        "ecommerce",
        &["ecommerce", "e-commerce", "retail", "marketplace", "dtc", "direct to consumer"],
    ),
    (
        "ai",
        &[
            "ai",
            "artificial intelligence",
            "machine learning",
            "ml",
            "deep learning",
            "llm",
            "generative ai",
        ],
    ),
    (
        "fintech",
        &["fintech", "finance", "payment", "banking", "neobank", "defi", "crypto", "blockchain"],
    ),
    ("edtech", &["edtech", "education", "learning", "online education", "e-learning"]),
    ("saas", &["saas", "software", "b2b", "enterprise", "cloud", "platform"]),
    ("climate", &["climate", "cleantech", "sustainability", "green", "renewable", "carbon"]),
    ("gaming", &["gaming", "game", "entertainment", "esports", "metaverse"]),
    ("foodtech", &["food", "foodtech", "agtech", "agriculture", "delivery"]),
    ("logistics", &["logistics", "supply chain", "shipping", "freight", "warehouse"]),
    ("proptech", &["proptech", "real estate", "property", "housing"]),
    ("cybersecurity", &["cybersecurity", "security", "infosec", "privacy"]),
    ("robotics", &["robotics", "automation", "manufacturing", "hardware"]),
];

pub const FALLBACK_SECTORS: &[&str] = &["startup", "technology"];

pub struct MessageClassifier;

impl MessageClassifier {
    pub fn classify(message: &str) -> MessageIntent {
        let lowered = message.to_lowercase();

        if let Some(trigger) = PAGINATION_TRIGGERS.iter().find(|t| lowered.contains(*t)) {
            debug!("Detected Pagination intent: matched '{}'", trigger);
            return MessageIntent::Pagination;
        }

        if let Some(trigger) = SEARCH_TRIGGERS.iter().find(|t| contains_keyword(&lowered, t)) {
            debug!("Detected Search intent: matched '{}'", trigger);
            return MessageIntent::Search;
        }

        debug!("Defaulting to Chat intent");
        MessageIntent::Chat
    }

    pub fn is_pagination_request(message: &str) -> bool {
        Self::classify(message) == MessageIntent::Pagination
    }

    pub fn should_search(message: &str) -> bool {
        Self::classify(message) == MessageIntent::Search
    }

    /// Sector tags mentioned in `message`, in table order. Falls back to a
    /// generic tag set when nothing matches.
    pub fn extract_sectors(message: &str) -> Vec<String> {
        let lowered = message.to_lowercase();
        let sectors: Vec<String> = SECTOR_KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| contains_keyword(&lowered, k)))
            .map(|(sector, _)| sector.to_string())
            .collect();

        if sectors.is_empty() {
            debug!("No sector keywords found, using fallback");
            return FALLBACK_SECTORS.iter().map(|s| s.to_string()).collect();
        }
        debug!("Extracted sectors: {:?}", sectors);
        sectors
    }
}
