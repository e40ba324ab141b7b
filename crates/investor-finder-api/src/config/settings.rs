use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub scraper: ScraperConfig,
    pub memory: MemoryConfig,
    pub pagination: PaginationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: "AI Investor Finder".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["*".to_string()],
            request_body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub default_provider: String,
    pub openai: LlmProviderConfig,
    pub gemini: LlmProviderConfig,
    pub anthropic: LlmProviderConfig,
    pub anthropic_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: "gemini".to_string(),
            openai: LlmProviderConfig {
                base_url: "https://api.openai.com".to_string(),
                model: "gpt-4".to_string(),
                ..LlmProviderConfig::default()
            },
            gemini: LlmProviderConfig {
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.0-flash".to_string(),
                ..LlmProviderConfig::default()
            },
            anthropic: LlmProviderConfig {
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-sonnet-20240229".to_string(),
                ..LlmProviderConfig::default()
            },
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

impl LlmConfig {
    /// Connection settings for a provider by registry name.
    pub fn provider(&self, name: &str) -> Option<LlmProviderConfig> {
        match name.to_lowercase().as_str() {
            "openai" => Some(self.openai.clone()),
            "gemini" => Some(self.gemini.clone()),
            "anthropic" => Some(self.anthropic.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LlmProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
    pub system_prompt: Option<String>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_seconds: 60,
            system_prompt: None,
        }
    }
}

impl LlmProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: String,
    pub google_api_key: String,
    pub google_search_engine_id: String,
    pub base_url: String,
    /// Per backend request.
    pub timeout_seconds: u64,
    /// Whole search attempt, covering every query of the fan-out.
    pub attempt_timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub cache_ttl_minutes: i64,
    pub cache_capacity: usize,
    pub default_location: String,
    pub num_results: usize,
    pub extract_emails: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            google_api_key: String::new(),
            google_search_engine_id: String::new(),
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            timeout_seconds: 15,
            attempt_timeout_seconds: 90,
            max_retries: 2,
            backoff_base_ms: 500,
            cache_ttl_minutes: 20,
            cache_capacity: 256,
            default_location: "United States".to_string(),
            num_results: 30,
            extract_emails: false,
        }
    }
}

impl SearchConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds.max(self.timeout_seconds).max(1))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    pub provider: String,
    pub enabled: bool,
    pub max_enrich: usize,
    pub max_concurrency: usize,
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            provider: "linkedin".to_string(),
            enabled: true,
            max_enrich: 15,
            max_concurrency: 3,
            delay_ms: 2000,
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_conversations: usize,
    pub max_messages_per_conversation: usize,
    pub ttl_hours: i64,
    pub history_window: usize,
    pub persistence_enabled: bool,
    pub persistence_path: String,
    pub cleanup_interval_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_conversations: 1000,
            max_messages_per_conversation: 100,
            ttl_hours: 24,
            history_window: 20,
            persistence_enabled: true,
            persistence_path: "data/conversations".to_string(),
            cleanup_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    /// Directory for a daily-rolling log file; stdout only when unset.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,investor_finder_api=debug".to_string(),
            json: true,
            directory: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_expectations() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.llm.default_provider, "gemini");
        assert_eq!(settings.search.max_attempts(), 3);
        assert_eq!(settings.pagination.page_size, 10);
        assert_eq!(settings.memory.history_window, 20);
    }

    #[test]
    fn test_provider_lookup_is_case_insensitive() {
        let llm = LlmConfig::default();
        assert_eq!(llm.provider("OpenAI").map(|c| c.model), Some("gpt-4".to_string()));
        assert_eq!(
            llm.provider("anthropic").map(|c| c.model),
            Some("claude-3-sonnet-20240229".to_string())
        );
        assert!(llm.provider("mistral").is_none());
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 9100\n[search]\ncache_ttl_minutes = 0\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = config.try_deserialize().unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.search.cache_ttl_minutes, 0);
        assert_eq!(settings.search.num_results, 30);
    }
}
