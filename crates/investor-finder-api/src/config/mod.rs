pub mod settings;

pub use settings::{
    LlmConfig, LlmProviderConfig, LoggingConfig, MemoryConfig,
    PaginationConfig, ScraperConfig, SearchConfig, ServerConfig, Settings,
};
