pub mod chat_service;
pub mod conversation;
pub mod event_bus;
pub mod intent;
pub mod investor_service;
pub mod search_cache;

pub use chat_service::{ChatError, ChatService, ChatStreamEvent};
pub use conversation::ConversationMemory;
pub use event_bus::{EventBus, InvestorEvent};
pub use investor_service::{Discovery, DiscoveryError, InvestorService};
pub use search_cache::SearchCache;
