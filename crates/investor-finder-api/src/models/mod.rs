pub mod chat;
pub mod investor;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, MessageRole, PaginationInfo};
pub use investor::{InvestorProfile, InvestorSearchRequest, InvestorSearchResponse, SearchResult};
