pub mod memory;
pub mod pagination;
pub mod store;
pub mod types;

pub use memory::{ConversationMemory, MemoryError, MergeOutcome, TurnUpdate};
pub use pagination::{page, Page, PaginationState};
pub use store::{ConversationStore, JsonFileStore, StoreError};
pub use types::{ContextSnapshot, ConversationContext, ConversationSummary};
