pub mod error;
pub mod keyed_lock;
pub mod limiters;
pub mod logger;
pub mod text;

pub use error::ApiError;
pub use keyed_lock::KeyedLock;
pub use limiters::Limiters;
