use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::types::ConversationContext;

static SAFE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid id regex"));

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conversation id '{0}' cannot be stored")]
    InvalidId(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored conversation is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable mirror of conversation contexts, keyed by conversation id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<ConversationContext>, StoreError>;

    async fn save(&self, context: &ConversationContext) -> Result<(), StoreError>;

    /// Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

pub fn is_storable_id(id: &str) -> bool {
    SAFE_ID.is_match(id)
}

/// One `{id}.json` file per conversation under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_storable_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load(&self, id: &str) -> Result<Option<ConversationContext>, StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, context: &ConversationContext) -> Result<(), StoreError> {
        let path = self.path_for(&context.conversation_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(context)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Persisted conversation {}", context.conversation_id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_storable_id(stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvestorProfile;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("investor-finder-store-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_id_validation() {
        assert!(is_storable_id("3f2b9c1e-aa10-4b7e-9d7f-0c2a1e5b8d44"));
        assert!(is_storable_id("conv_1"));
        assert!(!is_storable_id("../etc/passwd"));
        assert!(!is_storable_id(""));
        assert!(!is_storable_id(&"x".repeat(129)));
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = temp_dir();
        let store = JsonFileStore::open(&dir).await.unwrap();

        let mut context = ConversationContext::new("conv-1", 10);
        context.add_investors(&[InvestorProfile::new("Ada")]);
        store.save(&context).await.unwrap();

        let loaded = store.load("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded, context);
        assert_eq!(store.list_ids().await.unwrap(), vec!["conv-1".to_string()]);

        assert!(store.delete("conv-1").await.unwrap());
        assert!(!store.delete("conv-1").await.unwrap());
        assert!(store.load("conv-1").await.unwrap().is_none());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsafe_ids_never_touch_disk() {
        let dir = temp_dir();
        let store = JsonFileStore::open(&dir).await.unwrap();
        let err = store.load("../../secret").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
