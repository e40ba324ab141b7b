use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::{InvestorProfile, SearchResult};

/// Normalized lookup key: sectors lowercased and sorted, location lowercased,
/// result count as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sectors: Vec<String>,
    location: String,
    count: usize,
}

impl CacheKey {
    pub fn new(sectors: &[String], location: &str, count: usize) -> Self {
        let mut sectors: Vec<String> = sectors.iter().map(|s| s.trim().to_lowercase()).collect();
        sectors.sort();
        Self {
            sectors,
            location: location.trim().to_lowercase(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSearch {
    pub investors: Vec<InvestorProfile>,
    pub search_results: Vec<SearchResult>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedSearch,
    stored_at: DateTime<Utc>,
}

/// Longest honoured TTL; larger configured values are clamped to it.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

/// TTL memoization of investor searches with a capacity bound. When full the
/// oldest stored entry makes room.
#[derive(Clone)]
pub struct SearchCache {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
    capacity: usize,
}

impl SearchCache {
    pub fn new(ttl_minutes: i64, capacity: usize) -> Self {
        let ttl = Duration::try_minutes(ttl_minutes.min(MAX_TTL_MINUTES))
            .unwrap_or_else(Duration::zero);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl > Duration::zero()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedSearch> {
        self.get_at(key, Utc::now())
    }

    pub fn put(&self, key: CacheKey, value: CachedSearch) {
        self.put_at(key, value, Utc::now());
    }

    fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CachedSearch> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;

        if now - entry.stored_at <= self.ttl {
            debug!("Search cache hit for {:?}", key);
            return Some(entry.value.clone());
        }

        entries.remove(key);
        debug!("Search cache entry for {:?} expired", key);
        None
    }

    fn put_at(&self, key: CacheKey, value: CachedSearch, now: DateTime<Utc>) {
        if !self.is_enabled() {
            return;
        }

        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!("Search cache full, evicted {:?}", oldest);
            }
        }
        entries.insert(key, CacheEntry { value, stored_at: now });
    }

    /// Drops every stale entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at <= self.ttl);
        before - entries.len()
    }
}
