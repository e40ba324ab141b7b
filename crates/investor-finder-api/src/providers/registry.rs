use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{
    LlmProvider, ProviderError, ProviderKind, RegistryError, ScraperProvider, SearchProvider,
};
use crate::config::LlmProviderConfig;

pub type LlmFactory =
    Arc<dyn Fn(&LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> + Send + Sync>;
pub type SearchFactory =
    Arc<dyn Fn() -> Result<Arc<dyn SearchProvider>, ProviderError> + Send + Sync>;
pub type ScraperFactory =
    Arc<dyn Fn() -> Result<Arc<dyn ScraperProvider>, ProviderError> + Send + Sync>;

/// Constructor registered under a provider name.
#[derive(Clone)]
pub enum ProviderFactory {
    Llm(LlmFactory),
    Search(SearchFactory),
    Scraper(ScraperFactory),
}

impl ProviderFactory {
    pub fn llm<F>(f: F) -> Self
    where
        F: Fn(&LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self::Llm(Arc::new(f))
    }

    pub fn search<F>(f: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SearchProvider>, ProviderError> + Send + Sync + 'static,
    {
        Self::Search(Arc::new(f))
    }

    pub fn scraper<F>(f: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ScraperProvider>, ProviderError> + Send + Sync + 'static,
    {
        Self::Scraper(Arc::new(f))
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderFactory::Llm(_) => ProviderKind::Llm,
            ProviderFactory::Search(_) => ProviderKind::Search,
            ProviderFactory::Scraper(_) => ProviderKind::Scraper,
        }
    }
}

#[derive(Clone)]
enum ProviderInstance {
    Llm(Arc<dyn LlmProvider>),
    Search(Arc<dyn SearchProvider>),
    Scraper(Arc<dyn ScraperProvider>),
}

impl ProviderInstance {
    async fn initialize(&self) -> Result<(), ProviderError> {
        match self {
            ProviderInstance::Llm(p) => p.initialize().await,
            ProviderInstance::Search(p) => p.initialize().await,
            ProviderInstance::Scraper(p) => p.initialize().await,
        }
    }

    async fn shutdown(&self) -> Result<(), ProviderError> {
        match self {
            ProviderInstance::Llm(p) => p.shutdown().await,
            ProviderInstance::Search(p) => p.shutdown().await,
            ProviderInstance::Scraper(p) => p.shutdown().await,
        }
    }
}

type RegistryKey = (ProviderKind, String);

/// Name-keyed provider registry with lazily built, initialize-once singletons.
///
/// Owned by the application state rather than living in a global, so tests
/// construct their own.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: DashMap<RegistryKey, ProviderFactory>,
    instances: DashMap<RegistryKey, Arc<OnceCell<ProviderInstance>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, silently replacing any previous one with the same
    /// kind and name.
    pub fn register(&self, name: &str, factory: ProviderFactory) {
        let kind = factory.kind();
        let name = name.to_lowercase();
        if self.factories.insert((kind, name.clone()), factory).is_some() {
            debug!("Replaced {} provider '{}'", kind, name);
        } else {
            debug!("Registered {} provider '{}'", kind, name);
        }
    }

    pub fn resolve(
        &self,
        kind: ProviderKind,
        name: &str,
    ) -> Result<ProviderFactory, RegistryError> {
        let name = name.to_lowercase();
        self.factories
            .get(&(kind, name.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| self.not_found(kind, name))
    }

    pub fn is_registered(&self, kind: ProviderKind, name: &str) -> bool {
        self.factories.contains_key(&(kind, name.to_lowercase()))
    }

    /// Registered names for one kind, sorted.
    pub fn registered(&self, kind: ProviderKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .map(|entry| entry.key().1.clone())
            .collect();
        names.sort();
        names
    }

    /// LLM instance for `name`, cached per name and model when `cache` is set.
    pub async fn llm(
        &self,
        name: &str,
        config: &LlmProviderConfig,
        cache: bool,
    ) -> Result<Arc<dyn LlmProvider>, RegistryError> {
        let name = name.to_lowercase();
        let ProviderFactory::Llm(factory) = self.resolve(ProviderKind::Llm, &name)? else {
            return Err(self.not_found(ProviderKind::Llm, name));
        };
        let key = format!("{}:{}", name, config.model);
        let instance = self
            .get_or_create(ProviderKind::Llm, key, cache, || {
                factory(config).map(ProviderInstance::Llm)
            })
            .await?;

        match instance {
            ProviderInstance::Llm(provider) => Ok(provider),
            _ => Err(self.not_found(ProviderKind::Llm, name)),
        }
    }

    pub async fn search(
        &self,
        name: &str,
        cache: bool,
    ) -> Result<Arc<dyn SearchProvider>, RegistryError> {
        let name = name.to_lowercase();
        let ProviderFactory::Search(factory) = self.resolve(ProviderKind::Search, &name)? else {
            return Err(self.not_found(ProviderKind::Search, name));
        };
        let instance = self
            .get_or_create(ProviderKind::Search, name.clone(), cache, || {
                factory().map(ProviderInstance::Search)
            })
            .await?;

        match instance {
            ProviderInstance::Search(provider) => Ok(provider),
            _ => Err(self.not_found(ProviderKind::Search, name)),
        }
    }

    pub async fn scraper(
        &self,
        name: &str,
        cache: bool,
    ) -> Result<Arc<dyn ScraperProvider>, RegistryError> {
        let name = name.to_lowercase();
        let ProviderFactory::Scraper(factory) = self.resolve(ProviderKind::Scraper, &name)? else {
            return Err(self.not_found(ProviderKind::Scraper, name));
        };
        let instance = self
            .get_or_create(ProviderKind::Scraper, name.clone(), cache, || {
                factory().map(ProviderInstance::Scraper)
            })
            .await?;

        match instance {
            ProviderInstance::Scraper(provider) => Ok(provider),
            _ => Err(self.not_found(ProviderKind::Scraper, name)),
        }
    }

    /// Number of cached, initialized instances.
    pub fn cached_instances(&self) -> usize {
        self.instances
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    /// Shuts down every cached instance and empties the cache. Individual
    /// failures are logged and skipped. Returns how many shut down cleanly.
    pub async fn shutdown_all(&self) -> usize {
        let keys: Vec<RegistryKey> =
            self.instances.iter().map(|entry| entry.key().clone()).collect();
        let mut clean = 0;

        for key in keys {
            let Some((_, cell)) = self.instances.remove(&key) else {
                continue;
            };
            let Some(instance) = cell.get() else {
                continue;
            };
            match instance.shutdown().await {
                Ok(()) => {
                    debug!("Shut down {} provider '{}'", key.0, key.1);
                    clean += 1;
                }
                Err(e) => warn!("Failed to shut down {} provider '{}': {}", key.0, key.1, e),
            }
        }

        info!("Provider cleanup finished ({} shut down cleanly)", clean);
        clean
    }

    async fn get_or_create<F>(
        &self,
        kind: ProviderKind,
        key: String,
        cache: bool,
        build: F,
    ) -> Result<ProviderInstance, RegistryError>
    where
        F: FnOnce() -> Result<ProviderInstance, ProviderError>,
    {
        if !cache {
            let instance = build()?;
            instance.initialize().await?;
            return Ok(instance);
        }

        let cell = self
            .instances
            .entry((kind, key.clone()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let instance = cell
            .get_or_try_init(|| async move {
                let instance = build()?;
                instance.initialize().await?;
                info!("Initialized {} provider '{}'", kind, key);
                Ok::<_, ProviderError>(instance)
            })
            .await?;

        Ok(instance.clone())
    }

    fn not_found(&self, kind: ProviderKind, name: String) -> RegistryError {
        RegistryError::NotFound {
            kind,
            available: self.registered(kind),
            name,
        }
    }
}
