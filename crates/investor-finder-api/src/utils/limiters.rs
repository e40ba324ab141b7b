use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ScraperConfig;

/// Concurrency caps for outbound work that must respect third-party limits.
#[derive(Clone)]
pub struct Limiters {
    pub scrape: Arc<Semaphore>,
    pub scrape_delay: Duration,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &ScraperConfig) -> Self {
        Self {
            scrape: Arc::new(Semaphore::new(cfg.max_concurrency.max(1))),
            scrape_delay: Duration::from_millis(cfg.delay_ms),
            // Waiting for a slot is bounded by the time a full queue can take.
            acquire_timeout: cfg.timeout().saturating_mul(cfg.max_enrich.max(1) as u32),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration)> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| anyhow::anyhow!("Limiter acquire timeout for op={}", op))??;

        Ok((permit, start.elapsed()))
    }
}
