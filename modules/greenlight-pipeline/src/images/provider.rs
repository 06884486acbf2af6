//! Provider seam for licensed image search. Concrete services are
//! uniform behind `ImageProvider`; the cascade never branches on which
//! service answered.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use imagery_client::{OpenverseClient, PexelsClient};

/// Base backoff for provider retries. Actual delay is base * 3^attempt
/// plus random jitter (0-500ms).
const RETRY_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub title: String,
    pub description: String,
    pub url: String,
    pub license: String,
    pub provider: String,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>>;

    fn name(&self) -> &str;

    /// Recency/quality heuristic: scales the semantic rank of this
    /// provider's candidates.
    fn quality_weight(&self) -> f64 {
        1.0
    }
}

/// One provider query with timeout and bounded retry. Exhausted retries
/// degrade to "no results" so the cascade can move on, never a fatal
/// pipeline error.
pub async fn search_resilient(
    provider: &dyn ImageProvider,
    query: &str,
    max_results: usize,
    timeout: Duration,
    max_attempts: u32,
) -> Vec<ImageCandidate> {
    for attempt in 0..max_attempts.max(1) {
        match tokio::time::timeout(timeout, provider.search(query, max_results)).await {
            Ok(Ok(results)) => return results,
            Ok(Err(e)) => {
                warn!(provider = provider.name(), attempt, error = %e, "Image search failed");
            }
            Err(_) => {
                warn!(provider = provider.name(), attempt, "Image search timed out");
            }
        }
        if attempt + 1 < max_attempts {
            let backoff = RETRY_BASE * 3u32.pow(attempt);
            let jitter = Duration::from_millis(rand::rng().random_range(0..500));
            tokio::time::sleep(backoff + jitter).await;
        }
    }
    warn!(
        provider = provider.name(),
        query, "Provider exhausted retries, treating as no results"
    );
    Vec::new()
}

// --- Concrete providers ---

pub struct OpenverseProvider {
    client: OpenverseClient,
}

impl OpenverseProvider {
    pub fn new() -> Self {
        Self {
            client: OpenverseClient::new(),
        }
    }
}

impl Default for OpenverseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for OpenverseProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>> {
        let results = self.client.search(query, max_results).await?;
        Ok(results
            .into_iter()
            .map(|image| ImageCandidate {
                title: image.title.clone().unwrap_or_default(),
                description: image.tag_text(),
                url: image.url.clone(),
                license: image.license.clone(),
                provider: "openverse".to_string(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "openverse"
    }
}

pub struct PexelsProvider {
    client: PexelsClient,
}

impl PexelsProvider {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: PexelsClient::new(api_key),
        }
    }
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ImageCandidate>> {
        let results = self.client.search(query, max_results).await?;
        Ok(results
            .into_iter()
            .map(|photo| ImageCandidate {
                title: photo.alt.clone().unwrap_or_default(),
                description: format!("photo by {}", photo.photographer),
                url: photo.src.large.clone(),
                license: "pexels".to_string(),
                provider: "pexels".to_string(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "pexels"
    }

    /// Stock photography ranks slightly below openly licensed archival
    /// results for this site's editorial style.
    fn quality_weight(&self) -> f64 {
        0.9
    }
}
