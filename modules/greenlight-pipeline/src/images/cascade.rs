//! Image assignment cascade: providers by priority, then the local
//! cache, then deterministic generation. Every slot is always filled;
//! the generated-card stage cannot fail short of a filesystem error,
//! which is surfaced as an invariant breach.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use greenlight_common::{
    content_hash, AssignedImage, GreenlightError, ImageAssignment, ImageConfig, Provenance,
};

use crate::dedup::TextEmbedder;
use crate::images::cache::LocalImageCache;
use crate::images::generator::CardGenerator;
use crate::images::ledger::ImageUsageLedger;
use crate::images::provider::{search_resilient, ImageCandidate, ImageProvider};
use crate::util::cosine_similarity;

pub struct ImagePipeline {
    /// Priority order; earlier providers are preferred at equal rank.
    providers: Vec<Arc<dyn ImageProvider>>,
    embedder: Arc<dyn TextEmbedder>,
    cache: LocalImageCache,
    generator: CardGenerator,
    ledger: Arc<ImageUsageLedger>,
    config: ImageConfig,
}

impl ImagePipeline {
    pub fn new(
        providers: Vec<Arc<dyn ImageProvider>>,
        embedder: Arc<dyn TextEmbedder>,
        ledger: Arc<ImageUsageLedger>,
        config: ImageConfig,
    ) -> Self {
        Self {
            providers,
            embedder,
            cache: LocalImageCache::new(&config.cache_dir),
            generator: CardGenerator::new(&config.cache_dir.join("generated")),
            ledger,
            config,
        }
    }

    /// Fill one hero slot and `inline_slots` inline slots for a document.
    pub async fn assign(
        &self,
        topic: &str,
        entities: &BTreeMap<String, String>,
        document_id: Uuid,
    ) -> Result<ImageAssignment> {
        let slots = 1 + self.config.inline_slots;
        let mut assigned: Vec<AssignedImage> = Vec::with_capacity(slots);
        let mut seen_urls: HashSet<String> = HashSet::new();

        // Stage 1: licensed providers, ranked by metadata similarity.
        let query = build_query(topic, entities);
        let ranked = self.ranked_provider_candidates(&query, slots).await;
        for candidate in ranked {
            if assigned.len() == slots {
                break;
            }
            if !seen_urls.insert(candidate.url.clone()) {
                continue;
            }
            let key = content_hash(&candidate.url);
            if !self.ledger.try_reserve(&key) {
                debug!(url = candidate.url.as_str(), "Image at reuse cap, skipping");
                continue;
            }
            let slot = assigned.len();
            assigned.push(AssignedImage {
                url: candidate.url.clone(),
                content_key: key,
                provenance: Provenance::Provider {
                    name: candidate.provider.clone(),
                    license: candidate.license.clone(),
                },
                alt_text: alt_text(topic, entities, slot, Some(&candidate.title)),
            });
        }

        // Stage 2: local cache, keyed by category.
        if assigned.len() < slots {
            let category = entities
                .get("category")
                .map(String::as_str)
                .unwrap_or(topic);
            for path in self.cache.lookup(category) {
                if assigned.len() == slots {
                    break;
                }
                let url = path.display().to_string();
                if !seen_urls.insert(url.clone()) {
                    continue;
                }
                let key = content_hash(&url);
                if !self.ledger.try_reserve(&key) {
                    continue;
                }
                let slot = assigned.len();
                assigned.push(AssignedImage {
                    url,
                    content_key: key,
                    provenance: Provenance::Cache,
                    alt_text: alt_text(topic, entities, slot, None),
                });
            }
        }

        // Stage 3: generated cards. Ledger-exempt, deterministic, always
        // succeeds barring local IO failure.
        while assigned.len() < slots {
            let slot = assigned.len();
            let label = if slot == 0 {
                "hero".to_string()
            } else {
                format!("inline-{slot}")
            };
            let card = self.generator.generate(
                topic,
                entities,
                &label,
                alt_text(topic, entities, slot, None),
            )?;
            assigned.push(card);
        }

        if assigned.len() != slots {
            return Err(GreenlightError::Invariant(format!(
                "image cascade filled {} of {slots} slots for {topic}",
                assigned.len()
            ))
            .into());
        }

        let generated = assigned.iter().filter(|a| a.is_generated()).count();
        info!(
            topic,
            slots,
            generated,
            "Image assignment complete"
        );

        let mut images = assigned.into_iter();
        let hero = images.next().expect("slots is at least one");
        Ok(ImageAssignment {
            document_id,
            hero,
            inline: images.collect(),
        })
    }

    /// Return the ledger reservations held by an assignment, so an image
    /// attached to a document that never publishes does not consume reuse
    /// quota. Generated images hold no reservation.
    pub fn release(&self, assignment: &ImageAssignment) {
        for image in std::iter::once(&assignment.hero).chain(assignment.inline.iter()) {
            if !image.is_generated() {
                self.ledger.release(&image.content_key);
            }
        }
    }

    /// Query each provider in priority order, rank candidates by
    /// embedding similarity between the topic query and the candidate's
    /// metadata, weighted by provider quality. Stops early once enough
    /// candidates are in hand.
    async fn ranked_provider_candidates(
        &self,
        query: &str,
        slots: usize,
    ) -> Vec<ImageCandidate> {
        let query_embedding = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, skipping provider stage");
                return Vec::new();
            }
        };

        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        let mut ranked: Vec<(f64, ImageCandidate)> = Vec::new();
        for provider in &self.providers {
            if ranked.len() >= slots * 2 {
                break;
            }
            let candidates =
                search_resilient(provider.as_ref(), query, slots * 4, timeout, self.config.provider_retries)
                    .await;
            if candidates.is_empty() {
                continue;
            }
            let texts: Vec<String> = candidates
                .iter()
                .map(|c| format!("{} {}", c.title, c.description))
                .collect();
            let embeddings = match self.embedder.embed_batch(texts).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Candidate embedding failed");
                    continue;
                }
            };
            for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
                let rank = cosine_similarity(&query_embedding, &embedding)
                    * provider.quality_weight();
                if rank >= self.config.rank_threshold {
                    ranked.push((rank, candidate));
                }
            }
        }

        // Url tiebreak keeps ordering stable across runs.
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.url.cmp(&b.1.url))
        });
        ranked.into_iter().map(|(_, c)| c).collect()
    }
}

fn build_query(topic: &str, entities: &BTreeMap<String, String>) -> String {
    let mut parts = vec![topic.to_string()];
    parts.extend(entities.values().cloned());
    parts.join(" ")
}

/// Descriptive alt text varied per slot so repeated images on one page
/// never share identical captions.
fn alt_text(
    topic: &str,
    entities: &BTreeMap<String, String>,
    slot: usize,
    candidate_title: Option<&str>,
) -> String {
    if let Some(title) = candidate_title {
        if !title.trim().is_empty() {
            return format!("{title}, illustrating {topic}");
        }
    }
    let detail = entities
        .values()
        .nth(slot % entities.len().max(1))
        .map(String::as_str)
        .unwrap_or(topic);
    if slot == 0 {
        format!("Overview of {topic} featuring {detail}")
    } else {
        format!("Detail view {slot} for {topic}: {detail}")
    }
}
