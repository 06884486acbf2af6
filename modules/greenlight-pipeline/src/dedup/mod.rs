//! Semantic deduplication against the fingerprint store.
//!
//! `is_duplicate` is read-only; registration is a separate explicit
//! operation performed only after a document is fully approved, so failed
//! drafts never pollute the comparison set.

pub mod embedder;
pub mod store;

pub use embedder::{HashEmbedder, RemoteEmbedder, TextEmbedder};
pub use store::{FingerprintStore, JsonlFingerprintStore, MemoryFingerprintStore};

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use greenlight_common::{ContentFingerprint, DedupVerdict};

use crate::util::cosine_similarity;

pub struct Deduplicator {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<dyn FingerprintStore>,
}

impl Deduplicator {
    pub fn new(embedder: Arc<dyn TextEmbedder>, store: Arc<dyn FingerprintStore>) -> Self {
        Self { embedder, store }
    }

    /// Compare `candidate_text` against every fingerprint within
    /// `window_days`. Read-only.
    ///
    /// The duplicate flag is derived from the computed maximum alone, so
    /// `is_duplicate` implies `max_similarity >= threshold` by
    /// construction.
    pub async fn is_duplicate(
        &self,
        candidate_text: &str,
        window_days: i64,
        threshold: f64,
    ) -> Result<DedupVerdict> {
        let embedding = self.embedder.embed(candidate_text).await?;
        let entries = self.store.query_window(window_days).await?;
        if entries.is_empty() {
            return Ok(DedupVerdict::unique());
        }

        let mut max_similarity = 0.0_f64;
        let mut matched_id: Option<Uuid> = None;
        for entry in &entries {
            let similarity = cosine_similarity(&embedding, &entry.embedding);
            if matched_id.is_none() || similarity > max_similarity {
                max_similarity = similarity;
                matched_id = Some(entry.id);
            }
        }

        let verdict = DedupVerdict {
            is_duplicate: max_similarity >= threshold,
            max_similarity,
            matched_id,
        };
        debug!(
            compared = entries.len(),
            max_similarity,
            is_duplicate = verdict.is_duplicate,
            "Dedup check"
        );
        Ok(verdict)
    }

    /// Register an approved document's fingerprint. The only store write.
    pub async fn register(&self, topic: &str, text: &str) -> Result<ContentFingerprint> {
        let embedding = self.embedder.embed(text).await?;
        let fingerprint = ContentFingerprint {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            embedding,
            created_at: Utc::now(),
        };
        self.store.insert(fingerprint.clone()).await?;
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Embedder that always returns one fixed vector, letting tests pin
    /// similarities exactly.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait::async_trait]
    impl TextEmbedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn fingerprint_with(embedding: Vec<f32>, days_ago: i64) -> ContentFingerprint {
        ContentFingerprint {
            id: Uuid::new_v4(),
            topic: "prior article".to_string(),
            embedding,
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    fn dedup_with(
        embedder_vector: Vec<f32>,
        stored: Vec<ContentFingerprint>,
    ) -> Deduplicator {
        Deduplicator::new(
            Arc::new(FixedEmbedder(embedder_vector)),
            Arc::new(MemoryFingerprintStore::seeded(stored)),
        )
    }

    /// Unit vector whose cosine against [1,0] is exactly `target` (up to
    /// f32 rounding).
    fn vector_with_similarity(target: f32) -> Vec<f32> {
        vec![target, (1.0 - target * target).sqrt()]
    }

    #[tokio::test]
    async fn empty_store_is_never_duplicate() {
        let dedup = dedup_with(vec![1.0, 0.0], vec![]);
        let verdict = dedup.is_duplicate("anything", 30, 0.86).await.unwrap();
        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.max_similarity, 0.0);
        assert!(verdict.matched_id.is_none());
    }

    #[tokio::test]
    async fn similarity_exactly_at_threshold_is_duplicate() {
        let stored = vector_with_similarity(0.86);
        // Use the exact computed similarity as the threshold so the test
        // pins the comparison direction, not float rounding.
        let exact = cosine_similarity(&[1.0, 0.0], &stored);
        let dedup = dedup_with(vec![1.0, 0.0], vec![fingerprint_with(stored, 5)]);

        let verdict = dedup.is_duplicate("candidate", 30, exact).await.unwrap();
        assert!(verdict.is_duplicate, "similarity {}", verdict.max_similarity);
        assert!(verdict.matched_id.is_some());
    }

    #[tokio::test]
    async fn similarity_just_below_threshold_is_not_duplicate() {
        let stored = vector_with_similarity(0.86);
        let exact = cosine_similarity(&[1.0, 0.0], &stored);
        let dedup = dedup_with(vec![1.0, 0.0], vec![fingerprint_with(stored, 5)]);

        let verdict = dedup
            .is_duplicate("candidate", 30, exact + 1e-9)
            .await
            .unwrap();
        assert!(!verdict.is_duplicate, "similarity {}", verdict.max_similarity);
        // Closest match still reported for diagnostics.
        assert!(verdict.matched_id.is_some());
    }

    #[tokio::test]
    async fn verdict_implies_similarity_at_least_threshold() {
        for target in [0.0_f32, 0.3, 0.5, 0.85, 0.86, 0.9, 1.0] {
            let dedup = dedup_with(
                vec![1.0, 0.0],
                vec![fingerprint_with(vector_with_similarity(target), 5)],
            );
            let verdict = dedup.is_duplicate("candidate", 30, 0.86).await.unwrap();
            if verdict.is_duplicate {
                assert!(verdict.max_similarity >= 0.86);
            }
        }
    }

    #[tokio::test]
    async fn old_fingerprints_outside_window_are_ignored() {
        let dedup = dedup_with(
            vec![1.0, 0.0],
            vec![fingerprint_with(vec![1.0, 0.0], 40)],
        );
        let verdict = dedup.is_duplicate("candidate", 30, 0.86).await.unwrap();
        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.max_similarity, 0.0);
    }

    #[tokio::test]
    async fn near_verbatim_copy_within_window_flagged() {
        // Fingerprint from 10 days ago, similarity ~0.95.
        let dedup = dedup_with(
            vec![1.0, 0.0],
            vec![fingerprint_with(vector_with_similarity(0.95), 10)],
        );
        let verdict = dedup.is_duplicate("candidate", 30, 0.86).await.unwrap();
        assert!(verdict.is_duplicate);
        assert!(verdict.max_similarity > 0.9);
    }

    #[tokio::test]
    async fn registered_text_is_its_own_duplicate() {
        let store = Arc::new(MemoryFingerprintStore::new());
        let dedup = Deduplicator::new(Arc::new(HashEmbedder), store);
        let text = "a long enough body of text about mesh routers and their \
            backhaul characteristics in larger homes";
        dedup.register("mesh routers", text).await.unwrap();

        let verdict = dedup.is_duplicate(text, 30, 0.86).await.unwrap();
        assert!(verdict.is_duplicate);
        assert!((verdict.max_similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn closest_of_many_is_reported() {
        let near = fingerprint_with(vector_with_similarity(0.9), 5);
        let near_id = near.id;
        let dedup = dedup_with(
            vec![1.0, 0.0],
            vec![fingerprint_with(vector_with_similarity(0.4), 5), near],
        );
        let verdict = dedup.is_duplicate("candidate", 30, 0.86).await.unwrap();
        assert_eq!(verdict.matched_id, Some(near_id));
    }
}
