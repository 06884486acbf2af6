//! Pipeline runner: scores, drafts, auto-fixes, deduplicates, assigns
//! imagery, and publishes each candidate topic, with a bounded number of
//! topics in flight at once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use greenlight_common::{
    CandidateTopic, Document, GreenlightConfig, ImageAssignment, OutcomeKind, TopicOutcome,
};

use crate::autofix::{AutoFixController, AutoFixState};
use crate::dedup::Deduplicator;
use crate::images::ImagePipeline;
use crate::notify::Notifier;
use crate::quality::RequirementSpec;
use crate::scorer;
use crate::stats::RunReport;
use crate::util::slugify;

/// Per-call timeout on the draft generator. Drafting may sit on a slow
/// model endpoint; a hung call must not stall its topic loop forever.
const DRAFT_TIMEOUT: Duration = Duration::from_secs(120);
const DRAFT_ATTEMPTS: u32 = 3;
/// Base backoff between draft attempts; actual delay is base * 3^attempt
/// plus random jitter (0-500ms).
const DRAFT_RETRY_BASE: Duration = Duration::from_millis(500);

// --- Seams ---

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn draft(&self, topic: &CandidateTopic) -> Result<Document>;
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, document: &Document, images: &ImageAssignment) -> Result<()>;
}

// --- File-backed implementations ---

#[derive(Deserialize)]
struct DraftFile {
    title: String,
    category: String,
    #[serde(default)]
    tags: Vec<String>,
    body: String,
}

/// Reads pre-generated drafts from `<dir>/<keyword-slug>.json`.
pub struct FileDrafter {
    dir: PathBuf,
}

impl FileDrafter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl DraftGenerator for FileDrafter {
    async fn draft(&self, topic: &CandidateTopic) -> Result<Document> {
        let path = self.dir.join(format!("{}.json", slugify(&topic.keyword)));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading draft {}", path.display()))?;
        let draft: DraftFile =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Document {
            id: Uuid::new_v4(),
            topic: topic.keyword.clone(),
            title: draft.title,
            category: draft.category,
            tags: draft.tags,
            body: draft.body,
        })
    }
}

/// Writes approved documents and their image manifests as JSON files.
pub struct DirPublisher {
    out_dir: PathBuf,
}

impl DirPublisher {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Publisher for DirPublisher {
    async fn publish(&self, document: &Document, images: &ImageAssignment) -> Result<()> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let slug = slugify(&document.topic);

        let doc_path = self.out_dir.join(format!("{slug}.json"));
        let doc_json = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&doc_path, doc_json)
            .await
            .with_context(|| format!("writing {}", doc_path.display()))?;

        let images_path = self.out_dir.join(format!("{slug}.images.json"));
        let images_json = serde_json::to_string_pretty(images)?;
        tokio::fs::write(&images_path, images_json)
            .await
            .with_context(|| format!("writing {}", images_path.display()))?;
        Ok(())
    }
}

/// Dry-run publisher: logs what would be written and drops it.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, document: &Document, images: &ImageAssignment) -> Result<()> {
        info!(
            topic = document.topic.as_str(),
            words = document.word_count(),
            inline_images = images.inline.len(),
            "Dry run, skipping publication"
        );
        Ok(())
    }
}

// --- Runner ---

pub struct PipelineRunner {
    config: GreenlightConfig,
    dedup: Deduplicator,
    images: ImagePipeline,
    drafter: Arc<dyn DraftGenerator>,
    publisher: Arc<dyn Publisher>,
    notifier: Arc<dyn Notifier>,
    cancel: Arc<AtomicBool>,
}

impl PipelineRunner {
    pub fn new(
        config: GreenlightConfig,
        dedup: Deduplicator,
        images: ImagePipeline,
        drafter: Arc<dyn DraftGenerator>,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            dedup,
            images,
            drafter,
            publisher,
            notifier,
            cancel,
        }
    }

    pub async fn run(&self, topics: Vec<CandidateTopic>) -> Result<RunReport> {
        info!(
            topics = topics.len(),
            concurrency = self.config.run.concurrency,
            "Starting pipeline run"
        );

        let outcomes: Vec<TopicOutcome> = stream::iter(topics)
            .map(|topic| self.process_topic(topic))
            .buffer_unordered(self.config.run.concurrency.max(1))
            .collect()
            .await;

        let mut report = RunReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }

        self.notifier.run_complete(&report).await?;
        Ok(report)
    }

    async fn process_topic(&self, topic: CandidateTopic) -> TopicOutcome {
        if self.cancel.load(Ordering::Relaxed) {
            return TopicOutcome {
                topic: topic.keyword.clone(),
                kind: OutcomeKind::Cancelled,
                detail: "run cancelled before processing".to_string(),
                score: None,
                quality: None,
                attempts: vec![],
            };
        }

        let score = scorer::score(&topic, &self.config.scorer, &self.config.revenue);
        if !score.is_selected() {
            info!(
                topic = topic.keyword.as_str(),
                score = score.score,
                "Topic below selection threshold"
            );
            return TopicOutcome {
                topic: topic.keyword.clone(),
                kind: OutcomeKind::Rejected,
                detail: score.rejections.join("; "),
                score: Some(score),
                quality: None,
                attempts: vec![],
            };
        }

        let document = match self.draft_with_retry(&topic).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(topic = topic.keyword.as_str(), error = %e, "Draft generation failed");
                return TopicOutcome {
                    topic: topic.keyword.clone(),
                    kind: OutcomeKind::Exhausted,
                    detail: format!("draft generator unavailable: {e:#}"),
                    score: Some(score),
                    quality: None,
                    attempts: vec![],
                };
            }
        };

        let requirements = RequirementSpec::for_topic(&self.config.quality, &topic);
        let controller = AutoFixController::new(
            &self.dedup,
            &self.config.dedup,
            self.config.run.max_attempts,
        );
        let outcome = match controller.run(&requirements, document, &self.cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(topic = topic.keyword.as_str(), error = %e, "Auto-fix loop failed");
                return TopicOutcome {
                    topic: topic.keyword.clone(),
                    kind: OutcomeKind::Exhausted,
                    detail: format!("auto-fix loop error: {e:#}"),
                    score: Some(score),
                    quality: None,
                    attempts: vec![],
                };
            }
        };

        let quality = outcome.attempts.last().map(|a| a.report.overall);
        let (kind, detail) = match outcome.state {
            AutoFixState::Passed => {
                match self.approve(&topic, &outcome.document).await {
                    Ok(()) => (OutcomeKind::Published, "all gates passed".to_string()),
                    Err(e) => {
                        warn!(topic = topic.keyword.as_str(), error = %e, "Publication failed");
                        (
                            OutcomeKind::Exhausted,
                            format!("publication failed: {e:#}"),
                        )
                    }
                }
            }
            AutoFixState::Duplicate => (
                OutcomeKind::Duplicate,
                match outcome.dedup.matched_id {
                    Some(id) => format!(
                        "similarity {:.3} to fingerprint {id}",
                        outcome.dedup.max_similarity
                    ),
                    None => format!("similarity {:.3}", outcome.dedup.max_similarity),
                },
            ),
            AutoFixState::Exhausted => {
                let diagnostics = outcome
                    .attempts
                    .last()
                    .map(|a| a.report.diagnostics().join("; "))
                    .unwrap_or_default();
                (OutcomeKind::Exhausted, diagnostics)
            }
            AutoFixState::Cancelled => (
                OutcomeKind::Cancelled,
                "run cancelled mid-loop".to_string(),
            ),
            state => (
                OutcomeKind::Exhausted,
                format!("loop stopped in non-terminal state {state:?}"),
            ),
        };

        TopicOutcome {
            topic: topic.keyword.clone(),
            kind,
            detail,
            score: Some(score),
            quality,
            attempts: outcome.attempts,
        }
    }

    /// Fingerprint registration precedes publication so a publish crash
    /// can never leave an unfingerprinted document live.
    async fn approve(&self, topic: &CandidateTopic, document: &Document) -> Result<()> {
        self.dedup
            .register(&topic.keyword, &document.body)
            .await
            .context("registering fingerprint")?;
        let images = self
            .images
            .assign(&topic.keyword, &topic.entities, document.id)
            .await
            .context("assigning images")?;
        if let Err(e) = self.publisher.publish(document, &images).await {
            // The images never reached the corpus; give their reuse
            // quota back.
            self.images.release(&images);
            return Err(e).context("publishing document");
        }
        info!(topic = topic.keyword.as_str(), "Published");
        Ok(())
    }

    /// Draft with per-call timeout and bounded retry, same discipline as
    /// the image provider path. Returns the last error once the attempt
    /// budget is spent.
    async fn draft_with_retry(&self, topic: &CandidateTopic) -> Result<Document> {
        let mut last_err = anyhow!("draft generator never called");
        for attempt in 0..DRAFT_ATTEMPTS {
            match tokio::time::timeout(DRAFT_TIMEOUT, self.drafter.draft(topic)).await {
                Ok(Ok(doc)) => return Ok(doc),
                Ok(Err(e)) => {
                    warn!(topic = topic.keyword.as_str(), attempt, error = %e, "Draft failed");
                    last_err = e;
                }
                Err(_) => {
                    warn!(topic = topic.keyword.as_str(), attempt, "Draft timed out");
                    last_err = anyhow!(
                        "draft timed out after {}s",
                        DRAFT_TIMEOUT.as_secs()
                    );
                }
            }
            if attempt + 1 < DRAFT_ATTEMPTS {
                let backoff = DRAFT_RETRY_BASE * 3u32.pow(attempt);
                let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                tokio::time::sleep(backoff + jitter).await;
            }
        }
        Err(last_err)
    }
}
