//! Auto-fix controller: an explicit finite state machine per topic,
//! `Drafted → Checking → {Passed, Repairing → Checking, Duplicate,
//! Exhausted}`, with a bounded attempt counter. The counter increments on
//! every Checking pass and Repairing always leads back to Checking, so
//! termination is structural, not incidental.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use greenlight_common::{
    DedupConfig, DedupVerdict, Document, GenerationAttempt, QualityReport,
};

use crate::dedup::Deduplicator;
use crate::quality::{self, RequirementSpec};
use crate::repair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoFixState {
    Drafted,
    Checking,
    Repairing,
    /// Terminal: every gate passed; document is publishable.
    Passed,
    /// Terminal: near-duplicate of prior output. No repair attempted;
    /// duplication is structural and a text patch cannot fix it safely.
    Duplicate,
    /// Terminal: attempt budget spent without passing.
    Exhausted,
    /// Terminal: operator abort mid-loop; history retained, nothing
    /// registered.
    Cancelled,
}

impl AutoFixState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AutoFixState::Passed
                | AutoFixState::Duplicate
                | AutoFixState::Exhausted
                | AutoFixState::Cancelled
        )
    }
}

#[derive(Debug)]
pub struct AutoFixOutcome {
    /// Always a terminal state.
    pub state: AutoFixState,
    /// Full append-only history, retained for diagnostics on every path.
    pub attempts: Vec<GenerationAttempt>,
    /// The document as of the last attempt (publishable iff `Passed`).
    pub document: Document,
    pub dedup: DedupVerdict,
}

pub struct AutoFixController<'a> {
    dedup: &'a Deduplicator,
    dedup_config: &'a DedupConfig,
    max_attempts: u32,
}

impl<'a> AutoFixController<'a> {
    pub fn new(
        dedup: &'a Deduplicator,
        dedup_config: &'a DedupConfig,
        max_attempts: u32,
    ) -> Self {
        Self {
            dedup,
            dedup_config,
            max_attempts,
        }
    }

    pub async fn run(
        &self,
        requirements: &RequirementSpec,
        mut document: Document,
        cancel: &AtomicBool,
    ) -> Result<AutoFixOutcome> {
        let mut state = AutoFixState::Drafted;
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut dedup_verdict = DedupVerdict::unique();
        let mut last_report: Option<QualityReport> = None;
        let mut attempt = 0u32;

        loop {
            if state.is_terminal() {
                break;
            }
            if cancel.load(Ordering::Relaxed) {
                state = AutoFixState::Cancelled;
                break;
            }

            state = match state {
                AutoFixState::Drafted => AutoFixState::Checking,

                AutoFixState::Checking => {
                    attempt += 1;

                    // Trivially short texts are not worth embedding; the
                    // depth gate rejects them anyway.
                    if document.body.chars().count() >= self.dedup_config.min_text_chars {
                        dedup_verdict = self
                            .dedup
                            .is_duplicate(
                                &document.body,
                                self.dedup_config.window_days,
                                self.dedup_config.threshold,
                            )
                            .await?;
                    }
                    if dedup_verdict.is_duplicate {
                        info!(
                            topic = document.topic.as_str(),
                            similarity = dedup_verdict.max_similarity,
                            "Duplicate of prior output, dropping without repair"
                        );
                        AutoFixState::Duplicate
                    } else {
                        let report = quality::check(&document, requirements);
                        debug!(
                            topic = document.topic.as_str(),
                            attempt,
                            passed = report.passed,
                            overall = report.overall,
                            "Quality gate check"
                        );
                        let next = if report.passed {
                            AutoFixState::Passed
                        } else if attempt >= self.max_attempts {
                            AutoFixState::Exhausted
                        } else {
                            AutoFixState::Repairing
                        };
                        attempts.push(GenerationAttempt {
                            attempt,
                            document: document.clone(),
                            report: report.clone(),
                            repairs: vec![],
                        });
                        last_report = Some(report);
                        next
                    }
                }

                AutoFixState::Repairing => {
                    let report = last_report
                        .take()
                        .unwrap_or_else(|| quality::check(&document, requirements));
                    let actions = repair::repair(&mut document, requirements, &report);
                    debug!(
                        topic = document.topic.as_str(),
                        attempt,
                        repairs = actions.len(),
                        "Applied targeted repairs"
                    );
                    if let Some(last) = attempts.last_mut() {
                        last.repairs = actions;
                    }
                    AutoFixState::Checking
                }

                terminal => terminal,
            };
        }

        Ok(AutoFixOutcome {
            state,
            attempts,
            document,
            dedup: dedup_verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::dedup::{HashEmbedder, MemoryFingerprintStore};
    use crate::quality::tests::{passing_document, requirements};

    fn dedup() -> Deduplicator {
        Deduplicator::new(Arc::new(HashEmbedder), Arc::new(MemoryFingerprintStore::new()))
    }

    fn unset() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[tokio::test]
    async fn passing_document_terminates_in_one_attempt() {
        let dedup = dedup();
        let config = DedupConfig::default();
        let controller = AutoFixController::new(&dedup, &config, 5);

        let outcome = controller
            .run(&requirements(), passing_document(), &unset())
            .await
            .unwrap();
        assert_eq!(outcome.state, AutoFixState::Passed);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].repairs.is_empty());
    }

    #[tokio::test]
    async fn missing_citation_repaired_on_second_attempt() {
        let dedup = dedup();
        let config = DedupConfig::default();
        let controller = AutoFixController::new(&dedup, &config, 5);

        let mut doc = passing_document();
        doc.body = doc.body.replace("https://www.ieee.org/", "#");

        let outcome = controller
            .run(&requirements(), doc, &unset())
            .await
            .unwrap();
        assert_eq!(outcome.state, AutoFixState::Passed);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].report.passed);
        assert!(!outcome.attempts[0].repairs.is_empty());
        assert!(outcome.attempts[1].report.passed);
    }

    #[tokio::test]
    async fn unfixable_document_exhausts_at_exactly_max_attempts() {
        let dedup = dedup();
        let config = DedupConfig::default();
        let max_attempts = 5;
        let controller = AutoFixController::new(&dedup, &config, max_attempts);

        // The required entity is itself a blocklisted phrase: covering it
        // trips compliance, stripping it breaks coverage. No fixed point.
        let mut req = requirements();
        req.required_entities = BTreeMap::from([("guaranteed best".to_string(), vec![])]);
        req.min_entity_coverage = 1.0;
        req.blocked_phrases = vec!["guaranteed best".to_string()];

        let outcome = controller
            .run(&req, passing_document(), &unset())
            .await
            .unwrap();
        assert_eq!(outcome.state, AutoFixState::Exhausted);
        assert_eq!(outcome.attempts.len(), max_attempts as usize);
        for attempt in &outcome.attempts {
            assert!(!attempt.report.passed);
        }
    }

    #[tokio::test]
    async fn duplicate_is_terminal_without_repair() {
        let store = Arc::new(MemoryFingerprintStore::new());
        let dedup = Deduplicator::new(Arc::new(HashEmbedder), store);
        let doc = passing_document();
        dedup.register(&doc.topic, &doc.body).await.unwrap();

        let config = DedupConfig {
            min_text_chars: 50,
            ..DedupConfig::default()
        };
        let controller = AutoFixController::new(&dedup, &config, 5);
        let outcome = controller
            .run(&requirements(), doc, &unset())
            .await
            .unwrap();

        assert_eq!(outcome.state, AutoFixState::Duplicate);
        assert!(outcome.attempts.is_empty());
        assert!(outcome.dedup.is_duplicate);
        assert!(outcome.dedup.max_similarity >= config.threshold);
    }

    #[tokio::test]
    async fn cancellation_preserves_history_and_stops() {
        let dedup = dedup();
        let config = DedupConfig::default();
        let controller = AutoFixController::new(&dedup, &config, 5);

        let cancel = AtomicBool::new(true);
        let outcome = controller
            .run(&requirements(), passing_document(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.state, AutoFixState::Cancelled);
        assert!(outcome.attempts.is_empty());
    }
}
