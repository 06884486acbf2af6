use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 hex digest of text content. Stable identity for dedup keys,
/// image reuse counters, and change detection.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

// --- Candidate topics ---

/// Normalized demand/competition signals for one candidate keyword,
/// as delivered by the trend feed. All values are expected in [0,1];
/// a missing or NaN signal contributes nothing to the score and is
/// flagged as unavailable in the justification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TopicSignals {
    pub trend: Option<f64>,
    pub intent: Option<f64>,
    pub seasonality: Option<f64>,
    pub site_fit: Option<f64>,
    pub difficulty: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTopic {
    /// The keyword/phrase itself; the topic's identity.
    pub keyword: String,
    /// Descriptive attributes (e.g. "category" → "mesh router"). Drive the
    /// entity-coverage gate and image alt text.
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
    #[serde(default)]
    pub signals: TopicSignals,
}

// --- Opportunity scoring ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueMode {
    Max,
    Sum,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RevenueEstimate {
    pub ads_monthly: f64,
    pub affiliate_monthly: f64,
    /// Combination of the two channels per the configured [`RevenueMode`].
    pub combined_monthly: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityScore {
    pub keyword: String,
    /// Bounded to [0,100].
    pub score: f64,
    pub revenue: RevenueEstimate,
    /// Why selected: one string per notable sub-signal, deterministic.
    pub reasons: Vec<String>,
    /// Why not: populated only when `score` is below the selection threshold.
    pub rejections: Vec<String>,
}

impl OpportunityScore {
    pub fn is_selected(&self) -> bool {
        self.rejections.is_empty()
    }
}

// --- Documents ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Keyword of the topic this document answers.
    pub topic: String,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Markdown body.
    pub body: String,
}

impl Document {
    pub fn content_hash(&self) -> String {
        content_hash(&self.body)
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

// --- Quality reports ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    EntityCoverage,
    Depth,
    Citations,
    Compliance,
    Structure,
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Gate::EntityCoverage => "entity coverage",
            Gate::Depth => "depth/structure",
            Gate::Citations => "source citation",
            Gate::Compliance => "compliance scan",
            Gate::Structure => "technical structure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: Gate,
    pub passed: bool,
    /// Fraction in [0,1]. For hard-fail gates this is still reported for
    /// diagnostic ranking, but confers no partial credit.
    pub sub_score: f64,
    /// Each entry names the gate and the specific missing property.
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Always in fixed gate order, so identical inputs serialize identically.
    pub gates: Vec<GateResult>,
    pub passed: bool,
    /// Weighted average of gate sub-scores, reported even on failure.
    pub overall: f64,
}

impl QualityReport {
    pub fn failing_gates(&self) -> Vec<&GateResult> {
        self.gates.iter().filter(|g| !g.passed).collect()
    }

    pub fn diagnostics(&self) -> Vec<&str> {
        self.gates
            .iter()
            .flat_map(|g| g.diagnostics.iter().map(String::as_str))
            .collect()
    }
}

// --- Auto-fix attempts ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    CoverEntities { entities: Vec<String> },
    ExpandDepth { target_words: usize, missing_sections: Vec<String> },
    AddCitations { needed: usize },
    StripPhrases { phrases: Vec<String> },
    FixStructure { issues: Vec<String> },
}

impl std::fmt::Display for RepairAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairAction::CoverEntities { entities } => {
                write!(f, "cover entities: {}", entities.join(", "))
            }
            RepairAction::ExpandDepth { target_words, missing_sections } => {
                write!(f, "expand to {target_words} words, add sections: {}", missing_sections.join(", "))
            }
            RepairAction::AddCitations { needed } => write!(f, "add {needed} citation(s)"),
            RepairAction::StripPhrases { phrases } => {
                write!(f, "strip phrases: {}", phrases.join(", "))
            }
            RepairAction::FixStructure { issues } => {
                write!(f, "fix structure: {}", issues.join("; "))
            }
        }
    }
}

/// One iteration of a topic's auto-fix loop: the document as evaluated,
/// the report it produced, and the repairs applied afterwards (empty on
/// terminal attempts). Append-only; retained in full for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAttempt {
    pub attempt: u32,
    pub document: Document,
    pub report: QualityReport,
    pub repairs: Vec<RepairAction>,
}

// --- Fingerprints / dedup ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub id: Uuid,
    /// Keyword of the approved document this fingerprint belongs to.
    pub topic: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DedupVerdict {
    /// Invariant: true implies `max_similarity >= threshold`.
    pub is_duplicate: bool,
    pub max_similarity: f64,
    pub matched_id: Option<Uuid>,
}

impl DedupVerdict {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            max_similarity: 0.0,
            matched_id: None,
        }
    }
}

// --- Image assignment ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Provider { name: String, license: String },
    Cache,
    Generated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedImage {
    /// Source URL for provider images, local path for cache/generated ones.
    pub url: String,
    /// Content-hash key into the usage ledger.
    pub content_key: String,
    pub provenance: Provenance,
    pub alt_text: String,
}

impl AssignedImage {
    pub fn is_generated(&self) -> bool {
        matches!(self.provenance, Provenance::Generated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAssignment {
    pub document_id: Uuid,
    pub hero: AssignedImage,
    pub inline: Vec<AssignedImage>,
}

// --- Terminal outcomes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Published,
    /// Below the selection threshold at scoring time.
    Rejected,
    /// Near-duplicate of a fingerprinted document; dropped without repair.
    Duplicate,
    /// Attempt budget spent without passing every gate.
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicOutcome {
    pub topic: String,
    pub kind: OutcomeKind,
    /// Operator-facing detail: the specific gate diagnostics or dedup match,
    /// never a generic "failed".
    pub detail: String,
    pub score: Option<OpportunityScore>,
    /// Overall quality of the final attempt, when one was checked.
    pub quality: Option<f64>,
    pub attempts: Vec<GenerationAttempt>,
}
