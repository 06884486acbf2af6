use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GreenlightError;
use crate::types::RevenueMode;

/// Full pipeline configuration. Every field has a usable default; a config
/// file overrides selectively. `validate()` runs once at startup, so no
/// topic is processed with an out-of-range threshold or weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenlightConfig {
    pub scorer: ScorerConfig,
    pub revenue: RevenueConfig,
    pub dedup: DedupConfig,
    pub quality: QualityConfig,
    pub images: ImageConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub w_trend: f64,
    pub w_intent: f64,
    pub w_seasonality: f64,
    pub w_site_fit: f64,
    /// Difficulty penalty factor p_D in [0,1].
    pub difficulty_penalty: f64,
    /// Minimum score (0-100) for a topic to be worth producing.
    pub selection_threshold: f64,
    /// A sub-signal at or above this value is called out in the
    /// "why selected" justification.
    pub notable_signal: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            w_trend: 0.35,
            w_intent: 0.30,
            w_seasonality: 0.15,
            w_site_fit: 0.20,
            difficulty_penalty: 0.6,
            selection_threshold: 70.0,
            notable_signal: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueConfig {
    pub mode: RevenueMode,
    /// Monthly impressions a maximally trending topic would draw.
    pub base_monthly_impressions: f64,
    /// Ads channel: impressions × ctr × rpm / 1000.
    pub ctr: f64,
    pub rpm: f64,
    /// Affiliate channel: impressions × click_rate × conversion × commission.
    pub click_rate: f64,
    pub conversion_rate: f64,
    pub avg_commission: f64,
}

impl Default for RevenueConfig {
    fn default() -> Self {
        Self {
            mode: RevenueMode::Max,
            base_monthly_impressions: 20_000.0,
            ctr: 0.25,
            rpm: 12.0,
            click_rate: 0.08,
            conversion_rate: 0.03,
            avg_commission: 18.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Cosine similarity at or above this is a duplicate. 0.86 flags
    /// near-paraphrases while allowing distinct articles on related
    /// subtopics.
    pub threshold: f64,
    /// Fingerprints older than this are excluded from comparison.
    pub window_days: i64,
    /// Texts shorter than this are rejected upstream; embeddings of
    /// trivial text are unreliable.
    pub min_text_chars: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.86,
            window_days: 30,
            min_text_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Fraction of required entities that must appear (default 0.85).
    pub min_entity_coverage: f64,
    pub min_words: usize,
    /// Minimum distinct `##` sections.
    pub min_sections: usize,
    /// Minimum distinct external reference domains. Hard fail below.
    pub min_citation_domains: usize,
    /// Disallowed claim phrases; any match is an immediate hard fail.
    pub blocked_phrases: Vec<String>,
    /// Recognized synonyms per entity term (keys lowercase).
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Citable reference URLs the repair step may inject when the
    /// citation gate fails.
    pub reference_sources: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_entity_coverage: 0.85,
            min_words: 900,
            min_sections: 4,
            min_citation_domains: 2,
            blocked_phrases: vec![
                "we tested every".to_string(),
                "guaranteed best".to_string(),
                "scientifically proven to".to_string(),
                "#1 rated by experts".to_string(),
            ],
            synonyms: BTreeMap::new(),
            reference_sources: vec![
                "https://en.wikipedia.org/wiki/Main_Page".to_string(),
                "https://www.consumerreports.org/".to_string(),
                "https://www.ieee.org/".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Inline image slots per document (hero is always exactly one).
    pub inline_slots: usize,
    /// Maximum times one non-generated image may be reused across the corpus.
    pub reuse_cap: u32,
    /// Minimum query/metadata similarity to keep a provider candidate.
    /// Deliberately low-precision; the cascade is fallback-rich.
    pub rank_threshold: f64,
    /// License-cleared local images, organized as cache_dir/<category>/*.
    pub cache_dir: PathBuf,
    pub provider_timeout_secs: u64,
    pub provider_retries: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            inline_slots: 3,
            reuse_cap: 3,
            rank_threshold: 0.25,
            cache_dir: PathBuf::from("image-cache"),
            provider_timeout_secs: 20,
            provider_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Auto-fix attempt budget per topic.
    pub max_attempts: u32,
    /// Concurrent topic loops.
    pub concurrency: usize,
    /// Directory of pre-generated drafts, one `<slug>.json` per topic.
    pub drafts_dir: PathBuf,
    /// Approved documents and their image assignments land here.
    pub out_dir: PathBuf,
    /// JSONL fingerprint ledger. None = in-memory only.
    pub fingerprint_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            concurrency: 4,
            drafts_dir: PathBuf::from("drafts"),
            out_dir: PathBuf::from("published"),
            fingerprint_path: None,
        }
    }
}

impl Default for GreenlightConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            revenue: RevenueConfig::default(),
            dedup: DedupConfig::default(),
            quality: QualityConfig::default(),
            images: ImageConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl GreenlightConfig {
    /// Load from a JSON file, falling back to defaults for absent fields.
    pub fn from_file(path: &Path) -> Result<Self, GreenlightError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GreenlightError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| GreenlightError::Config(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Reject out-of-range values before any topic is processed.
    pub fn validate(&self) -> Result<(), GreenlightError> {
        let s = &self.scorer;
        for (name, w) in [
            ("w_trend", s.w_trend),
            ("w_intent", s.w_intent),
            ("w_seasonality", s.w_seasonality),
            ("w_site_fit", s.w_site_fit),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(GreenlightError::Config(format!(
                    "scorer weight {name} must be finite and >= 0, got {w}"
                )));
            }
        }
        if s.w_trend + s.w_intent + s.w_seasonality + s.w_site_fit <= 0.0 {
            return Err(GreenlightError::Config(
                "scorer weights must not all be zero".to_string(),
            ));
        }
        check_unit("scorer.difficulty_penalty", s.difficulty_penalty)?;
        check_unit("scorer.notable_signal", s.notable_signal)?;
        if !(0.0..=100.0).contains(&s.selection_threshold) {
            return Err(GreenlightError::Config(format!(
                "scorer.selection_threshold must be in [0,100], got {}",
                s.selection_threshold
            )));
        }

        for (name, v) in [
            ("revenue.base_monthly_impressions", self.revenue.base_monthly_impressions),
            ("revenue.ctr", self.revenue.ctr),
            ("revenue.rpm", self.revenue.rpm),
            ("revenue.click_rate", self.revenue.click_rate),
            ("revenue.conversion_rate", self.revenue.conversion_rate),
            ("revenue.avg_commission", self.revenue.avg_commission),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(GreenlightError::Config(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }

        check_unit("dedup.threshold", self.dedup.threshold)?;
        if self.dedup.window_days <= 0 {
            return Err(GreenlightError::Config(format!(
                "dedup.window_days must be > 0, got {}",
                self.dedup.window_days
            )));
        }

        check_unit("quality.min_entity_coverage", self.quality.min_entity_coverage)?;
        check_unit("images.rank_threshold", self.images.rank_threshold)?;

        if self.images.inline_slots == 0 {
            return Err(GreenlightError::Config(
                "images.inline_slots must be >= 1".to_string(),
            ));
        }
        if self.images.reuse_cap == 0 {
            return Err(GreenlightError::Config(
                "images.reuse_cap must be >= 1".to_string(),
            ));
        }
        if self.run.max_attempts == 0 {
            return Err(GreenlightError::Config(
                "run.max_attempts must be >= 1".to_string(),
            ));
        }
        if self.run.concurrency == 0 {
            return Err(GreenlightError::Config(
                "run.concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_unit(name: &str, v: f64) -> Result<(), GreenlightError> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(GreenlightError::Config(format!(
            "{name} must be in [0,1], got {v}"
        )));
    }
    Ok(())
}

/// API keys read from the environment. All optional: the pipeline
/// degrades to the local embedder and the keyless/generated image path.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub embed_api_key: Option<String>,
    pub embed_base_url: Option<String>,
    pub embed_model: Option<String>,
    pub pexels_api_key: Option<String>,
}

impl ProviderKeys {
    pub fn from_env() -> Self {
        Self {
            embed_api_key: env::var("EMBED_API_KEY").ok(),
            embed_base_url: env::var("EMBED_BASE_URL").ok(),
            embed_model: env::var("EMBED_MODEL").ok(),
            pexels_api_key: env::var("PEXELS_API_KEY").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GreenlightConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = GreenlightConfig::default();
        config.scorer.w_trend = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_above_one_rejected() {
        let mut config = GreenlightConfig::default();
        config.dedup.threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempt_budget_rejected() {
        let mut config = GreenlightConfig::default();
        config.run.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn all_zero_weights_rejected() {
        let mut config = GreenlightConfig::default();
        config.scorer.w_trend = 0.0;
        config.scorer.w_intent = 0.0;
        config.scorer.w_seasonality = 0.0;
        config.scorer.w_site_fit = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_penalty_rejected() {
        let mut config = GreenlightConfig::default();
        config.scorer.difficulty_penalty = f64::NAN;
        assert!(config.validate().is_err());
    }
}
