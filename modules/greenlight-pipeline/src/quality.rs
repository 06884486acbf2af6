//! Hard-gate quality checker. Five independent structural/compliance
//! gates; a document publishes only if every gate passes. No I/O and no
//! randomness, so the same document against the same requirements always
//! yields a byte-identical report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use greenlight_common::{
    CandidateTopic, Document, Gate, GateResult, QualityConfig, QualityReport,
};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s)\]"'>]+"#).unwrap());
static FAQ_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^##+\s+.*\b(faq|frequently asked)").unwrap());

/// Gate weights for the overall diagnostic score. Coverage and depth
/// dominate; the hard-fail gates still contribute so a clean document
/// ranks above one that scraped past them.
const GATE_WEIGHTS: [(Gate, f64); 5] = [
    (Gate::EntityCoverage, 0.30),
    (Gate::Depth, 0.25),
    (Gate::Citations, 0.15),
    (Gate::Compliance, 0.15),
    (Gate::Structure, 0.15),
];

/// Per-topic requirements: global thresholds from [`QualityConfig`] plus
/// the topic's own required entities with recognized synonyms.
#[derive(Debug, Clone)]
pub struct RequirementSpec {
    /// Entity term → accepted synonyms (the term itself always matches).
    /// BTreeMap keeps diagnostics in a stable order.
    pub required_entities: BTreeMap<String, Vec<String>>,
    pub min_entity_coverage: f64,
    pub min_words: usize,
    pub min_sections: usize,
    pub min_citation_domains: usize,
    pub blocked_phrases: Vec<String>,
    /// Citable URLs the repair step may inject.
    pub reference_sources: Vec<String>,
}

impl RequirementSpec {
    pub fn for_topic(config: &QualityConfig, topic: &CandidateTopic) -> Self {
        let required_entities = topic
            .entities
            .values()
            .map(|term| {
                let term = term.to_lowercase();
                let synonyms = config.synonyms.get(&term).cloned().unwrap_or_default();
                (term, synonyms)
            })
            .collect();
        Self {
            required_entities,
            min_entity_coverage: config.min_entity_coverage,
            min_words: config.min_words,
            min_sections: config.min_sections,
            min_citation_domains: config.min_citation_domains,
            blocked_phrases: config.blocked_phrases.clone(),
            reference_sources: config.reference_sources.clone(),
        }
    }
}

/// Run the full gate battery.
pub fn check(document: &Document, requirements: &RequirementSpec) -> QualityReport {
    let gates = vec![
        check_entity_coverage(document, requirements),
        check_depth(document, requirements),
        check_citations(document, requirements),
        check_compliance(document, requirements),
        check_structure(document),
    ];

    let passed = gates.iter().all(|g| g.passed);
    let weight_sum: f64 = GATE_WEIGHTS.iter().map(|(_, w)| w).sum();
    let overall = gates
        .iter()
        .zip(GATE_WEIGHTS.iter())
        .map(|(g, (_, w))| g.sub_score * w)
        .sum::<f64>()
        / weight_sum;

    QualityReport {
        gates,
        passed,
        overall,
    }
}

/// Entity terms from `requirements` with no literal or synonym match in
/// the body. Used by both the coverage gate and the targeted repair.
pub fn missing_entities(document: &Document, requirements: &RequirementSpec) -> Vec<String> {
    let body = document.body.to_lowercase();
    requirements
        .required_entities
        .iter()
        .filter(|(term, synonyms)| {
            !body.contains(term.as_str()) && !synonyms.iter().any(|s| body.contains(&s.to_lowercase()))
        })
        .map(|(term, _)| term.clone())
        .collect()
}

fn check_entity_coverage(document: &Document, requirements: &RequirementSpec) -> GateResult {
    let required = requirements.required_entities.len();
    if required == 0 {
        return GateResult {
            gate: Gate::EntityCoverage,
            passed: true,
            sub_score: 1.0,
            diagnostics: vec![],
        };
    }

    let missing = missing_entities(document, requirements);
    let coverage = (required - missing.len()) as f64 / required as f64;
    let passed = coverage >= requirements.min_entity_coverage;
    let diagnostics = if passed {
        vec![]
    } else {
        vec![format!(
            "entity coverage {:.0}% < {:.0}% minimum (missing: {})",
            coverage * 100.0,
            requirements.min_entity_coverage * 100.0,
            missing.join(", ")
        )]
    };
    GateResult {
        gate: Gate::EntityCoverage,
        passed,
        sub_score: coverage,
        diagnostics,
    }
}

fn check_depth(document: &Document, requirements: &RequirementSpec) -> GateResult {
    let words = document.word_count();
    let sections = section_count(&document.body);

    let mut diagnostics = Vec::new();
    if words < requirements.min_words {
        diagnostics.push(format!(
            "word count {words} < {} minimum",
            requirements.min_words
        ));
    }
    if sections < requirements.min_sections {
        diagnostics.push(format!(
            "section count {sections} < {} minimum",
            requirements.min_sections
        ));
    }

    let word_ratio = if requirements.min_words == 0 {
        1.0
    } else {
        (words as f64 / requirements.min_words as f64).min(1.0)
    };
    let section_ratio = if requirements.min_sections == 0 {
        1.0
    } else {
        (sections as f64 / requirements.min_sections as f64).min(1.0)
    };

    GateResult {
        gate: Gate::Depth,
        passed: diagnostics.is_empty(),
        sub_score: word_ratio.min(section_ratio),
        diagnostics,
    }
}

fn check_citations(document: &Document, requirements: &RequirementSpec) -> GateResult {
    let domains = citation_domains(&document.body);
    let found = domains.len();
    let needed = requirements.min_citation_domains;
    // Hard fail: no partial credit toward passing, but the ratio is still
    // reported for diagnostic ranking.
    let passed = found >= needed;
    let sub_score = if needed == 0 {
        1.0
    } else {
        (found as f64 / needed as f64).min(1.0)
    };
    let diagnostics = if passed {
        vec![]
    } else {
        vec![format!(
            "distinct citation domains {found} < {needed} minimum (found: {})",
            domains.into_iter().collect::<Vec<_>>().join(", ")
        )]
    };
    GateResult {
        gate: Gate::Citations,
        passed,
        sub_score,
        diagnostics,
    }
}

fn check_compliance(document: &Document, requirements: &RequirementSpec) -> GateResult {
    // Lowercased scan keeps newline positions intact, so line numbers are
    // computed on the lowered copy.
    let body = document.body.to_lowercase();
    let mut diagnostics = Vec::new();
    for phrase in &requirements.blocked_phrases {
        let phrase_lower = phrase.to_lowercase();
        if phrase_lower.is_empty() {
            continue;
        }
        for (idx, _) in body.match_indices(&phrase_lower) {
            let line = body[..idx].matches('\n').count() + 1;
            diagnostics.push(format!("blocklisted phrase \"{phrase}\" at line {line}"));
        }
    }
    let passed = diagnostics.is_empty();
    GateResult {
        gate: Gate::Compliance,
        passed,
        sub_score: if passed { 1.0 } else { 0.0 },
        diagnostics,
    }
}

fn check_structure(document: &Document) -> GateResult {
    let h1 = document
        .body
        .lines()
        .filter(|l| l.starts_with("# "))
        .count();
    let h2 = document
        .body
        .lines()
        .filter(|l| l.starts_with("## "))
        .count();
    let has_faq = FAQ_HEADING_RE.is_match(&document.body);

    let mut diagnostics = Vec::new();
    if h1 != 1 {
        diagnostics.push(format!("expected exactly one primary heading, found {h1}"));
    }
    if h2 == 0 {
        diagnostics.push("no secondary headings".to_string());
    }
    if !has_faq {
        diagnostics.push("missing question-answer block".to_string());
    }

    let checks_passed = [h1 == 1, h2 > 0, has_faq].iter().filter(|c| **c).count();
    GateResult {
        gate: Gate::Structure,
        passed: diagnostics.is_empty(),
        sub_score: checks_passed as f64 / 3.0,
        diagnostics,
    }
}

/// Distinct external reference domains cited in the body, `www.` stripped.
pub fn citation_domains(body: &str) -> BTreeSet<String> {
    URL_RE
        .find_iter(body)
        .filter_map(|m| url::Url::parse(m.as_str()).ok())
        .filter_map(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|host| host.strip_prefix("www.").unwrap_or(&host).to_string())
        .collect()
}

pub(crate) fn has_faq(body: &str) -> bool {
    FAQ_HEADING_RE.is_match(body)
}

/// Count of distinct `##` sections (sub-sub-headings excluded).
pub fn section_count(body: &str) -> usize {
    body.lines().filter(|l| l.starts_with("## ")).count()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use greenlight_common::TopicSignals;
    use uuid::Uuid;

    pub(crate) fn router_topic() -> CandidateTopic {
        let mut entities = BTreeMap::new();
        entities.insert("category".to_string(), "mesh router".to_string());
        entities.insert("protocol".to_string(), "wifi 7".to_string());
        entities.insert("use case".to_string(), "large homes".to_string());
        CandidateTopic {
            keyword: "best mesh wifi systems".to_string(),
            entities,
            signals: TopicSignals::default(),
        }
    }

    pub(crate) fn requirements() -> RequirementSpec {
        let mut config = QualityConfig::default();
        config.min_words = 40;
        config.min_sections = 2;
        RequirementSpec::for_topic(&config, &router_topic())
    }

    pub(crate) fn passing_document() -> Document {
        Document {
            id: Uuid::new_v4(),
            topic: "best mesh wifi systems".to_string(),
            title: "Best Mesh WiFi Systems".to_string(),
            category: "networking".to_string(),
            tags: vec!["wifi".to_string()],
            body: "\
# Best Mesh WiFi Systems

Picking a mesh router for large homes means weighing backhaul bands,\n\
node count, and whether wifi 7 support is worth the premium today.\n\
We compare the practical tradeoffs below.

## Comparison

Coverage per node varies widely; spec sheets from [the IEEE](https://www.ieee.org/)\n\
and summaries on [Wikipedia](https://en.wikipedia.org/wiki/Mesh_networking)\n\
help separate marketing from measured behavior across vendors and generations.

## FAQ

**Do I need wifi 7 in a mesh router?** Only if your clients support it;\n\
otherwise a wifi 6 system covers large homes at a lower price point.\n\
"
            .to_string(),
        }
    }

    #[test]
    fn passing_document_passes_every_gate() {
        let report = check(&passing_document(), &requirements());
        for gate in &report.gates {
            assert!(gate.passed, "{} failed: {:?}", gate.gate, gate.diagnostics);
        }
        assert!(report.passed);
        assert!(report.overall > 0.9);
    }

    #[test]
    fn report_is_byte_identical_across_runs() {
        let doc = passing_document();
        let req = requirements();
        let a = serde_json::to_string(&check(&doc, &req)).unwrap();
        let b = serde_json::to_string(&check(&doc, &req)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_entity_lowers_coverage_and_names_it() {
        let mut doc = passing_document();
        doc.body = doc.body.replace("wifi 7", "the newest standard");
        let report = check(&doc, &requirements());
        let coverage = &report.gates[0];
        assert_eq!(coverage.gate, Gate::EntityCoverage);
        assert!(!coverage.passed);
        assert!(coverage.diagnostics[0].contains("missing: wifi 7"));
        assert!(coverage.sub_score < 1.0);
    }

    #[test]
    fn synonym_satisfies_entity_coverage() {
        let mut config = QualityConfig::default();
        config.min_words = 40;
        config.min_sections = 2;
        config.synonyms.insert(
            "wifi 7".to_string(),
            vec!["802.11be".to_string()],
        );
        let req = RequirementSpec::for_topic(&config, &router_topic());

        let mut doc = passing_document();
        doc.body = doc.body.replace("wifi 7", "802.11be");
        let report = check(&doc, &req);
        assert!(report.gates[0].passed, "{:?}", report.gates[0].diagnostics);
    }

    #[test]
    fn one_citation_fails_only_the_citation_gate() {
        let mut doc = passing_document();
        doc.body = doc.body.replace("https://www.ieee.org/", "#");
        let report = check(&doc, &requirements());
        let citations = &report.gates[2];
        assert_eq!(citations.gate, Gate::Citations);
        assert!(!citations.passed);
        assert!(citations.diagnostics[0].contains("distinct citation domains 1 < 2"));
        for gate in &report.gates {
            if gate.gate != Gate::Citations {
                assert!(gate.passed, "{} unexpectedly failed", gate.gate);
            }
        }
        assert!(!report.passed);
    }

    #[test]
    fn blocklisted_phrase_names_phrase_and_line() {
        let mut doc = passing_document();
        doc.body.push_str("\nThis system is Guaranteed Best in class.\n");
        let report = check(&doc, &requirements());
        let compliance = &report.gates[3];
        assert!(!compliance.passed);
        assert!(compliance.diagnostics[0].contains("guaranteed best"));
        assert!(compliance.diagnostics[0].contains("at line"));
        assert_eq!(compliance.sub_score, 0.0);
    }

    #[test]
    fn structure_violations_named_individually() {
        let mut doc = passing_document();
        doc.body = doc.body.replace("## FAQ", "# FAQ");
        let report = check(&doc, &requirements());
        let structure = &report.gates[4];
        assert!(!structure.passed);
        assert!(structure
            .diagnostics
            .iter()
            .any(|d| d.contains("exactly one primary heading")));
        assert!(structure
            .diagnostics
            .iter()
            .any(|d| d.contains("question-answer block")));
    }

    #[test]
    fn overall_reported_on_failure() {
        let mut doc = passing_document();
        doc.body = "# Thin\n\nShort.".to_string();
        let report = check(&doc, &requirements());
        assert!(!report.passed);
        assert!(report.overall > 0.0);
        assert!(report.overall < 1.0);
    }

    #[test]
    fn citation_domains_dedupe_and_strip_www() {
        let domains = citation_domains(
            "see https://www.example.com/a and https://example.com/b plus http://ieee.org",
        );
        assert_eq!(
            domains.into_iter().collect::<Vec<_>>(),
            vec!["example.com".to_string(), "ieee.org".to_string()]
        );
    }
}
