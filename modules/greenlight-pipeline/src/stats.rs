//! Run-level accounting, printed at the end of every pipeline run.

use greenlight_common::{OutcomeKind, TopicOutcome};

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<TopicOutcome>,
}

impl RunReport {
    pub fn record(&mut self, outcome: TopicOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    pub fn published(&self) -> usize {
        self.count(OutcomeKind::Published)
    }

    /// Mean overall quality across published documents.
    pub fn mean_published_quality(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Published)
            .filter_map(|o| o.quality)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Combined monthly revenue estimate across published documents.
    pub fn estimated_monthly_value(&self) -> f64 {
        self.outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Published)
            .filter_map(|o| o.score.as_ref())
            .map(|s| s.revenue.combined_monthly)
            .sum()
    }

    pub fn total_attempts(&self) -> usize {
        self.outcomes.iter().map(|o| o.attempts.len()).sum()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pipeline run: {} topics", self.outcomes.len())?;
        writeln!(
            f,
            "  published: {}  rejected: {}  duplicate: {}  exhausted: {}  cancelled: {}",
            self.published(),
            self.count(OutcomeKind::Rejected),
            self.count(OutcomeKind::Duplicate),
            self.count(OutcomeKind::Exhausted),
            self.count(OutcomeKind::Cancelled),
        )?;
        writeln!(f, "  generation attempts: {}", self.total_attempts())?;
        if let Some(quality) = self.mean_published_quality() {
            writeln!(f, "  mean published quality: {quality:.2}")?;
        }
        let value = self.estimated_monthly_value();
        if value > 0.0 {
            writeln!(f, "  estimated monthly value: ${value:.0}")?;
        }
        for outcome in &self.outcomes {
            if outcome.kind == OutcomeKind::Exhausted {
                writeln!(f, "  exhausted '{}': {}", outcome.topic, outcome.detail)?;
            }
        }
        Ok(())
    }
}
