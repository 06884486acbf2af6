//! Opportunity scoring: converts raw demand/competition signals into a
//! bounded score, a monetary estimate, and a deterministic justification.
//!
//! `score = 100 × (w_T·T + w_I·I + w_S·S + w_F·F) × (1 − p_D·D)`, clamped
//! to [0,100]. Monotone: raising any positive signal never lowers the
//! score, raising difficulty never raises it.

use greenlight_common::{
    CandidateTopic, OpportunityScore, RevenueConfig, RevenueEstimate, RevenueMode, ScorerConfig,
};

/// Score one candidate topic. Pure and deterministic; a missing or NaN
/// signal fails closed (contributes 0) and is flagged in the justification.
pub fn score(
    topic: &CandidateTopic,
    config: &ScorerConfig,
    revenue: &RevenueConfig,
) -> OpportunityScore {
    let trend = clean(topic.signals.trend);
    let intent = clean(topic.signals.intent);
    let seasonality = clean(topic.signals.seasonality);
    let site_fit = clean(topic.signals.site_fit);
    let difficulty = clean(topic.signals.difficulty);

    let positive = config.w_trend * trend.unwrap_or(0.0)
        + config.w_intent * intent.unwrap_or(0.0)
        + config.w_seasonality * seasonality.unwrap_or(0.0)
        + config.w_site_fit * site_fit.unwrap_or(0.0);
    let penalty = 1.0 - config.difficulty_penalty * difficulty.unwrap_or(0.0);
    let value = (100.0 * positive * penalty).clamp(0.0, 100.0);

    let mut reasons = Vec::new();
    let mut weak = Vec::new();
    let named = [
        ("search demand", "trend", trend),
        ("commercial intent", "intent", intent),
        ("seasonal lift", "seasonality", seasonality),
        ("site fit", "site_fit", site_fit),
    ];
    for (label, signal_name, v) in named {
        match v {
            None => reasons.push(format!("{signal_name} signal unavailable")),
            Some(v) if v >= config.notable_signal => {
                reasons.push(format!("strong {label} ({signal_name} {v:.2})"));
            }
            Some(v) => weak.push(format!("weak {label} ({signal_name} {v:.2})")),
        }
    }
    match difficulty {
        None => reasons.push("difficulty signal unavailable".to_string()),
        Some(d) if d <= 1.0 - config.notable_signal => {
            reasons.push(format!("low competition (difficulty {d:.2})"));
        }
        Some(d) if d >= config.notable_signal => {
            weak.push(format!("high competition (difficulty {d:.2})"));
        }
        Some(_) => {}
    }

    let mut rejections = Vec::new();
    if value < config.selection_threshold {
        rejections.push(format!(
            "score {value:.1} below selection threshold {:.1}",
            config.selection_threshold
        ));
        rejections.extend(weak);
    }

    OpportunityScore {
        keyword: topic.keyword.clone(),
        score: value,
        revenue: estimate_revenue(trend.unwrap_or(0.0), revenue),
        reasons,
        rejections,
    }
}

/// Two independent channel models; the configured mode combines them.
fn estimate_revenue(trend: f64, config: &RevenueConfig) -> RevenueEstimate {
    let impressions = config.base_monthly_impressions * trend;
    let ads_monthly = impressions * config.ctr * config.rpm / 1000.0;
    let affiliate_monthly =
        impressions * config.click_rate * config.conversion_rate * config.avg_commission;
    let combined_monthly = match config.mode {
        RevenueMode::Max => ads_monthly.max(affiliate_monthly),
        RevenueMode::Sum => ads_monthly + affiliate_monthly,
    };
    RevenueEstimate {
        ads_monthly,
        affiliate_monthly,
        combined_monthly,
    }
}

fn clean(v: Option<f64>) -> Option<f64> {
    match v {
        Some(v) if v.is_finite() => Some(v.clamp(0.0, 1.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenlight_common::TopicSignals;

    fn topic(signals: TopicSignals) -> CandidateTopic {
        CandidateTopic {
            keyword: "mesh wifi for large homes".to_string(),
            entities: Default::default(),
            signals,
        }
    }

    fn signals(t: f64, i: f64, s: f64, f: f64, d: f64) -> TopicSignals {
        TopicSignals {
            trend: Some(t),
            intent: Some(i),
            seasonality: Some(s),
            site_fit: Some(f),
            difficulty: Some(d),
        }
    }

    #[test]
    fn matches_worked_example() {
        // T=0.9, I=0.9, S=0.5, F=0.8, D=0.2, weights (0.35,0.30,0.15,0.20),
        // penalty 0.6 → 100 × 0.82 × 0.88 ≈ 72.2
        let config = ScorerConfig::default();
        let result = score(
            &topic(signals(0.9, 0.9, 0.5, 0.8, 0.2)),
            &config,
            &RevenueConfig::default(),
        );
        assert!((result.score - 72.16).abs() < 0.05, "got {}", result.score);
        assert!(result.score >= config.selection_threshold);
        assert!(result.is_selected());
    }

    #[test]
    fn monotone_in_positive_signals() {
        let config = ScorerConfig::default();
        let revenue = RevenueConfig::default();
        let base = score(&topic(signals(0.4, 0.5, 0.5, 0.5, 0.3)), &config, &revenue);
        for bumped in [
            signals(0.9, 0.5, 0.5, 0.5, 0.3),
            signals(0.4, 0.9, 0.5, 0.5, 0.3),
            signals(0.4, 0.5, 0.9, 0.5, 0.3),
            signals(0.4, 0.5, 0.5, 0.9, 0.3),
        ] {
            let result = score(&topic(bumped), &config, &revenue);
            assert!(result.score >= base.score);
        }
    }

    #[test]
    fn monotone_decreasing_in_difficulty() {
        let config = ScorerConfig::default();
        let revenue = RevenueConfig::default();
        let easy = score(&topic(signals(0.7, 0.7, 0.5, 0.5, 0.1)), &config, &revenue);
        let hard = score(&topic(signals(0.7, 0.7, 0.5, 0.5, 0.9)), &config, &revenue);
        assert!(hard.score <= easy.score);
    }

    #[test]
    fn bounded_even_with_oversized_inputs() {
        let config = ScorerConfig {
            w_trend: 2.0,
            w_intent: 2.0,
            w_seasonality: 2.0,
            w_site_fit: 2.0,
            ..ScorerConfig::default()
        };
        let result = score(
            &topic(signals(5.0, 5.0, 5.0, 5.0, 0.0)),
            &config,
            &RevenueConfig::default(),
        );
        assert!(result.score <= 100.0);
        assert!(result.score >= 0.0);
    }

    #[test]
    fn missing_signal_fails_closed_and_is_flagged() {
        let config = ScorerConfig::default();
        let revenue = RevenueConfig::default();
        let mut s = signals(0.9, 0.9, 0.5, 0.8, 0.2);
        s.intent = None;
        let result = score(&topic(s), &config, &revenue);
        let mut zeroed = signals(0.9, 0.9, 0.5, 0.8, 0.2);
        zeroed.intent = Some(0.0);
        let zeroed_result = score(&topic(zeroed), &config, &revenue);
        assert_eq!(result.score, zeroed_result.score);
        assert!(result
            .reasons
            .iter()
            .any(|r| r == "intent signal unavailable"));
    }

    #[test]
    fn nan_signal_treated_as_unavailable() {
        let mut s = signals(0.9, 0.9, 0.5, 0.8, 0.2);
        s.trend = Some(f64::NAN);
        let result = score(&topic(s), &ScorerConfig::default(), &RevenueConfig::default());
        assert!(result.score.is_finite());
        assert!(result.reasons.iter().any(|r| r == "trend signal unavailable"));
    }

    #[test]
    fn same_input_same_explanation() {
        let config = ScorerConfig::default();
        let revenue = RevenueConfig::default();
        let a = score(&topic(signals(0.9, 0.3, 0.5, 0.8, 0.9)), &config, &revenue);
        let b = score(&topic(signals(0.9, 0.3, 0.5, 0.8, 0.9)), &config, &revenue);
        assert_eq!(a.reasons, b.reasons);
        assert_eq!(a.rejections, b.rejections);
    }

    #[test]
    fn below_threshold_names_weak_signals() {
        let result = score(
            &topic(signals(0.2, 0.2, 0.1, 0.3, 0.9)),
            &ScorerConfig::default(),
            &RevenueConfig::default(),
        );
        assert!(!result.is_selected());
        assert!(result.rejections[0].contains("below selection threshold"));
        assert!(result.rejections.iter().any(|r| r.contains("weak")));
        assert!(result.rejections.iter().any(|r| r.contains("high competition")));
    }

    #[test]
    fn revenue_modes_combine_channels() {
        let mut revenue = RevenueConfig::default();
        let s = signals(1.0, 0.5, 0.5, 0.5, 0.0);

        revenue.mode = RevenueMode::Sum;
        let summed = score(&topic(s), &ScorerConfig::default(), &revenue);
        revenue.mode = RevenueMode::Max;
        let maxed = score(&topic(s), &ScorerConfig::default(), &revenue);

        let est = summed.revenue;
        assert!((est.combined_monthly - (est.ads_monthly + est.affiliate_monthly)).abs() < 1e-9);
        assert!(
            (maxed.revenue.combined_monthly - est.ads_monthly.max(est.affiliate_monthly)).abs()
                < 1e-9
        );
    }
}
