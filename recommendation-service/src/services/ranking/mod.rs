//! Candidate scoring.
//!
//! Deterministic weighted-sum scoring over the merged candidate pool:
//!
//! ```text
//! base  = strategy_weight
//!       + popularity * 0.3 + trending * 0.3 + quality * 0.2 + freshness * 0.2
//! score = base * breaking_boost? * featured_boost?, floored at 0
//! ```
//!
//! All signal terms are clamped to [0,1] before weighting. The boosts
//! multiply the whole sum so breaking news dominates regardless of the
//! other signals. Freshness decays linearly from 1.0 at age zero to 0.0
//! at the configured horizon (default 7 days).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::RankingConfig;
use crate::models::{Candidate, UserSignal};

pub struct RankingLayer {
    config: RankingConfig,
}

impl RankingLayer {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Scores every candidate, applies the quality gate, and returns the
    /// eligible pool sorted by score descending (ties: lower news id first).
    pub fn rank(
        &self,
        mut candidates: Vec<Candidate>,
        signal: &UserSignal,
        now: DateTime<Utc>,
    ) -> Vec<Candidate> {
        for candidate in &mut candidates {
            candidate.recommendation_score = self.score(candidate, now);
            if signal.quality_threshold > 0.0
                && candidate.news.quality_score < signal.quality_threshold
            {
                // Hard filter, not a soft penalty
                candidate.eligible = false;
            }
        }

        let before = candidates.len();
        candidates.retain(|c| c.eligible);
        if candidates.len() < before {
            debug!(
                dropped = before - candidates.len(),
                quality_threshold = signal.quality_threshold,
                "Quality gate dropped candidates"
            );
        }

        candidates.sort_by(|a, b| {
            b.recommendation_score
                .partial_cmp(&a.recommendation_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.news.id.cmp(&b.news.id))
        });

        candidates
    }

    /// Single-candidate score. Always finite and non-negative.
    pub fn score(&self, candidate: &Candidate, now: DateTime<Utc>) -> f32 {
        let news = &candidate.news;

        let mut score = candidate.strategy_weight
            + clamp01(news.popularity_score) * self.config.popularity_weight
            + clamp01(news.trending_score) * self.config.trending_weight
            + clamp01(news.quality_score) * self.config.quality_weight
            + self.freshness(news.published_at, now) * self.config.freshness_weight;

        if news.is_breaking {
            score *= self.config.breaking_boost;
        }
        if news.is_featured {
            score *= self.config.featured_boost;
        }

        if !score.is_finite() {
            return 0.0;
        }
        score.max(0.0)
    }

    /// Linear decay: 1.0 at age zero, 0.0 at `freshness_horizon_hours`.
    /// Future timestamps count as age zero.
    pub fn freshness(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_hours = (now - published_at).num_minutes() as f32 / 60.0;
        if age_hours <= 0.0 {
            return 1.0;
        }
        (1.0 - age_hours / self.config.freshness_horizon_hours as f32).max(0.0)
    }
}

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewsItem, RecallSource};
    use chrono::Duration;

    fn news(id: i64) -> NewsItem {
        NewsItem {
            id,
            title: format!("news {}", id),
            summary: None,
            source: "reuters".to_string(),
            author: None,
            image_url: None,
            category_id: 1,
            category_name: None,
            tags: vec![],
            language: "en".to_string(),
            reading_time: 3,
            quality_score: 0.5,
            sentiment_score: 0.0,
            view_count: 100,
            like_count: 10,
            share_count: 1,
            popularity_score: 0.4,
            trending_score: 0.3,
            is_breaking: false,
            is_featured: false,
            published_at: Utc::now() - Duration::hours(6),
        }
    }

    fn layer() -> RankingLayer {
        RankingLayer::new(RankingConfig::default())
    }

    #[test]
    fn test_freshness_decay_endpoints() {
        let layer = layer();
        let now = Utc::now();

        assert_eq!(layer.freshness(now, now), 1.0);
        // Future timestamps clamp to full freshness
        assert_eq!(layer.freshness(now + Duration::hours(2), now), 1.0);
        // At the 7-day horizon the score reaches zero
        assert_eq!(layer.freshness(now - Duration::hours(168), now), 0.0);
        assert_eq!(layer.freshness(now - Duration::days(30), now), 0.0);

        let at_half = layer.freshness(now - Duration::hours(84), now);
        assert!((at_half - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_quality_monotonicity() {
        let layer = layer();
        let now = Utc::now();

        let mut low = news(1);
        low.quality_score = 0.2;
        let mut high = news(1);
        high.quality_score = 0.9;

        let low_score = layer.score(&Candidate::new(low, RecallSource::Hot, 0.6), now);
        let high_score = layer.score(&Candidate::new(high, RecallSource::Hot, 0.6), now);
        assert!(high_score > low_score);
    }

    #[test]
    fn test_breaking_outranks_identical_non_breaking() {
        let layer = layer();
        let now = Utc::now();

        let plain = news(1);
        let mut breaking = news(2);
        breaking.is_breaking = true;

        let plain_score = layer.score(&Candidate::new(plain, RecallSource::Hot, 0.6), now);
        let breaking_score = layer.score(&Candidate::new(breaking, RecallSource::Hot, 0.6), now);
        assert!(breaking_score > plain_score);
        assert!((breaking_score / plain_score - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_boosts_multiply_entire_sum() {
        let layer = layer();
        let now = Utc::now();

        let mut both = news(1);
        both.is_breaking = true;
        both.is_featured = true;
        let base = news(2);

        let base_score = layer.score(&Candidate::new(base, RecallSource::Hot, 0.6), now);
        let boosted = layer.score(&Candidate::new(both, RecallSource::Hot, 0.6), now);
        assert!((boosted / base_score - 1.5 * 1.2).abs() < 0.001);
    }

    #[test]
    fn test_out_of_range_signals_are_clamped() {
        let layer = layer();
        let now = Utc::now();

        let mut wild = news(1);
        wild.popularity_score = 25.0;
        wild.trending_score = -3.0;

        let mut capped = news(1);
        capped.popularity_score = 1.0;
        capped.trending_score = 0.0;

        let wild_score = layer.score(&Candidate::new(wild, RecallSource::Hot, 0.6), now);
        let capped_score = layer.score(&Candidate::new(capped, RecallSource::Hot, 0.6), now);
        assert!((wild_score - capped_score).abs() < 0.001);
    }

    #[test]
    fn test_quality_gate_is_hard_filter() {
        let layer = layer();
        let mut signal = UserSignal::cold_start();
        signal.quality_threshold = 0.6;

        let mut poor = news(1);
        poor.quality_score = 0.3;
        let mut fine = news(2);
        fine.quality_score = 0.8;

        let ranked = layer.rank(
            vec![
                Candidate::new(poor, RecallSource::Hot, 0.6),
                Candidate::new(fine, RecallSource::Hot, 0.6),
            ],
            &signal,
            Utc::now(),
        );

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].news.id, 2);
    }

    #[test]
    fn test_rank_ties_break_by_lower_id() {
        let layer = layer();
        let signal = UserSignal::cold_start();
        let now = Utc::now();

        let twin_a = news(9);
        let twin_b = news(4);

        let ranked = layer.rank(
            vec![
                Candidate::new(twin_a, RecallSource::Hot, 0.6),
                Candidate::new(twin_b, RecallSource::Hot, 0.6),
            ],
            &signal,
            now,
        );

        assert_eq!(ranked[0].news.id, 4);
        assert_eq!(ranked[1].news.id, 9);
    }

    #[test]
    fn test_scores_never_negative() {
        let layer = layer();
        let now = Utc::now();

        let mut item = news(1);
        item.popularity_score = -10.0;
        item.trending_score = -10.0;
        item.quality_score = -10.0;
        item.published_at = now - Duration::days(365);

        let score = layer.score(&Candidate::new(item, RecallSource::Fresh, 0.0), now);
        assert!(score >= 0.0);
        assert!(score.is_finite());
    }
}
