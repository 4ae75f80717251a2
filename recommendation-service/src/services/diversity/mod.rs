//! Diversity re-ranking over the scored candidate pool, greedy
//! Maximal-Marginal-Relevance selection.
//!
//! Each round picks the remaining candidate maximizing
//! `score - diversity_preference * penalty`, where the penalty grows with
//! the number of already-selected items sharing the candidate's category
//! or source. The adjusted relevance is floored at zero so heavy penalties
//! reduce a candidate to parity, never below it. Ties go to the higher
//! original score, then to the lower news id.

use std::collections::HashMap;

use crate::config::DiversityConfig;
use crate::models::Candidate;

pub struct DiversityLayer {
    config: DiversityConfig,
}

impl DiversityLayer {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    /// Selects up to `top_k` candidates in diversity-aware order.
    ///
    /// `diversity_preference = 0.0` degenerates to the incoming score order.
    pub fn rerank(
        &self,
        candidates: Vec<Candidate>,
        top_k: usize,
        diversity_preference: f32,
    ) -> Vec<Candidate> {
        if candidates.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut selected: Vec<Candidate> = Vec::with_capacity(top_k.min(candidates.len()));
        let mut remaining = candidates;
        let mut category_counts: HashMap<i64, usize> = HashMap::new();
        let mut source_counts: HashMap<String, usize> = HashMap::new();

        while selected.len() < top_k && !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_key = self.relevance_key(
                &remaining[0],
                diversity_preference,
                &category_counts,
                &source_counts,
            );

            for (idx, candidate) in remaining.iter().enumerate().skip(1) {
                let key = self.relevance_key(
                    candidate,
                    diversity_preference,
                    &category_counts,
                    &source_counts,
                );
                if Self::beats(key, best_key) {
                    best_key = key;
                    best_idx = idx;
                }
            }

            let picked = remaining.swap_remove(best_idx);
            *category_counts.entry(picked.news.category_id).or_insert(0) += 1;
            *source_counts.entry(picked.news.source.clone()).or_insert(0) += 1;
            selected.push(picked);
        }

        selected
    }

    /// (adjusted relevance, original score, news id) for selection order.
    fn relevance_key(
        &self,
        candidate: &Candidate,
        diversity_preference: f32,
        category_counts: &HashMap<i64, usize>,
        source_counts: &HashMap<String, usize>,
    ) -> (f32, f32, i64) {
        let same_category = category_counts
            .get(&candidate.news.category_id)
            .copied()
            .unwrap_or(0);
        let same_source = source_counts
            .get(&candidate.news.source)
            .copied()
            .unwrap_or(0);

        let penalty = self.config.category_penalty * same_category as f32
            + self.config.source_penalty * same_source as f32;
        let relevance = (candidate.recommendation_score - diversity_preference * penalty).max(0.0);

        (relevance, candidate.recommendation_score, candidate.news.id)
    }

    fn beats(a: (f32, f32, i64), b: (f32, f32, i64)) -> bool {
        if a.0 != b.0 {
            return a.0 > b.0;
        }
        if a.1 != b.1 {
            return a.1 > b.1;
        }
        a.2 < b.2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewsItem, RecallSource};
    use chrono::Utc;

    fn candidate(id: i64, category_id: i64, source: &str, score: f32) -> Candidate {
        let news = NewsItem {
            id,
            title: format!("news {}", id),
            summary: None,
            source: source.to_string(),
            author: None,
            image_url: None,
            category_id,
            category_name: None,
            tags: vec![],
            language: "en".to_string(),
            reading_time: 3,
            quality_score: 0.5,
            sentiment_score: 0.0,
            view_count: 0,
            like_count: 0,
            share_count: 0,
            popularity_score: 0.0,
            trending_score: 0.0,
            is_breaking: false,
            is_featured: false,
            published_at: Utc::now(),
        };
        let mut c = Candidate::new(news, RecallSource::Hot, 0.6);
        c.recommendation_score = score;
        c
    }

    fn layer() -> DiversityLayer {
        DiversityLayer::new(DiversityConfig::default())
    }

    #[test]
    fn test_zero_preference_degenerates_to_score_order() {
        let pool = vec![
            candidate(1, 1, "a", 0.9),
            candidate(2, 1, "a", 0.8),
            candidate(3, 1, "a", 0.7),
            candidate(4, 2, "b", 0.6),
        ];

        let reranked = layer().rerank(pool, 4, 0.0);
        let ids: Vec<i64> = reranked.iter().map(|c| c.news.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_category_repetition_is_penalized() {
        // Three tech items barely outscore the sports item; with a strong
        // diversity preference the sports item moves up to position 2.
        let pool = vec![
            candidate(1, 1, "a", 0.90),
            candidate(2, 1, "a", 0.89),
            candidate(3, 1, "a", 0.88),
            candidate(4, 2, "b", 0.85),
        ];

        let reranked = layer().rerank(pool, 4, 1.0);
        let ids: Vec<i64> = reranked.iter().map(|c| c.news.id).collect();
        assert_eq!(ids[0], 1);
        assert_eq!(ids[1], 4);
    }

    #[test]
    fn test_tie_breaks_by_lower_id() {
        let pool = vec![
            candidate(7, 1, "a", 0.5),
            candidate(3, 2, "b", 0.5),
            candidate(5, 3, "c", 0.5),
        ];

        let reranked = layer().rerank(pool, 3, 0.5);
        let ids: Vec<i64> = reranked.iter().map(|c| c.news.id).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn test_returns_at_most_top_k() {
        let pool = vec![
            candidate(1, 1, "a", 0.9),
            candidate(2, 2, "b", 0.8),
            candidate(3, 3, "c", 0.7),
        ];

        assert_eq!(layer().rerank(pool.clone(), 2, 0.5).len(), 2);
        // Fewer candidates than requested is fine
        assert_eq!(layer().rerank(pool, 10, 0.5).len(), 3);
    }

    #[test]
    fn test_penalty_never_drives_relevance_negative() {
        // Heavily repeated category: adjusted relevance clamps at zero, so
        // selection falls back to original score, then id.
        let pool = vec![
            candidate(1, 1, "a", 0.10),
            candidate(2, 1, "a", 0.05),
            candidate(3, 1, "a", 0.02),
        ];

        let reranked = layer().rerank(pool, 3, 1.0);
        let ids: Vec<i64> = reranked.iter().map(|c| c.news.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
