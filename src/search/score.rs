//! Viral score: engagement weighted by recency
//!
//! score = (upvotes + comments * 2) / max(1, hours_since_posted + 1),
//! rounded to two decimal places.

use crate::config::ScoringConfig;
use crate::search::{RankedItem, RawItem};
use chrono::Utc;

const SECONDS_PER_HOUR: f64 = 3600.0;
const COMMENT_WEIGHT: f64 = 2.0;

/// Stateless scorer and eligibility filter
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    min_upvotes: u64,
    min_comments: u64,
    min_title_length: usize,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ScoreEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            min_upvotes: config.min_upvotes,
            min_comments: config.min_comments,
            min_title_length: config.min_title_length,
        }
    }

    /// Score an item against the current wall clock
    pub fn score(&self, item: &RawItem) -> f64 {
        self.score_at(item, now_seconds())
    }

    /// Score an item as if evaluated at `now` (epoch seconds, fractional)
    pub fn score_at(&self, item: &RawItem, now: f64) -> f64 {
        let engagement = item.upvote_count as f64 + item.comment_count as f64 * COMMENT_WEIGHT;
        let hours_since = (now - item.created_at_epoch_seconds as f64) / SECONDS_PER_HOUR;

        // Floors future timestamps as well as brand-new items
        let decay = (hours_since + 1.0).max(1.0);

        round2(engagement / decay)
    }

    /// Hard gates applied before ranking; failing any one excludes the item
    pub fn is_eligible(&self, item: &RawItem) -> bool {
        if item.is_removed || item.is_deleted {
            return false;
        }
        if item.upvote_count < self.min_upvotes {
            return false;
        }
        if item.comment_count < self.min_comments {
            return false;
        }
        item.title.chars().count() > self.min_title_length
    }

    /// Filter, score and sort by score descending
    pub fn rank(&self, items: Vec<RawItem>) -> Vec<RankedItem> {
        self.rank_at(items, now_seconds())
    }

    /// Ranking with an explicit evaluation time. Equal scores keep their
    /// input order.
    pub fn rank_at(&self, items: Vec<RawItem>, now: f64) -> Vec<RankedItem> {
        let mut ranked: Vec<RankedItem> = items
            .into_iter()
            .filter(|item| self.is_eligible(item))
            .map(|item| {
                let score = self.score_at(&item, now);
                RankedItem { item, score }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        ranked
    }
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_700_000_000.0;

    fn item(id: &str, upvotes: u64, comments: u64, age_secs: i64) -> RawItem {
        RawItem {
            id: id.to_string(),
            title: "A sufficiently long title".to_string(),
            source_name: "stories".to_string(),
            permalink: format!("/r/stories/comments/{}", id),
            upvote_count: upvotes,
            comment_count: comments,
            created_at_epoch_seconds: NOW as i64 - age_secs,
            author_name: "someone".to_string(),
            is_removed: false,
            is_deleted: false,
        }
    }

    #[test]
    fn test_one_hour_old_item() {
        let engine = ScoreEngine::default();
        let post = item("a", 100, 50, 3600);
        // engagement 200, decay 2
        assert_eq!(engine.score_at(&post, NOW), 100.0);
    }

    #[test]
    fn test_brand_new_item_has_unit_decay() {
        let engine = ScoreEngine::default();
        let post = item("a", 10, 5, 0);
        assert_eq!(engine.score_at(&post, NOW), 20.0);
    }

    #[test]
    fn test_future_timestamp_is_floored() {
        let engine = ScoreEngine::default();
        let post = item("a", 10, 5, -10 * 3600);
        assert_eq!(engine.score_at(&post, NOW), 20.0);
    }

    #[test]
    fn test_fractional_hours_and_rounding() {
        let engine = ScoreEngine::default();
        // 30 minutes old: decay 1.5, engagement 10 -> 6.666...
        let post = item("a", 10, 0, 1800);
        assert_eq!(engine.score_at(&post, NOW), 6.67);
    }

    #[test]
    fn test_eligibility_gates() {
        let engine = ScoreEngine::default();
        assert!(engine.is_eligible(&item("ok", 10, 5, 0)));
        assert!(!engine.is_eligible(&item("low", 5, 2, 0)));
        assert!(!engine.is_eligible(&item("few comments", 500, 4, 0)));
        assert!(!engine.is_eligible(&item("few upvotes", 9, 500, 0)));

        let mut removed = item("removed", 100, 100, 0);
        removed.is_removed = true;
        assert!(!engine.is_eligible(&removed));

        let mut deleted = item("deleted", 100, 100, 0);
        deleted.is_deleted = true;
        assert!(!engine.is_eligible(&deleted));

        let mut short = item("short", 100, 100, 0);
        short.title = "exactly 10".to_string();
        assert!(!engine.is_eligible(&short));
        short.title = "exactly 11!".to_string();
        assert!(engine.is_eligible(&short));
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = ScoreEngine::new(&ScoringConfig {
            min_upvotes: 0,
            min_comments: 0,
            min_title_length: 0,
        });
        let mut post = item("a", 0, 0, 0);
        post.title = "x".to_string();
        assert!(engine.is_eligible(&post));
    }

    #[test]
    fn test_rank_filters_and_sorts() {
        let engine = ScoreEngine::default();
        let items = vec![
            item("old", 100, 50, 10 * 3600),
            item("ineligible", 5, 2, 0),
            item("fresh", 100, 50, 0),
            item("middle", 100, 50, 3600),
        ];

        let ranked = engine.rank_at(items, NOW);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "middle", "old"]);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let engine = ScoreEngine::default();
        let items = vec![
            item("first", 20, 10, 0),
            item("second", 20, 10, 0),
            item("third", 20, 10, 0),
        ];

        let ranked = engine.rank_at(items, NOW);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(ScoreEngine::default().rank(Vec::new()).is_empty());
    }
}
