//! Property tests for scoring, ranking and cache fingerprints

use proptest::prelude::*;
use viralscan::search::{RawItem, ScoreEngine, SearchCriteria, TimeWindow};

const NOW: f64 = 1_700_000_000.0;

fn item_strategy() -> impl Strategy<Value = RawItem> {
    (
        0u64..1_000_000,
        0u64..100_000,
        -86_400i64 * 200..3_600,
        "[a-z ]{0,40}",
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(upvotes, comments, age_offset, title, removed, deleted)| RawItem {
            id: format!("{}-{}-{}", upvotes, comments, age_offset),
            title,
            source_name: "sample".to_string(),
            permalink: String::new(),
            upvote_count: upvotes,
            comment_count: comments,
            created_at_epoch_seconds: NOW as i64 + age_offset,
            author_name: "someone".to_string(),
            is_removed: removed,
            is_deleted: deleted,
        })
}

fn window_strategy() -> impl Strategy<Value = TimeWindow> {
    prop_oneof![
        Just(TimeWindow::Hour),
        Just(TimeWindow::Day),
        Just(TimeWindow::TenDays),
        Just(TimeWindow::HundredDays),
    ]
}

proptest! {
    #[test]
    fn score_is_finite_and_non_negative(item in item_strategy()) {
        let score = ScoreEngine::default().score_at(&item, NOW);
        prop_assert!(score.is_finite());
        prop_assert!(score >= 0.0);
    }

    #[test]
    fn score_never_decreases_with_engagement(
        item in item_strategy(),
        extra_upvotes in 0u64..10_000,
        extra_comments in 0u64..10_000,
    ) {
        let engine = ScoreEngine::default();
        let mut busier = item.clone();
        busier.upvote_count += extra_upvotes;
        busier.comment_count += extra_comments;

        prop_assert!(engine.score_at(&busier, NOW) >= engine.score_at(&item, NOW));
    }

    #[test]
    fn score_never_increases_with_age(item in item_strategy(), extra_age in 0i64..86_400 * 30) {
        let engine = ScoreEngine::default();
        let mut older = item.clone();
        older.created_at_epoch_seconds -= extra_age;

        prop_assert!(engine.score_at(&older, NOW) <= engine.score_at(&item, NOW));
    }

    #[test]
    fn ranking_is_sorted_and_only_eligible(items in prop::collection::vec(item_strategy(), 0..40)) {
        let engine = ScoreEngine::default();
        let ranked = engine.rank_at(items.clone(), NOW);

        prop_assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
        prop_assert!(ranked.iter().all(|r| engine.is_eligible(&r.item)));
        prop_assert_eq!(
            ranked.len(),
            items.iter().filter(|item| engine.is_eligible(item)).count()
        );
    }

    #[test]
    fn cache_key_ignores_source_order_and_duplicates(
        window in window_strategy(),
        count in 1u32..=100,
        mut sources in prop::collection::vec("[a-z]{2,8}", 1..6),
    ) {
        let forward = SearchCriteria::new(window, sources.clone(), count);
        sources.reverse();
        let duplicated = sources.iter().chain(sources.iter()).cloned();
        let backward = SearchCriteria::new(window, duplicated, count);

        prop_assert_eq!(forward.cache_key(), backward.cache_key());
    }

    #[test]
    fn cache_key_distinguishes_result_count(
        window in window_strategy(),
        count in 1u32..100,
        sources in prop::collection::vec("[a-z]{2,8}", 1..6),
    ) {
        let smaller = SearchCriteria::new(window, sources.clone(), count);
        let larger = SearchCriteria::new(window, sources, count + 1);

        prop_assert_ne!(smaller.cache_key(), larger.cache_key());
    }
}
