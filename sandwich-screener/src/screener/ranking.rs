//! Theme-frequency ordering of matches.
//!
//! Each theme column is counted independently over the match set. Matches
//! whose themes recur more often come first, with alphabetical tie-breaks
//! and the name as the last significant key. Empty themes count as zero
//! and sort after every non-empty theme of the same column.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use super::engine::MatchResult;

/// A match with the recurrence counts of its three themes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    /// The underlying match
    #[serde(flatten)]
    pub item: MatchResult,
    /// Matches sharing `theme1`
    pub theme1_count: usize,
    /// Matches sharing `theme2`
    pub theme2_count: usize,
    /// Matches sharing `theme3`
    pub theme3_count: usize,
}

/// Orders a match set by theme recurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyRanker;

impl FrequencyRanker {
    /// Create a ranker.
    pub fn new() -> Self {
        Self
    }

    /// Attach theme counts and sort. Pure and deterministic.
    pub fn rank(&self, matches: &[MatchResult]) -> Vec<RankedMatch> {
        let counts1 = theme_counts(matches.iter().map(|m| m.theme1.as_str()));
        let counts2 = theme_counts(matches.iter().map(|m| m.theme2.as_str()));
        let counts3 = theme_counts(matches.iter().map(|m| m.theme3.as_str()));

        let mut ranked: Vec<RankedMatch> = matches
            .iter()
            .map(|m| RankedMatch {
                theme1_count: count_of(&counts1, &m.theme1),
                theme2_count: count_of(&counts2, &m.theme2),
                theme3_count: count_of(&counts3, &m.theme3),
                item: m.clone(),
            })
            .collect();

        ranked.sort_by(compare);
        ranked
    }
}

fn theme_counts<'a>(themes: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for theme in themes.filter(|t| !t.is_empty()) {
        *counts.entry(theme).or_insert(0) += 1;
    }
    counts
}

fn count_of(counts: &HashMap<&str, usize>, theme: &str) -> usize {
    counts.get(theme).copied().unwrap_or(0)
}

fn compare(a: &RankedMatch, b: &RankedMatch) -> Ordering {
    let (x, y) = (&a.item, &b.item);
    (
        x.theme1.is_empty(),
        Reverse(a.theme1_count),
        &x.theme1,
        x.theme2.is_empty(),
        Reverse(a.theme2_count),
        &x.theme2,
        x.theme3.is_empty(),
        Reverse(a.theme3_count),
        &x.name,
        &x.theme3,
    )
        .cmp(&(
            y.theme1.is_empty(),
            Reverse(b.theme1_count),
            &y.theme1,
            y.theme2.is_empty(),
            Reverse(b.theme2_count),
            &y.theme2,
            y.theme3.is_empty(),
            Reverse(b.theme3_count),
            &y.name,
            &y.theme3,
        ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(name: &str, t1: &str, t2: &str, t3: &str) -> MatchResult {
        MatchResult {
            name: name.into(),
            ticker: format!("T-{name}"),
            theme1: t1.into(),
            theme2: t2.into(),
            theme3: t3.into(),
            close: 100.0,
            ma_short: 110.0,
            ma_long: 90.0,
        }
    }

    fn names(ranked: &[RankedMatch]) -> Vec<&str> {
        ranked.iter().map(|r| r.item.name.as_str()).collect()
    }

    #[test]
    fn test_recurring_theme_first_then_name() {
        let ranked = FrequencyRanker::new().rank(&[
            m("Zeta", "Tech", "", ""),
            m("Beta", "Bio", "", ""),
            m("Alpha", "Tech", "", ""),
        ]);

        assert_eq!(names(&ranked), vec!["Alpha", "Zeta", "Beta"]);
        assert_eq!(ranked[0].theme1_count, 2);
        assert_eq!(ranked[2].theme1_count, 1);
    }

    #[test]
    fn test_equal_counts_break_on_theme_alphabetically() {
        let ranked = FrequencyRanker::new().rank(&[
            m("A", "Semis", "", ""),
            m("B", "Auto", "", ""),
        ]);
        assert_eq!(names(&ranked), vec!["B", "A"]);
    }

    #[test]
    fn test_second_theme_orders_within_first() {
        let ranked = FrequencyRanker::new().rank(&[
            m("A", "Tech", "Memory", ""),
            m("B", "Tech", "Display", ""),
            m("C", "Tech", "Display", ""),
            m("D", "Bio", "Display", ""),
        ]);
        // Display appears three times in theme2
        assert_eq!(names(&ranked), vec!["B", "C", "A", "D"]);
        assert_eq!(ranked[0].theme2_count, 3);
    }

    #[test]
    fn test_third_theme_count_before_name() {
        let ranked = FrequencyRanker::new().rank(&[
            m("A", "Tech", "Memory", "HBM"),
            m("B", "Tech", "Memory", "AI"),
            m("C", "Bio", "", "AI"),
        ]);
        assert_eq!(names(&ranked), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_empty_theme_sorts_last_with_zero_count() {
        let ranked = FrequencyRanker::new().rank(&[
            m("A", "", "", ""),
            m("B", "", "", ""),
            m("C", "Solo", "", ""),
        ]);
        assert_eq!(names(&ranked), vec!["C", "A", "B"]);
        assert_eq!(ranked[1].theme1_count, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(FrequencyRanker::new().rank(&[]).is_empty());
    }

    fn arb_match() -> impl Strategy<Value = MatchResult> {
        let theme = prop::sample::select(vec!["", "Tech", "Bio", "Auto"]);
        (
            "[A-E]{1,2}",
            theme.clone(),
            theme.clone(),
            theme,
        )
            .prop_map(|(name, t1, t2, t3)| m(&name, t1, t2, t3))
    }

    proptest! {
        #[test]
        fn prop_rank_is_deterministic(matches in prop::collection::vec(arb_match(), 0..20)) {
            let ranker = FrequencyRanker::new();
            let first = ranker.rank(&matches);
            let second = ranker.rank(&matches);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_rank_is_order_independent(matches in prop::collection::vec(arb_match(), 0..20)) {
            let ranker = FrequencyRanker::new();
            let mut reversed = matches.clone();
            reversed.reverse();

            let key = |r: &RankedMatch| {
                (r.item.name.clone(), r.item.theme1.clone(), r.item.theme2.clone(), r.item.theme3.clone())
            };
            let a: Vec<_> = ranker.rank(&matches).iter().map(key).collect();
            let b: Vec<_> = ranker.rank(&reversed).iter().map(key).collect();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_theme1_counts_never_increase(matches in prop::collection::vec(arb_match(), 1..20)) {
            let ranked = FrequencyRanker::new().rank(&matches);
            let non_empty: Vec<usize> = ranked
                .iter()
                .filter(|r| !r.item.theme1.is_empty())
                .map(|r| r.theme1_count)
                .collect();
            prop_assert!(non_empty.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}
