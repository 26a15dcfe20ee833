//! Gap-based position scores.
//!
//! Tasks are displayed by descending score, columns by ascending score.
//! Inserting an item computes one new score from its neighbours; siblings
//! are never renumbered as a side effect of a move.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Score given to the first item of an empty list.
    #[serde(default = "default_base")]
    pub base: f64,
    /// Distance kept from the top/bottom neighbour when inserting at an edge.
    #[serde(default = "default_step")]
    pub step: f64,
    /// Adjacent scores closer than this are reported by `needs_rebalance`.
    #[serde(default = "default_rebalance_epsilon")]
    pub rebalance_epsilon: f64,
}

fn default_base() -> f64 {
    100.0
}

fn default_step() -> f64 {
    100.0
}

fn default_rebalance_epsilon() -> f64 {
    1.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            step: default_step(),
            rebalance_epsilon: default_rebalance_epsilon(),
        }
    }
}

impl ScoringConfig {
    /// Score for a task inserted at `index` into `siblings`, which must be
    /// sorted by descending score and must not contain the moved task.
    pub fn task_score(&self, siblings: &[f64], index: usize) -> f64 {
        let (first, last) = match (siblings.first(), siblings.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.base,
        };
        if index == 0 {
            return first + self.step;
        }
        if index >= siblings.len() {
            return last - self.step;
        }
        let prev = siblings[index - 1];
        let next = siblings[index];
        if prev - next > 1.0 {
            ((prev + next) / 2.0).floor()
        } else {
            // No integer gap left. Lands above `prev`; only a rebalance fixes this.
            prev + 1.0
        }
    }

    /// Score for a column inserted at `index` into `siblings`, sorted by
    /// ascending score, moved column excluded.
    pub fn column_score(&self, siblings: &[f64], index: usize) -> f64 {
        let (first, last) = match (siblings.first(), siblings.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.base,
        };
        if index == 0 {
            return first - self.step;
        }
        if index >= siblings.len() {
            return last + self.step;
        }
        let prev = siblings[index - 1];
        let next = siblings[index];
        if next - prev > 1.0 {
            ((prev + next) / 2.0).floor()
        } else {
            prev - 1.0
        }
    }

    /// True when two neighbouring scores are closer than `rebalance_epsilon`.
    /// Order of `scores` does not matter.
    pub fn needs_rebalance(&self, scores: &[f64]) -> bool {
        let mut sorted: Vec<f64> = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted
            .windows(2)
            .any(|pair| pair[1] - pair[0] < self.rebalance_epsilon)
    }

    /// Evenly spaced scores for `count` tasks in display order (descending).
    pub fn rebalanced_task_scores(&self, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| self.base + self.step * (count - 1 - i) as f64)
            .collect()
    }

    /// Evenly spaced scores for `count` columns in display order (ascending).
    pub fn rebalanced_column_scores(&self, count: usize) -> Vec<f64> {
        (0..count).map(|i| self.base + self.step * i as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_empty_list_uses_base() {
        assert_eq!(cfg().task_score(&[], 0), 100.0);
        assert_eq!(cfg().task_score(&[], 5), 100.0);
        assert_eq!(cfg().column_score(&[], 0), 100.0);
    }

    #[test]
    fn test_insert_at_top() {
        let score = cfg().task_score(&[1000.0, 500.0], 0);
        assert!(score > 1000.0);
        assert_eq!(score, 1100.0);
    }

    #[test]
    fn test_insert_at_bottom() {
        let score = cfg().task_score(&[1000.0, 500.0], 2);
        assert!(score < 500.0);
        assert_eq!(score, 400.0);
        assert_eq!(cfg().task_score(&[1000.0, 500.0], 17), 400.0);
    }

    #[test]
    fn test_midpoint_insert() {
        assert_eq!(cfg().task_score(&[1000.0, 500.0], 1), 750.0);
        assert_eq!(cfg().task_score(&[10.0, 7.0], 1), 8.0);
    }

    #[test]
    fn test_tight_gap_nudges_above_prev() {
        assert_eq!(cfg().task_score(&[501.0, 500.0], 1), 502.0);
    }

    #[test]
    fn test_column_mirror() {
        let siblings = [0.0, 1000.0];
        assert_eq!(cfg().column_score(&siblings, 0), -100.0);
        assert_eq!(cfg().column_score(&siblings, 2), 1100.0);
        assert_eq!(cfg().column_score(&siblings, 1), 500.0);
        assert_eq!(cfg().column_score(&[500.0, 501.0], 1), 499.0);
    }

    #[test]
    fn test_custom_step() {
        let cfg = ScoringConfig {
            base: 1000.0,
            step: 10.0,
            ..ScoringConfig::default()
        };
        assert_eq!(cfg.task_score(&[], 0), 1000.0);
        assert_eq!(cfg.task_score(&[50.0], 0), 60.0);
    }

    #[test]
    fn test_needs_rebalance() {
        assert!(!cfg().needs_rebalance(&[300.0, 200.0, 100.0]));
        assert!(cfg().needs_rebalance(&[300.0, 200.5, 200.0]));
        assert!(!cfg().needs_rebalance(&[]));
    }

    #[test]
    fn test_rebalanced_scores() {
        assert_eq!(cfg().rebalanced_task_scores(3), vec![300.0, 200.0, 100.0]);
        assert_eq!(cfg().rebalanced_column_scores(3), vec![100.0, 200.0, 300.0]);
        assert!(cfg().rebalanced_task_scores(0).is_empty());
    }

    proptest! {
        #[test]
        fn test_wide_gaps_keep_intended_order(
            raw in prop::collection::vec(-1_000_000i64..1_000_000, 0..20),
            index in 0usize..25,
        ) {
            // Distinct integer scores at least 2 apart always leave room.
            let mut scores: Vec<f64> = raw.iter().map(|s| (*s * 2) as f64).collect();
            scores.sort_by(|a, b| b.total_cmp(a));
            scores.dedup();
            let index = index.min(scores.len());
            let new = cfg().task_score(&scores, index);
            prop_assert!(new.is_finite());
            if index > 0 {
                prop_assert!(new < scores[index - 1]);
            }
            if index < scores.len() {
                prop_assert!(new > scores[index]);
            }
        }
    }
}
