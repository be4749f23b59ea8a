//! Object record comparison pipeline.
//!
//! 1. Perfect match: remove exact structural duplicates.
//! 2. Score: all remaining pairs, in-process or through the [`MatchHub`].
//! 3. Select: greedy next-best assignment into similarity bands.
//! 4. Disjunct: whatever is left on either side.

use std::sync::Arc;

use crate::config::CompareOptions;
use crate::hub::{InProcessLauncher, MatchHub, SpokeLauncher};
use crate::similarity::{score_all, SimilarityCandidate};
use crate::types::{ComparisonResult, OutcomeCounts, Record};

use super::{fill_disjunct, find_perfect_matches, select_next_best, NextBestMatches, PerfectMatches};

/// Comparator for structured object records.
#[derive(Clone)]
pub struct ObjectComparator {
    options: CompareOptions,
    launcher: Arc<dyn SpokeLauncher>,
}

impl std::fmt::Debug for ObjectComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectComparator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ObjectComparator {
    /// Create a comparator; parallel scoring uses in-process spokes.
    ///
    /// Options are expected to be validated by the caller.
    pub fn new(options: CompareOptions) -> Self {
        Self {
            options,
            launcher: Arc::new(InProcessLauncher::default()),
        }
    }

    /// Use a different spoke launcher for parallel scoring.
    pub fn with_launcher(mut self, launcher: Arc<dyn SpokeLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Classify every current and next record.
    ///
    /// Always returns a result: spoke faults degrade the affected chunk to
    /// its partial candidates and the run continues.
    pub async fn compare(&self, current: Vec<Record>, next: Vec<Record>) -> ComparisonResult {
        let PerfectMatches {
            index: perfect_match_nodes,
            remaining_current,
            remaining_next,
        } = find_perfect_matches(current, next);

        let perfect = ComparisonResult {
            perfect_match_nodes,
            ..ComparisonResult::default()
        };
        log_counts(&perfect.counts(), remaining_current.len(), remaining_next.len());

        tracing::info!(
            workers = self.options.worker_count,
            "starting next best match search"
        );
        let candidates = self.score_candidates(&remaining_current, &remaining_next).await;
        tracing::info!(candidates = candidates.len(), "finished aggregation of matches");

        let NextBestMatches {
            index: next_best_match_nodes,
            remaining_current,
            remaining_next,
        } = select_next_best(
            candidates,
            self.options.next_best_match_threshold,
            remaining_current,
            remaining_next,
        );

        let result = ComparisonResult {
            next_best_match_nodes,
            disjunct_nodes: fill_disjunct(&remaining_current, &remaining_next),
            ..perfect
        };
        log_counts(&result.counts(), 0, 0);
        tracing::info!("finished next best match search");

        result
    }

    /// Score every (current, next) pair at or above the threshold.
    ///
    /// Fans out to spokes when more than one worker is configured.
    pub async fn score_candidates(&self, current: &[Record], next: &[Record]) -> Vec<SimilarityCandidate> {
        if self.options.is_parallel() {
            MatchHub::new(Arc::clone(&self.launcher), self.options.clone())
                .run(current, next)
                .await
        } else {
            score_all(
                current,
                next,
                self.options.next_best_match_threshold,
                self.options.property_cap,
            )
        }
    }
}

fn log_counts(counts: &OutcomeCounts, available_current: usize, available_next: usize) {
    tracing::debug!(
        perfect_current = counts.perfect_matches_current_nodes,
        perfect_next = counts.perfect_matches_next_nodes,
        next_best_current = counts.next_best_matches_current_nodes,
        next_best_next = counts.next_best_matches_next_nodes,
        disjunct_current = counts.disjunct_current_nodes,
        disjunct_next = counts.disjunct_next_nodes,
        available_current = available_current,
        available_next = available_next,
        "outcome counts"
    );
}
