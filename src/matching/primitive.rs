//! Exact-match-only comparison for scalar records.
//!
//! Primitive records (strings, numbers, booleans, null) are matched by
//! strict value equality and grouped by their string representation. There
//! is no similarity phase: anything unmatched is disjunct.

use std::collections::BTreeMap;

use crate::similarity::{format_progress, progress_step};
use crate::types::{ComparisonResult, PerfectMatchIndex, Record};

use super::fill_disjunct;

/// Comparator for scalar records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveComparator;

impl PrimitiveComparator {
    /// Create a comparator.
    pub fn new() -> Self {
        Self
    }

    /// Match scalar records one-to-one.
    ///
    /// Each current record takes the first unconsumed next record (in
    /// encounter order) that is strictly equal. `NaN` and containers never
    /// match.
    pub fn compare(&self, current: Vec<Record>, next: Vec<Record>) -> ComparisonResult {
        tracing::info!(
            current = current.len(),
            next = next.len(),
            "starting perfect match search for primitive values"
        );

        // Strict equality implies equal scalar keys
        let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, record) in next.iter().enumerate() {
            buckets.entry(record.value.scalar_key()).or_default().push(i);
        }

        let mut index = PerfectMatchIndex::new();
        let mut next_consumed = vec![false; next.len()];
        let mut remaining_current = Vec::new();
        let total = current.len();
        let step = progress_step(total);

        for (i, record) in current.into_iter().enumerate() {
            let key = record.value.scalar_key();
            let partner = buckets.get_mut(&key).and_then(|bucket| {
                let pos = bucket
                    .iter()
                    .position(|&n| record.value.strict_eq(&next[n].value))?;
                Some(bucket.remove(pos))
            });

            match partner {
                Some(n) => {
                    next_consumed[n] = true;
                    index.record(key, record.id, next[n].id);
                }
                None => remaining_current.push(record),
            }

            if (i + 1) % step == 0 {
                tracing::debug!(progress = %format_progress(i + 1, total), "primitive match search");
            }
        }

        let remaining_next: Vec<Record> = next
            .into_iter()
            .zip(next_consumed)
            .filter_map(|(record, consumed)| (!consumed).then_some(record))
            .collect();

        let result = ComparisonResult {
            perfect_match_nodes: index,
            disjunct_nodes: fill_disjunct(&remaining_current, &remaining_next),
            ..ComparisonResult::default()
        };

        let counts = result.counts();
        tracing::debug!(
            perfect_current = counts.perfect_matches_current_nodes,
            perfect_next = counts.perfect_matches_next_nodes,
            disjunct_current = counts.disjunct_current_nodes,
            disjunct_next = counts.disjunct_next_nodes,
            "primitive outcome counts"
        );
        tracing::info!("finished search for primitive values");

        result
    }
}
