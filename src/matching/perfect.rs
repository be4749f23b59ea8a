//! Exact-duplicate matching.
//!
//! Each current record takes the first unconsumed next record (in encounter
//! order) whose value is deeply equal to its own. Next records are bucketed
//! by content hash first; deep equality implies equal hashes, so the bucket
//! holds every possible partner in its original order.

use std::collections::BTreeMap;

use crate::content_hash::{content_hash, content_hash_hex};
use crate::similarity::{format_progress, progress_step};
use crate::types::{PerfectMatchIndex, Record};

/// Result of the perfect-match phase.
#[derive(Debug, Clone, Default)]
pub struct PerfectMatches {
    /// Matched ids grouped by content hash.
    pub index: PerfectMatchIndex,
    /// Unmatched current records, in input order.
    pub remaining_current: Vec<Record>,
    /// Unmatched next records, in input order.
    pub remaining_next: Vec<Record>,
}

/// Find and remove exact structural duplicates.
pub fn find_perfect_matches(current: Vec<Record>, next: Vec<Record>) -> PerfectMatches {
    tracing::info!(
        current = current.len(),
        next = next.len(),
        "starting perfect match search"
    );

    let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (i, record) in next.iter().enumerate() {
        buckets.entry(content_hash(&record.value)).or_default().push(i);
    }

    let mut index = PerfectMatchIndex::new();
    let mut next_consumed = vec![false; next.len()];
    let mut remaining_current = Vec::new();
    let total = current.len();
    let step = progress_step(total);

    for (i, record) in current.into_iter().enumerate() {
        let hash = content_hash(&record.value);
        let partner = buckets.get_mut(&hash).and_then(|bucket| {
            let pos = bucket
                .iter()
                .position(|&n| record.value.deep_equal(&next[n].value))?;
            Some(bucket.remove(pos))
        });

        match partner {
            Some(n) => {
                next_consumed[n] = true;
                index.record(content_hash_hex(&record.value), record.id, next[n].id);
            }
            None => remaining_current.push(record),
        }

        if (i + 1) % step == 0 {
            tracing::debug!(progress = %format_progress(i + 1, total), "perfect match search");
        }
    }

    let remaining_next: Vec<Record> = next
        .into_iter()
        .zip(next_consumed)
        .filter_map(|(record, consumed)| (!consumed).then_some(record))
        .collect();

    tracing::info!(
        groups = index.len(),
        remaining_current = remaining_current.len(),
        remaining_next = remaining_next.len(),
        "finished perfect match search"
    );

    PerfectMatches {
        index,
        remaining_current,
        remaining_next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordId, Side, Value};

    fn point(x: i64, y: i64) -> Value {
        Value::object("Point", [("x", x), ("y", y)])
    }

    #[test]
    fn test_single_match() {
        let result = find_perfect_matches(
            vec![Record::new(1, point(1, 2))],
            vec![Record::new(10, Value::object("Point", [("y", 2), ("x", 1)]))],
        );

        assert_eq!(result.index.len(), 1);
        let tracker = result.index.trackers().next().unwrap();
        assert!(tracker.ids(Side::Current).contains(&RecordId::new(1)));
        assert!(tracker.ids(Side::Next).contains(&RecordId::new(10)));
        assert!(result.remaining_current.is_empty());
        assert!(result.remaining_next.is_empty());
    }

    #[test]
    fn test_first_partner_by_encounter_order() {
        let result = find_perfect_matches(
            vec![Record::new(1, point(1, 2))],
            vec![
                Record::new(10, point(9, 9)),
                Record::new(11, point(1, 2)),
                Record::new(12, point(1, 2)),
            ],
        );

        assert!(result.index.contains(Side::Next, &RecordId::new(11)));
        let left: Vec<i64> = result.remaining_next.iter().map(|r| r.id.get()).collect();
        assert_eq!(left, vec![10, 12]);
    }

    #[test]
    fn test_duplicates_share_tracker() {
        let result = find_perfect_matches(
            vec![Record::new(1, point(1, 2)), Record::new(2, point(1, 2))],
            vec![Record::new(10, point(1, 2)), Record::new(11, point(1, 2))],
        );

        assert_eq!(result.index.len(), 1);
        let tracker = result.index.trackers().next().unwrap();
        assert_eq!(tracker.ids(Side::Current).len(), 2);
        assert_eq!(tracker.ids(Side::Next).len(), 2);
    }

    #[test]
    fn test_hash_collision_without_equality_is_rejected() {
        // Same content hash (type-insensitive) but not deeply equal
        let result = find_perfect_matches(
            vec![Record::new(1, Value::object("A", [("v", 1)]))],
            vec![Record::new(10, Value::object("A", [("v", "1")]))],
        );
        assert!(result.index.is_empty());
        assert_eq!(result.remaining_current.len(), 1);
        assert_eq!(result.remaining_next.len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        let result = find_perfect_matches(Vec::new(), vec![Record::new(1, point(0, 0))]);
        assert!(result.index.is_empty());
        assert_eq!(result.remaining_next.len(), 1);
    }
}
