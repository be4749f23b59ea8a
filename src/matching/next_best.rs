//! Greedy next-best match selection.
//!
//! Candidates are filtered by threshold and swept in descending similarity
//! order. A candidate is accepted when neither of its ids has been taken
//! yet; accepted pairs leave their pools. This is a greedy approximation,
//! not a maximum-weight bipartite matching.
//!
//! Equal similarities are ordered by ascending current id, then ascending
//! next id, so the selection is independent of candidate arrival order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::content_hash::content_hash_hex;
use crate::similarity::SimilarityCandidate;
use crate::types::{NextBestMatchIndex, Record, RecordId, SimilarityBand};

/// Result of the next-best phase.
#[derive(Debug, Clone, Default)]
pub struct NextBestMatches {
    /// Matched ids grouped by band, then content hash of the current value.
    pub index: NextBestMatchIndex,
    /// Unmatched current records, in input order.
    pub remaining_current: Vec<Record>,
    /// Unmatched next records, in input order.
    pub remaining_next: Vec<Record>,
}

/// Candidate ordering for the greedy sweep: best first.
pub fn candidate_order(a: &SimilarityCandidate, b: &SimilarityCandidate) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.current_id.cmp(&b.current_id))
        .then_with(|| a.next_id.cmp(&b.next_id))
}

/// Records still available for matching, addressable by id.
struct Pool {
    slots: Vec<Option<Record>>,
    positions: BTreeMap<RecordId, usize>,
}

impl Pool {
    fn new(records: Vec<Record>) -> Self {
        let positions = records.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
        Self {
            slots: records.into_iter().map(Some).collect(),
            positions,
        }
    }

    fn get(&self, id: &RecordId) -> Option<&Record> {
        let pos = *self.positions.get(id)?;
        self.slots[pos].as_ref()
    }

    fn take(&mut self, id: &RecordId) -> Option<Record> {
        let pos = *self.positions.get(id)?;
        self.slots[pos].take()
    }

    fn into_remaining(self) -> Vec<Record> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Greedily assign candidates at or above `threshold` into similarity bands.
///
/// Candidates naming ids that are not in the pools (or already taken) are
/// skipped.
pub fn select_next_best(
    mut candidates: Vec<SimilarityCandidate>,
    threshold: f64,
    current: Vec<Record>,
    next: Vec<Record>,
) -> NextBestMatches {
    candidates.retain(|c| c.similarity >= threshold);
    candidates.sort_by(candidate_order);

    tracing::info!(
        candidates = candidates.len(),
        threshold = threshold,
        "starting next best match selection"
    );

    let mut current_pool = Pool::new(current);
    let mut next_pool = Pool::new(next);
    let mut index = NextBestMatchIndex::new();
    let mut accepted = 0usize;

    for candidate in &candidates {
        if next_pool.get(&candidate.next_id).is_none() {
            continue;
        }
        let Some(current_record) = current_pool.take(&candidate.current_id) else {
            continue;
        };
        next_pool.take(&candidate.next_id);

        let band = SimilarityBand::from_similarity(candidate.similarity);
        index.band_mut(band).record(
            content_hash_hex(&current_record.value),
            candidate.current_id,
            candidate.next_id,
        );
        accepted += 1;
    }

    tracing::info!(accepted = accepted, "finished next best match selection");

    NextBestMatches {
        index,
        remaining_current: current_pool.into_remaining(),
        remaining_next: next_pool.into_remaining(),
    }
}
