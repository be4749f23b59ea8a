//! Size and count summaries of a comparison result.
//!
//! Sizes come from [`SizeTable`]s captured before matching consumed the
//! records. Ids missing from a table contribute nothing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{ComparisonResult, MatchIndex, OutcomeCounts, RecordId, Side, SimilarityBand, SizeTable};

/// Summed sizes of one outcome on both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapSizes {
    /// Shallow bytes on the current side.
    pub current_shallow_heap_size: i64,
    /// Shallow bytes on the next side.
    pub next_shallow_heap_size: i64,
    /// Retained bytes on the current side.
    pub current_retained_heap_size: i64,
    /// Retained bytes on the next side.
    pub next_retained_heap_size: i64,
}

impl HeapSizes {
    fn measure<'a>(
        current_ids: impl IntoIterator<Item = &'a RecordId>,
        next_ids: impl IntoIterator<Item = &'a RecordId>,
        current_sizes: &SizeTable,
        next_sizes: &SizeTable,
    ) -> Self {
        let current = current_sizes.total(current_ids);
        let next = next_sizes.total(next_ids);
        Self {
            current_shallow_heap_size: current.shallow,
            next_shallow_heap_size: next.shallow,
            current_retained_heap_size: current.retained,
            next_retained_heap_size: next.retained,
        }
    }

    fn of_index(index: &MatchIndex, current_sizes: &SizeTable, next_sizes: &SizeTable) -> Self {
        let current: BTreeSet<&RecordId> = index.trackers().flat_map(|t| t.ids(Side::Current)).collect();
        let next: BTreeSet<&RecordId> = index.trackers().flat_map(|t| t.ids(Side::Next)).collect();
        Self::measure(current, next, current_sizes, next_sizes)
    }

    fn add(self, other: Self) -> Self {
        Self {
            current_shallow_heap_size: self.current_shallow_heap_size + other.current_shallow_heap_size,
            next_shallow_heap_size: self.next_shallow_heap_size + other.next_shallow_heap_size,
            current_retained_heap_size: self.current_retained_heap_size + other.current_retained_heap_size,
            next_retained_heap_size: self.next_retained_heap_size + other.next_retained_heap_size,
        }
    }
}

/// Sizes and match counts per similarity band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBestHeapSizes {
    /// Sizes per band.
    pub size_by_accuracy: BTreeMap<SimilarityBand, HeapSizes>,
    /// Matched current ids per band.
    pub amount_by_accuracy: BTreeMap<SimilarityBand, usize>,
}

/// Shallow size change between the generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalSizeDifference {
    /// Total shallow bytes on the current side.
    pub current_shallow_heap_size: i64,
    /// Total shallow bytes on the next side.
    pub next_shallow_heap_size: i64,
    /// `next - current`.
    pub difference: i64,
    /// `difference / next * 100`, or `0` when next is empty.
    pub percentage: f64,
}

/// Summary of one [`ComparisonResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStatistics {
    /// Overall shallow size change.
    pub total_size_difference: TotalSizeDifference,
    /// Ids per outcome per side.
    pub total_number_of_nodes: OutcomeCounts,
    /// Sizes of perfectly matched ids.
    pub heap_size_of_perfect_match: HeapSizes,
    /// Sizes and counts of next-best matched ids, per band.
    pub heap_size_of_next_best_match: NextBestHeapSizes,
    /// Sizes of disjunct ids.
    pub heap_size_of_disjunct_nodes: HeapSizes,
}

impl ComparisonStatistics {
    /// Summarise a result.
    pub fn compute(result: &ComparisonResult, current_sizes: &SizeTable, next_sizes: &SizeTable) -> Self {
        let perfect = HeapSizes::of_index(&result.perfect_match_nodes, current_sizes, next_sizes);

        let mut next_best = NextBestHeapSizes::default();
        let mut next_best_total = HeapSizes::default();
        for (band, index) in result.next_best_match_nodes.iter() {
            let sizes = HeapSizes::of_index(index, current_sizes, next_sizes);
            next_best_total = next_best_total.add(sizes);
            next_best.size_by_accuracy.insert(*band, sizes);
            next_best
                .amount_by_accuracy
                .insert(*band, index.id_count(Side::Current));
        }

        let disjunct = HeapSizes::measure(
            &result.disjunct_nodes.current,
            &result.disjunct_nodes.next,
            current_sizes,
            next_sizes,
        );

        let total = perfect.add(next_best_total).add(disjunct);
        let difference = total.next_shallow_heap_size - total.current_shallow_heap_size;
        let percentage = if total.next_shallow_heap_size == 0 {
            0.0
        } else {
            difference as f64 / total.next_shallow_heap_size as f64 * 100.0
        };

        Self {
            total_size_difference: TotalSizeDifference {
                current_shallow_heap_size: total.current_shallow_heap_size,
                next_shallow_heap_size: total.next_shallow_heap_size,
                difference,
                percentage,
            },
            total_number_of_nodes: result.counts(),
            heap_size_of_perfect_match: perfect,
            heap_size_of_next_best_match: next_best,
            heap_size_of_disjunct_nodes: disjunct,
        }
    }
}
