//! Outcome containers for a compare run.
//!
//! Every container uses `BTreeMap`/`BTreeSet` so that serialized results
//! are byte-identical across runs with the same input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::record::RecordId;

/// Which generation an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The earlier ("current") snapshot.
    Current,
    /// The later ("next") snapshot.
    Next,
}

/// Ids on both sides judged equivalent under one grouping key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTracker {
    /// Matched ids from the current generation.
    pub current_ids: BTreeSet<RecordId>,
    /// Matched ids from the next generation.
    pub next_ids: BTreeSet<RecordId>,
}

impl MatchTracker {
    /// Record one matched pair.
    pub fn add(&mut self, current: RecordId, next: RecordId) {
        self.current_ids.insert(current);
        self.next_ids.insert(next);
    }

    /// Ids tracked on one side.
    pub fn ids(&self, side: Side) -> &BTreeSet<RecordId> {
        match side {
            Side::Current => &self.current_ids,
            Side::Next => &self.next_ids,
        }
    }
}

/// Content hash → tracker map.
///
/// Trackers are created lazily the first time a key is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchIndex {
    trackers: BTreeMap<String, MatchTracker>,
}

/// Perfect matches grouped by content hash.
pub type PerfectMatchIndex = MatchIndex;

impl MatchIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch-or-create the tracker for a grouping key.
    pub fn tracker_mut(&mut self, key: impl Into<String>) -> &mut MatchTracker {
        self.trackers.entry(key.into()).or_default()
    }

    /// Record a matched pair under a grouping key.
    pub fn record(&mut self, key: impl Into<String>, current: RecordId, next: RecordId) {
        self.tracker_mut(key).add(current, next);
    }

    /// Tracker for a key, if any pair was recorded under it.
    pub fn get(&self, key: &str) -> Option<&MatchTracker> {
        self.trackers.get(key)
    }

    /// Iterate over `(key, tracker)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MatchTracker)> {
        self.trackers.iter()
    }

    /// Iterate over trackers in key order.
    pub fn trackers(&self) -> impl Iterator<Item = &MatchTracker> {
        self.trackers.values()
    }

    /// Number of grouping keys.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Whether no pair has been recorded.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Total number of ids tracked on one side.
    pub fn id_count(&self, side: Side) -> usize {
        self.trackers.values().map(|t| t.ids(side).len()).sum()
    }

    /// Whether an id is tracked on one side.
    pub fn contains(&self, side: Side, id: &RecordId) -> bool {
        self.trackers.values().any(|t| t.ids(side).contains(id))
    }
}

/// One of the 21 five-percent similarity buckets (`0, 5, ..., 100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityBand(u8);

impl SimilarityBand {
    /// Exact-similarity band.
    pub const EXACT: SimilarityBand = SimilarityBand(100);

    /// Lowest band, for similarities below 5%.
    pub const LOWEST: SimilarityBand = SimilarityBand(0);

    /// All bands, highest first.
    pub fn all() -> impl DoubleEndedIterator<Item = SimilarityBand> {
        (0..=20u8).rev().map(|step| SimilarityBand(step * 5))
    }

    /// Band for a similarity on the 0–100 scale.
    ///
    /// `100` has its own band; anything else falls to the nearest lower
    /// multiple of 5, and values below 5 land in band `0`.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 100.0 {
            return Self::EXACT;
        }
        // Boundary comparisons: 94.999.. must stay in band 90.
        for step in (1..=19u8).rev() {
            let lower = step * 5;
            if percent >= f64::from(lower) {
                return SimilarityBand(lower);
            }
        }
        Self::LOWEST
    }

    /// Band for a similarity on the 0–1 scale.
    pub fn from_similarity(similarity: f64) -> Self {
        Self::from_percent(similarity * 100.0)
    }

    /// Lower bound of the band in percent.
    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SimilarityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Next-best matches: one [`MatchIndex`] per similarity band.
///
/// All 21 bands are present from construction, empty or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NextBestMatchIndex {
    bands: BTreeMap<SimilarityBand, MatchIndex>,
}

impl Default for NextBestMatchIndex {
    fn default() -> Self {
        Self {
            bands: SimilarityBand::all().map(|b| (b, MatchIndex::new())).collect(),
        }
    }
}

impl NextBestMatchIndex {
    /// Create an index with all bands empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index for one band.
    pub fn band(&self, band: SimilarityBand) -> Option<&MatchIndex> {
        self.bands.get(&band)
    }

    /// Mutable index for one band.
    pub fn band_mut(&mut self, band: SimilarityBand) -> &mut MatchIndex {
        self.bands.entry(band).or_default()
    }

    /// Iterate over bands, highest similarity first.
    pub fn iter(&self) -> impl Iterator<Item = (&SimilarityBand, &MatchIndex)> {
        self.bands.iter().rev()
    }

    /// Total number of ids tracked on one side across all bands.
    pub fn id_count(&self, side: Side) -> usize {
        self.bands.values().map(|index| index.id_count(side)).sum()
    }

    /// Band holding an id on one side, if it was matched.
    pub fn band_of(&self, side: Side, id: &RecordId) -> Option<SimilarityBand> {
        self.bands
            .iter()
            .find(|(_, index)| index.contains(side, id))
            .map(|(band, _)| *band)
    }

    /// Whether no pair has been recorded in any band.
    pub fn is_empty(&self) -> bool {
        self.bands.values().all(MatchIndex::is_empty)
    }
}

/// Ids left without a counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisjunctSet {
    /// Unmatched ids from the current generation.
    pub current: BTreeSet<RecordId>,
    /// Unmatched ids from the next generation.
    pub next: BTreeSet<RecordId>,
}

impl DisjunctSet {
    /// Ids on one side.
    pub fn ids(&self, side: Side) -> &BTreeSet<RecordId> {
        match side {
            Side::Current => &self.current,
            Side::Next => &self.next,
        }
    }
}

/// Where a single id ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exact structural duplicate.
    PerfectMatch,
    /// Similar counterpart in the given band.
    NextBestMatch(SimilarityBand),
    /// No counterpart.
    Disjunct,
}

/// Number of ids per outcome per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    /// Current ids in perfect matches.
    pub perfect_matches_current_nodes: usize,
    /// Next ids in perfect matches.
    pub perfect_matches_next_nodes: usize,
    /// Current ids in next-best matches.
    pub next_best_matches_current_nodes: usize,
    /// Next ids in next-best matches.
    pub next_best_matches_next_nodes: usize,
    /// Disjunct current ids.
    pub disjunct_current_nodes: usize,
    /// Disjunct next ids.
    pub disjunct_next_nodes: usize,
}

/// Result of one compare run.
///
/// Read-only once returned; safe to share between reporters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Exact duplicates grouped by content hash.
    pub perfect_match_nodes: PerfectMatchIndex,
    /// Similar pairs grouped by band, then by content hash.
    pub next_best_match_nodes: NextBestMatchIndex,
    /// Ids without a counterpart.
    pub disjunct_nodes: DisjunctSet,
}

impl ComparisonResult {
    /// Count ids per outcome.
    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            perfect_matches_current_nodes: self.perfect_match_nodes.id_count(Side::Current),
            perfect_matches_next_nodes: self.perfect_match_nodes.id_count(Side::Next),
            next_best_matches_current_nodes: self.next_best_match_nodes.id_count(Side::Current),
            next_best_matches_next_nodes: self.next_best_match_nodes.id_count(Side::Next),
            disjunct_current_nodes: self.disjunct_nodes.current.len(),
            disjunct_next_nodes: self.disjunct_nodes.next.len(),
        }
    }

    /// Every outcome an id appears in. A well-formed result yields exactly one.
    pub fn outcomes_of(&self, side: Side, id: &RecordId) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for tracker in self.perfect_match_nodes.trackers() {
            if tracker.ids(side).contains(id) {
                outcomes.push(Outcome::PerfectMatch);
            }
        }
        for (band, index) in self.next_best_match_nodes.iter() {
            for tracker in index.trackers() {
                if tracker.ids(side).contains(id) {
                    outcomes.push(Outcome::NextBestMatch(*band));
                }
            }
        }
        if self.disjunct_nodes.ids(side).contains(id) {
            outcomes.push(Outcome::Disjunct);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banding_boundaries() {
        assert_eq!(SimilarityBand::from_percent(92.3).percent(), 90);
        assert_eq!(SimilarityBand::from_percent(100.0).percent(), 100);
        assert_eq!(SimilarityBand::from_percent(99.99).percent(), 95);
        assert_eq!(SimilarityBand::from_percent(5.0).percent(), 5);
        assert_eq!(SimilarityBand::from_percent(4.9).percent(), 0);
        assert_eq!(SimilarityBand::from_percent(0.0).percent(), 0);
        assert_eq!(SimilarityBand::from_similarity(2.0 / 3.0).percent(), 65);
    }

    #[test]
    fn test_all_bands_present() {
        let index = NextBestMatchIndex::new();
        let bands: Vec<u8> = index.iter().map(|(b, _)| b.percent()).collect();
        assert_eq!(bands.len(), 21);
        assert_eq!(bands.first(), Some(&100));
        assert_eq!(bands.last(), Some(&0));
        assert!(index.is_empty());
    }

    #[test]
    fn test_tracker_created_lazily() {
        let mut index = MatchIndex::new();
        assert!(index.get("abc").is_none());

        index.record("abc", RecordId::new(1), RecordId::new(10));
        index.record("abc", RecordId::new(2), RecordId::new(20));

        let tracker = index.get("abc").unwrap();
        assert_eq!(tracker.current_ids.len(), 2);
        assert_eq!(tracker.next_ids.len(), 2);
        assert_eq!(index.id_count(Side::Next), 2);
    }

    #[test]
    fn test_result_json_uses_band_keys() {
        let mut result = ComparisonResult::default();
        result
            .next_best_match_nodes
            .band_mut(SimilarityBand::from_percent(66.7))
            .record("k", RecordId::new(1), RecordId::new(10));

        let json = serde_json::to_value(&result).unwrap();
        let tracker = &json["nextBestMatchNodes"]["65"]["k"];
        assert_eq!(tracker["currentIds"], serde_json::json!([1]));
        assert_eq!(tracker["nextIds"], serde_json::json!([10]));
    }

    #[test]
    fn test_outcomes_of() {
        let mut result = ComparisonResult::default();
        result.perfect_match_nodes.record("p", RecordId::new(1), RecordId::new(10));
        result.disjunct_nodes.next.insert(RecordId::new(11));

        assert_eq!(
            result.outcomes_of(Side::Current, &RecordId::new(1)),
            vec![Outcome::PerfectMatch]
        );
        assert_eq!(
            result.outcomes_of(Side::Next, &RecordId::new(11)),
            vec![Outcome::Disjunct]
        );
        assert!(result.outcomes_of(Side::Current, &RecordId::new(2)).is_empty());
    }
}
