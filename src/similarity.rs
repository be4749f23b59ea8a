//! Structural fuzzy similarity between two values.
//!
//! The scorer walks both values side by side with a FIFO worklist and counts
//! leaf-level properties: every leaf pair contributes one property, and one
//! match when the leaves are strictly equal. A property present on only one
//! side contributes a property and no match.
//!
//! ## Scoring rules
//!
//! | lhs / rhs | contribution |
//! |---|---|
//! | scalar / scalar of the same kind | `{1, 1}` if strictly equal, else `{1, 0}` |
//! | either `Null` | `{1, 1}` if both null, else `{1, 0}` |
//! | array / array | shared indices are queued, extra indices `{1, 0}` each |
//! | object / object | shared names are queued, one-sided names `{1, 0}` each |
//! | any other kind mismatch | `{1, 0}` |
//!
//! The object class name is not a scored property.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{Record, RecordId, Value};

/// Matching and total leaf-property counts of one comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTally {
    /// Leaf properties that were strictly equal.
    pub matching: usize,
    /// Leaf properties visited.
    pub property_count: usize,
}

impl PropertyTally {
    /// Count one leaf property.
    fn push(&mut self, matched: bool) {
        self.property_count += 1;
        if matched {
            self.matching += 1;
        }
    }

    /// Whether the comparison saw any properties at all.
    ///
    /// Pairs without properties are never match candidates.
    pub fn is_comparable(&self) -> bool {
        self.property_count > 0
    }

    /// `matching / property_count`, clamped to `[0, 1]`; `0` when nothing was compared.
    pub fn similarity(&self) -> f64 {
        if self.property_count == 0 {
            return 0.0;
        }
        (self.matching as f64 / self.property_count as f64).clamp(0.0, 1.0)
    }
}

/// Score two values.
///
/// `property_cap` stops the walk once that many properties have been
/// counted; pairs already expanded from the current node are still counted,
/// so the final tally can slightly exceed the cap.
pub fn score(lhs: &Value, rhs: &Value, property_cap: Option<usize>) -> PropertyTally {
    let mut tally = PropertyTally::default();
    let mut worklist: VecDeque<(&Value, &Value)> = VecDeque::new();
    worklist.push_back((lhs, rhs));

    while let Some((lhs, rhs)) = worklist.pop_front() {
        if property_cap.is_some_and(|cap| tally.property_count >= cap) {
            break;
        }

        match (lhs, rhs) {
            (Value::Null, _) | (_, Value::Null) => {
                tally.push(matches!((lhs, rhs), (Value::Null, Value::Null)));
            }
            (Value::Array(left), Value::Array(right)) => {
                for i in 0..left.len().max(right.len()) {
                    match (left.get(i), right.get(i)) {
                        (Some(l), Some(r)) => worklist.push_back((l, r)),
                        _ => tally.push(false),
                    }
                }
            }
            (Value::Object(left), Value::Object(right)) => {
                for (name, l) in &left.properties {
                    match right.properties.get(name) {
                        Some(r) => worklist.push_back((l, r)),
                        None => tally.push(false),
                    }
                }
                for name in right.properties.keys() {
                    if !left.properties.contains_key(name) {
                        tally.push(false);
                    }
                }
            }
            (l, r) if !l.is_container() && l.kind() == r.kind() => {
                tally.push(l.strict_eq(r));
            }
            _ => tally.push(false),
        }
    }

    tally
}

/// A scored (current, next) pair that may become a next-best match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityCandidate {
    /// Id on the current side.
    pub current_id: RecordId,
    /// Id on the next side.
    pub next_id: RecordId,
    /// Similarity in `[0, 1]`.
    pub similarity: f64,
}

impl SimilarityCandidate {
    /// Create a candidate, clamping the similarity into `[0, 1]`.
    ///
    /// A non-finite similarity becomes `0`.
    pub fn new(current_id: RecordId, next_id: RecordId, similarity: f64) -> Self {
        let similarity = if similarity.is_finite() {
            similarity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            current_id,
            next_id,
            similarity,
        }
    }
}

/// Score one pair of records.
///
/// Returns `None` for pairs without comparable properties.
pub fn score_pair(current: &Record, next: &Record, property_cap: Option<usize>) -> Option<SimilarityCandidate> {
    let tally = score(&current.value, &next.value, property_cap);
    tally
        .is_comparable()
        .then(|| SimilarityCandidate::new(current.id, next.id, tally.similarity()))
}

/// Score one current record against a pool of next records, keeping
/// candidates at or above `threshold`.
pub fn score_row(
    current: &Record,
    next: &[Record],
    threshold: f64,
    property_cap: Option<usize>,
) -> Vec<SimilarityCandidate> {
    next.iter()
        .filter_map(|n| score_pair(current, n, property_cap))
        .filter(|c| c.similarity >= threshold)
        .collect()
}

/// Score every (current, next) pair in-process.
///
/// Progress is logged at debug level every `max(1, n / 100)` current records.
pub fn score_all(
    current: &[Record],
    next: &[Record],
    threshold: f64,
    property_cap: Option<usize>,
) -> Vec<SimilarityCandidate> {
    let total = current.len();
    let step = progress_step(total);
    let mut candidates = Vec::new();

    for (i, record) in current.iter().enumerate() {
        candidates.extend(score_row(record, next, threshold, property_cap));

        if i % step == 0 {
            tracing::debug!(
                scored = i,
                total = total,
                progress = %format_progress(i, total),
                "scoring pairs"
            );
        }
    }

    tracing::debug!(candidates = candidates.len(), "scoring finished");
    candidates
}

/// Progress reporting interval for `total` items.
pub(crate) fn progress_step(total: usize) -> usize {
    (total / 100).max(1)
}

/// Percentage with two decimals, e.g. `"42.00%"`.
pub(crate) fn format_progress(done: usize, total: usize) -> String {
    if total == 0 {
        return "100%".to_string();
    }
    format!("{:.2}%", done as f64 / total as f64 * 100.0)
}
