//! Matching engines.
//!
//! - [`perfect`]: exact structural duplicates
//! - [`next_best`]: greedy threshold-banded assignment of similar pairs
//! - [`object`]: the full object pipeline (perfect → score → select → disjunct)
//! - [`primitive`]: exact-match-only comparison of scalar records

pub mod next_best;
pub mod object;
pub mod perfect;
pub mod primitive;

pub use next_best::{candidate_order, select_next_best, NextBestMatches};
pub use object::ObjectComparator;
pub use perfect::{find_perfect_matches, PerfectMatches};
pub use primitive::PrimitiveComparator;

use crate::types::{DisjunctSet, Record};

/// Everything left in the pools becomes disjunct.
pub(crate) fn fill_disjunct(current: &[Record], next: &[Record]) -> DisjunctSet {
    DisjunctSet {
        current: current.iter().map(|r| r.id).collect(),
        next: next.iter().map(|r| r.id).collect(),
    }
}
