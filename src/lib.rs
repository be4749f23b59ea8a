//! # heap-reconciler
//!
//! Reconciles two snapshots of a program's live object population.
//!
//! Every record from the "current" and the "next" snapshot ends up in
//! exactly one outcome:
//!
//! > **perfect match** (an exact structural duplicate on the other side),
//! > **next-best match** (a similar counterpart, banded by similarity), or
//! > **disjunct** (no counterpart).
//!
//! ## Architecture
//!
//! ```text
//! current, next ─→ find_perfect_matches ─→ remaining pairs
//!                                             │
//!                     score_all (1 worker) or MatchHub ─→ spokes (N workers)
//!                                             │
//!                                   select_next_best ─→ disjunct
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same input + same options → identical serialized result
//! - Equal similarities are resolved by ascending current id, then next id
//! - The number of workers does not change the result
//! - All result containers are ordered (`BTreeMap`/`BTreeSet`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod content_hash;
pub mod similarity;
pub mod config;
pub mod matching;
pub mod hub;
pub mod comparator;
pub mod statistics;

// Re-exports
pub use types::{
    Value, ObjectValue, ValueKind, Record, RecordId, RecordSizes, SizeTable,
    Side, MatchTracker, MatchIndex, PerfectMatchIndex, SimilarityBand,
    NextBestMatchIndex, DisjunctSet, Outcome, OutcomeCounts, ComparisonResult,
    CIRCULAR_REFERENCE_SENTINEL, UNDEFINED_KEY,
};
pub use content_hash::{content_hash, content_hash_hex, canonical_hash_hex};
pub use similarity::{score, score_pair, score_row, score_all, PropertyTally, SimilarityCandidate};
pub use config::{CompareOptions, ConfigError};
pub use matching::{
    find_perfect_matches, select_next_best, PerfectMatches, NextBestMatches,
    ObjectComparator, PrimitiveComparator,
};
pub use hub::{
    run_spoke, MatchHub, SpokeLauncher, InProcessLauncher, ProcessLauncher,
    SpokeConnection, SpokeRequest, SpokeResponse, ScoringParams, TransportError,
};
pub use comparator::{Snapshot, SnapshotComparator, SnapshotComparison, SnapshotSizes, SnapshotStatistics};
pub use statistics::ComparisonStatistics;

/// Schema version of the serialized result and wire formats.
/// Increment on breaking changes to any serialized type.
pub const RECONCILER_SCHEMA_VERSION: &str = "1.0.0";
