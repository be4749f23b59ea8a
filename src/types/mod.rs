//! Core types for the reconciler.

pub mod value;
pub mod record;
pub mod tracker;

pub use value::{
    Value, ObjectValue, ValueKind,
    CIRCULAR_REFERENCE_SENTINEL, UNDEFINED_KEY, DEFAULT_CLASS,
};
pub use record::{Record, RecordId, RecordSizes, SizeTable};
pub use tracker::{
    Side, MatchTracker, MatchIndex, PerfectMatchIndex,
    SimilarityBand, NextBestMatchIndex, DisjunctSet,
    Outcome, OutcomeCounts, ComparisonResult,
};
