//! Whole-snapshot comparison.
//!
//! A normalized snapshot holds two record populations: structured objects
//! and primitive scalars. Primitives go through the exact-match-only
//! [`PrimitiveComparator`]; objects go through the full
//! [`ObjectComparator`] pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CompareOptions;
use crate::hub::SpokeLauncher;
use crate::matching::{ObjectComparator, PrimitiveComparator};
use crate::statistics::ComparisonStatistics;
use crate::types::{ComparisonResult, Record, SizeTable};

/// One normalized snapshot, as produced by the snapshot loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Structured object records.
    #[serde(default)]
    pub objects: Vec<Record>,
    /// Scalar records.
    #[serde(default)]
    pub primitives: Vec<Record>,
}

impl Snapshot {
    /// Capture record sizes before the snapshot is consumed.
    pub fn size_tables(&self) -> SnapshotSizes {
        SnapshotSizes {
            objects: SizeTable::from_records(&self.objects),
            primitives: SizeTable::from_records(&self.primitives),
        }
    }
}

/// Size tables for both populations of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSizes {
    /// Object record sizes.
    pub objects: SizeTable,
    /// Primitive record sizes.
    pub primitives: SizeTable,
}

/// Results for both populations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotComparison {
    /// Object record outcomes.
    pub objects: ComparisonResult,
    /// Primitive record outcomes.
    pub primitives: ComparisonResult,
}

/// Statistics for both populations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatistics {
    /// Object statistics.
    pub objects: ComparisonStatistics,
    /// Primitive statistics.
    pub primitives: ComparisonStatistics,
}

impl SnapshotComparison {
    /// Summarise both results.
    pub fn statistics(&self, current: &SnapshotSizes, next: &SnapshotSizes) -> SnapshotStatistics {
        SnapshotStatistics {
            objects: ComparisonStatistics::compute(&self.objects, &current.objects, &next.objects),
            primitives: ComparisonStatistics::compute(&self.primitives, &current.primitives, &next.primitives),
        }
    }
}

/// Compares two snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotComparator {
    options: CompareOptions,
    objects: ObjectComparator,
}

impl SnapshotComparator {
    /// Create a comparator. Options should be validated first.
    pub fn new(options: CompareOptions) -> Self {
        Self {
            objects: ObjectComparator::new(options.clone()),
            options,
        }
    }

    /// Use a different spoke launcher for parallel object scoring.
    pub fn with_launcher(mut self, launcher: Arc<dyn SpokeLauncher>) -> Self {
        self.objects = self.objects.with_launcher(launcher);
        self
    }

    /// Compare primitives, then objects.
    pub async fn compare(&self, current: Snapshot, next: Snapshot) -> SnapshotComparison {
        match self.options.options_hash() {
            Ok(hash) => tracing::info!(
                options_hash = %hash,
                threshold = self.options.next_best_match_threshold,
                workers = self.options.worker_count,
                "comparing snapshots"
            ),
            Err(e) => tracing::warn!(error = %e, "could not hash compare options"),
        }

        let primitives = PrimitiveComparator::new().compare(current.primitives, next.primitives);
        let objects = self.objects.compare(current.objects, next.objects).await;

        SnapshotComparison { objects, primitives }
    }
}
