//! Snapshot records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;

/// Identifier of a heap node within one snapshot generation.
///
/// Unique per side (current or next), not globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw node id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw node id.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        Self(id as i64)
    }
}

/// A normalized heap node as produced by the snapshot loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Node id, unique within its generation.
    pub id: RecordId,
    /// Size of the node itself in bytes.
    #[serde(default)]
    pub shallow_size: i64,
    /// Size kept alive by the node in bytes.
    #[serde(default)]
    pub retained_size: i64,
    /// Reference-resolved, cycle-free content.
    pub value: Value,
}

impl Record {
    /// Create a record with zero sizes.
    pub fn new(id: impl Into<RecordId>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            shallow_size: 0,
            retained_size: 0,
            value: value.into(),
        }
    }

    /// Set the shallow and retained sizes.
    pub fn with_sizes(mut self, shallow_size: i64, retained_size: i64) -> Self {
        self.shallow_size = shallow_size;
        self.retained_size = retained_size;
        self
    }
}

/// Sizes of one record, kept after the record itself has been consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSizes {
    /// Shallow size in bytes.
    pub shallow: i64,
    /// Retained size in bytes.
    pub retained: i64,
}

/// Id → sizes lookup for one generation.
///
/// Matching consumes records, so anything that needs sizes afterwards
/// (statistics, reports) captures a table first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeTable {
    sizes: BTreeMap<RecordId, RecordSizes>,
}

impl SizeTable {
    /// Capture sizes from a record collection.
    pub fn from_records(records: &[Record]) -> Self {
        let sizes = records
            .iter()
            .map(|r| {
                (
                    r.id,
                    RecordSizes {
                        shallow: r.shallow_size,
                        retained: r.retained_size,
                    },
                )
            })
            .collect();
        Self { sizes }
    }

    /// Sizes for an id, if known.
    pub fn get(&self, id: &RecordId) -> Option<RecordSizes> {
        self.sizes.get(id).copied()
    }

    /// Summed sizes of the given ids; unknown ids contribute nothing.
    pub fn total<'a>(&self, ids: impl IntoIterator<Item = &'a RecordId>) -> RecordSizes {
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .fold(RecordSizes::default(), |acc, s| RecordSizes {
                shallow: acc.shallow + s.shallow,
                retained: acc.retained + s.retained,
            })
    }

    /// Number of ids in the table.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let json = r#"{"id":7,"shallowSize":16,"retainedSize":64,"value":"hello"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, RecordId::new(7));
        assert_eq!(record.shallow_size, 16);
        assert_eq!(record.retained_size, 64);
        assert_eq!(record.value, Value::from("hello"));
    }

    #[test]
    fn test_size_table_total_skips_unknown_ids() {
        let records = vec![
            Record::new(1, 1).with_sizes(10, 100),
            Record::new(2, 2).with_sizes(20, 200),
        ];
        let table = SizeTable::from_records(&records);
        let ids = [RecordId::new(1), RecordId::new(2), RecordId::new(99)];

        let total = table.total(ids.iter());
        assert_eq!(total.shallow, 30);
        assert_eq!(total.retained, 300);
    }
}
