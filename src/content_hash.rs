//! Structural content hashing for grouping matched values.
//!
//! The content hash is a grouping key, not an equality oracle:
//!
//! - Order-insensitive: object keys are hashed in sorted order and array
//!   elements as a sorted multiset of element hashes
//! - Type-insensitive: scalars hash through their string representation,
//!   so `1` and `"1"` share a key
//! - Stable: xxh64 with a fixed seed, rendered as 16 hex digits
//!
//! Deep equality (see [`Value::deep_equal`]) implies equal content hashes,
//! which lets the perfect-match engine bucket candidates by hash.

use serde::Serialize;
use std::hash::Hasher;
use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::types::Value;

const SEED: u64 = 0;

const TAG_SCALAR: u8 = b'S';
const TAG_ARRAY: u8 = b'A';
const TAG_OBJECT: u8 = b'O';

/// Compute the content hash of a value.
pub fn content_hash(value: &Value) -> u64 {
    let mut hasher = Xxh64::new(SEED);
    match value {
        Value::Array(items) => {
            let mut element_hashes: Vec<u64> = items.iter().map(content_hash).collect();
            element_hashes.sort_unstable();

            hasher.write_u8(TAG_ARRAY);
            hasher.write_u64(element_hashes.len() as u64);
            for h in element_hashes {
                hasher.write_u64(h);
            }
        }
        Value::Object(object) => {
            let mut names: Vec<&String> = object.properties.keys().collect();
            names.sort_unstable();

            hasher.write_u8(TAG_OBJECT);
            write_str(&mut hasher, &object.class);
            hasher.write_u64(names.len() as u64);
            for name in names {
                write_str(&mut hasher, name);
                hasher.write_u64(content_hash(&object.properties[name.as_str()]));
            }
        }
        scalar => {
            hasher.write_u8(TAG_SCALAR);
            write_str(&mut hasher, &scalar.scalar_key());
        }
    }
    hasher.finish()
}

/// Compute the content hash and return it as a hex string.
pub fn content_hash_hex(value: &Value) -> String {
    format!("{:016x}", content_hash(value))
}

/// Length-prefixed so adjacent strings cannot alias.
fn write_str(hasher: &mut Xxh64, s: &str) {
    hasher.write_u64(s.len() as u64);
    hasher.write(s.as_bytes());
}

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute the canonical hash of a serializable value as a hex string.
///
/// Struct fields hash in declaration order; callers hashing maps should use
/// `BTreeMap` and quantize floats first.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = to_canonical_bytes(value)?;
    Ok(format!("{:016x}", xxh64(&bytes, SEED)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let v = Value::object("Point", [("x", 1), ("y", 2)]);
        assert_eq!(content_hash_hex(&v), content_hash_hex(&v.clone()));
        assert_eq!(content_hash_hex(&v).len(), 16);
    }

    #[test]
    fn test_key_order_insensitive() {
        let a = Value::object("Point", [("x", 1), ("y", 2)]);
        let b = Value::object("Point", [("y", 2), ("x", 1)]);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_array_order_insensitive() {
        let a = Value::Array(vec![1.into(), "two".into(), Value::Null]);
        let b = Value::Array(vec![Value::Null, 1.into(), "two".into()]);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_type_insensitive_scalars() {
        assert_eq!(content_hash(&Value::from(1)), content_hash(&Value::from("1")));
        assert_eq!(content_hash(&Value::Number(-0.0)), content_hash(&Value::from(0)));
    }

    #[test]
    fn test_structure_changes_hash() {
        let a = Value::object("Point", [("x", 1), ("y", 2)]);
        let b = Value::object("Point", [("x", 1), ("y", 3)]);
        let c = Value::object("Point", [("x", 1)]);
        assert_ne!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));

        // Nesting is not flattened
        let flat = Value::Array(vec![1.into(), 2.into()]);
        let nested = Value::Array(vec![Value::Array(vec![1.into(), 2.into()])]);
        assert_ne!(content_hash(&flat), content_hash(&nested));
    }

    #[test]
    fn test_deep_equal_implies_same_hash() {
        let a = Value::object(
            "Node",
            [
                ("children", Value::Array(vec![Value::object("Leaf", [("v", 1)]), Value::Number(f64::NAN)])),
                ("name", "root".into()),
            ],
        );
        let b = Value::object(
            "Node",
            [
                ("name", "root".into()),
                ("children", Value::Array(vec![Value::Number(f64::NAN), Value::object("Leaf", [("v", 1)])])),
            ],
        );
        assert!(a.deep_equal(&b));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[derive(Serialize)]
    struct Params {
        name: String,
        value: i64,
    }

    #[test]
    fn test_canonical_hash_determinism() {
        let p = Params {
            name: "test".to_string(),
            value: 42,
        };
        assert_eq!(canonical_hash_hex(&p).unwrap(), canonical_hash_hex(&p).unwrap());
    }
}
