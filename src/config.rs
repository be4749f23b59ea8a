//! Compare options.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! The threshold is quantized to an integer before hashing (multiplied by
//! 1e6 and rounded to i64), so `options_hash` is stable across platforms
//! and serde_json versions.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::content_hash::canonical_hash_hex;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Default next-best match threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Default number of values per hub → spoke batch frame.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Environment variable for the next-best match threshold.
pub const ENV_THRESHOLD: &str = "HEAP_RECONCILER_THRESHOLD";
/// Environment variable for the property cap.
pub const ENV_PROPERTY_CAP: &str = "HEAP_RECONCILER_PROPERTY_CAP";
/// Environment variable for the worker count.
pub const ENV_WORKERS: &str = "HEAP_RECONCILER_WORKERS";
/// Environment variable for the batch size.
pub const ENV_BATCH_SIZE: &str = "HEAP_RECONCILER_BATCH_SIZE";
/// Environment variable for the spoke timeout in seconds.
pub const ENV_WORKER_TIMEOUT_SECS: &str = "HEAP_RECONCILER_WORKER_TIMEOUT_SECS";

/// Invalid compare options.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Threshold outside `[0, 1]` or not a number.
    #[error("next-best match threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// A property cap of zero would make every pair incomparable.
    #[error("property cap must be at least 1")]
    ZeroPropertyCap,

    /// At least one worker is required.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// Batches must carry at least one value.
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Options for one compare run.
///
/// ## Parameters
///
/// - `next_best_match_threshold`: minimum similarity for a next-best match
/// - `property_cap`: stop scoring a pair after this many properties (unbounded if `None`)
/// - `worker_count`: number of spokes; `1` scores in-process
/// - `batch_size`: values per hub → spoke batch frame
/// - `worker_timeout`: bound on the wait for one spoke (disabled if `None`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Minimum similarity in `[0, 1]` for a next-best match.
    pub next_best_match_threshold: f64,
    /// Per-pair property cap.
    pub property_cap: Option<usize>,
    /// Number of parallel spokes.
    pub worker_count: usize,
    /// Values per batch frame.
    pub batch_size: usize,
    /// Maximum wait for one spoke's terminal frame.
    #[serde(default, with = "optional_secs")]
    pub worker_timeout: Option<Duration>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            next_best_match_threshold: DEFAULT_THRESHOLD,
            property_cap: None,
            worker_count: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_timeout: None,
        }
    }
}

impl CompareOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold, clamped to `[0, 1]`.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.next_best_match_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the per-pair property cap.
    pub fn with_property_cap(mut self, cap: usize) -> Self {
        self.property_cap = Some(cap);
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Bound the wait for each spoke.
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    /// Whether scoring fans out to spokes.
    pub fn is_parallel(&self) -> bool {
        self.worker_count > 1
    }

    /// Check the options. The engines assume validated options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.next_best_match_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        if self.property_cap == Some(0) {
            return Err(ConfigError::ZeroPropertyCap);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }

    /// Read options from `HEAP_RECONCILER_*` environment variables.
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read options through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(t) = parse_var::<f64, _>(&lookup, ENV_THRESHOLD)? {
            options.next_best_match_threshold = t;
        }
        if let Some(cap) = parse_var::<usize, _>(&lookup, ENV_PROPERTY_CAP)? {
            options.property_cap = Some(cap);
        }
        if let Some(workers) = parse_var::<usize, _>(&lookup, ENV_WORKERS)? {
            options.worker_count = workers;
        }
        if let Some(batch) = parse_var::<usize, _>(&lookup, ENV_BATCH_SIZE)? {
            options.batch_size = batch;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_WORKER_TIMEOUT_SECS)? {
            options.worker_timeout = Some(Duration::from_secs(secs));
        }

        options.validate()?;
        Ok(options)
    }

    /// Hash of the options, stable across platforms.
    pub fn options_hash(&self) -> Result<String, serde_json::Error> {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedOptions {
        QuantizedOptions {
            next_best_match_threshold: quantize_float(self.next_best_match_threshold),
            property_cap: self.property_cap,
            worker_count: self.worker_count,
            batch_size: self.batch_size,
            worker_timeout_ms: self.worker_timeout.map(|d| d.as_millis() as u64),
        }
    }
}

/// Quantized options for deterministic hashing.
#[derive(Debug, Clone, Serialize)]
struct QuantizedOptions {
    next_best_match_threshold: i64,
    property_cap: Option<usize>,
    worker_count: usize,
    batch_size: usize,
    worker_timeout_ms: Option<u64>,
}

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value: raw }),
    }
}

/// `Option<Duration>` as whole seconds.
mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = CompareOptions::default();
        assert_eq!(options.next_best_match_threshold, 0.7);
        assert_eq!(options.property_cap, None);
        assert_eq!(options.worker_count, 1);
        assert!(!options.is_parallel());
        assert!(options.worker_timeout.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps_threshold() {
        assert_eq!(CompareOptions::new().with_threshold(1.5).next_best_match_threshold, 1.0);
        assert_eq!(CompareOptions::new().with_threshold(-0.2).next_best_match_threshold, 0.0);
    }

    #[test]
    fn test_validate_rejects() {
        let mut options = CompareOptions::default();
        options.next_best_match_threshold = 1.2;
        assert_eq!(options.validate(), Err(ConfigError::InvalidThreshold(1.2)));

        assert_eq!(CompareOptions::new().with_property_cap(0).validate(), Err(ConfigError::ZeroPropertyCap));
        assert_eq!(CompareOptions::new().with_workers(0).validate(), Err(ConfigError::ZeroWorkers));
        assert_eq!(CompareOptions::new().with_batch_size(0).validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn test_from_lookup() {
        let options = CompareOptions::from_lookup(lookup(&[
            (ENV_THRESHOLD, "0.85"),
            (ENV_WORKERS, "4"),
            (ENV_WORKER_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();
        assert_eq!(options.next_best_match_threshold, 0.85);
        assert_eq!(options.worker_count, 4);
        assert_eq!(options.worker_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_from_lookup_invalid() {
        let err = CompareOptions::from_lookup(lookup(&[(ENV_WORKERS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: ENV_WORKERS, .. }));

        let err = CompareOptions::from_lookup(lookup(&[(ENV_THRESHOLD, "2")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidThreshold(2.0));
    }

    #[test]
    fn test_options_hash() {
        let a = CompareOptions::default();
        let b = CompareOptions::default();
        assert_eq!(a.options_hash().unwrap(), b.options_hash().unwrap());

        let c = CompareOptions::default().with_threshold(0.71);
        assert_ne!(a.options_hash().unwrap(), c.options_hash().unwrap());
    }

    #[test]
    fn test_serde_roundtrip_timeout() {
        let options = CompareOptions::default().with_worker_timeout(Duration::from_secs(5));
        let json = serde_json::to_string(&options).unwrap();
        let back: CompareOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
