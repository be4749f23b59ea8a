//! Hub ↔ spoke wire frames.
//!
//! ## Hub → spoke
//!
//! ```text
//! {"currentValues":[..],"nextValues":[]}            batch (either list may be empty)
//! {"currentValues":[],"nextValues":[..]}            batch
//! {"currentValues":[],"nextValues":[],"threshold":0.7,"propertyCap":null}   end of input
//! ```
//!
//! ## Spoke → hub
//!
//! ```text
//! {"info":"12 current values and 40 next values received"}
//! {"currentId":1,"nextId":10,"similarity":0.75}
//! {"finished":true}
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{CompareOptions, DEFAULT_THRESHOLD};
use crate::similarity::SimilarityCandidate;
use crate::types::Record;

/// Scoring parameters carried by the end-of-input frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringParams {
    /// Minimum similarity for a match frame.
    pub threshold: f64,
    /// Per-pair property cap.
    pub property_cap: Option<usize>,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            property_cap: None,
        }
    }
}

impl From<&CompareOptions> for ScoringParams {
    fn from(options: &CompareOptions) -> Self {
        Self {
            threshold: options.next_best_match_threshold,
            property_cap: options.property_cap,
        }
    }
}

/// Kind of a hub → spoke frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Carries records.
    Batch,
    /// Both lists empty: no more records follow.
    EndOfInput,
}

/// A hub → spoke frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpokeRequest {
    /// Current records in this batch.
    #[serde(default)]
    pub current_values: Vec<Record>,
    /// Next records in this batch.
    #[serde(default)]
    pub next_values: Vec<Record>,
    /// Threshold, set on the end-of-input frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Property cap, set on the end-of-input frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_cap: Option<usize>,
}

impl SpokeRequest {
    /// A batch frame.
    pub fn batch(current_values: Vec<Record>, next_values: Vec<Record>) -> Self {
        Self {
            current_values,
            next_values,
            threshold: None,
            property_cap: None,
        }
    }

    /// The terminal control frame.
    pub fn end_of_input(params: ScoringParams) -> Self {
        Self {
            current_values: Vec::new(),
            next_values: Vec::new(),
            threshold: Some(params.threshold),
            property_cap: params.property_cap,
        }
    }

    /// Both lists empty.
    ///
    /// A batch frame is never empty, so this is the end-of-input signal
    /// whether or not parameters are attached.
    pub fn is_end_of_input(&self) -> bool {
        self.current_values.is_empty() && self.next_values.is_empty()
    }

    /// Frame kind.
    pub fn kind(&self) -> RequestKind {
        if self.is_end_of_input() {
            RequestKind::EndOfInput
        } else {
            RequestKind::Batch
        }
    }

    /// Scoring parameters, defaulting any that are missing.
    pub fn params(&self) -> ScoringParams {
        let defaults = ScoringParams::default();
        ScoringParams {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            property_cap: self.property_cap,
        }
    }
}

/// A spoke → hub frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpokeResponse {
    /// Terminal frame.
    Finished {
        /// Always `true` when sent by a spoke.
        finished: bool,
    },
    /// Human-readable progress.
    Info {
        /// Message text.
        info: String,
    },
    /// One qualifying pair.
    Match(SimilarityCandidate),
}

impl SpokeResponse {
    /// The terminal frame.
    pub fn finished() -> Self {
        Self::Finished { finished: true }
    }

    /// A progress frame.
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info { info: message.into() }
    }

    /// Whether this is a terminal frame.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { finished: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    #[test]
    fn test_request_wire_shape() {
        let batch = SpokeRequest::batch(vec![Record::new(1, "a")], Vec::new());
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["currentValues"][0]["id"], 1);
        assert_eq!(json["nextValues"], serde_json::json!([]));
        assert!(json.get("threshold").is_none());
        assert_eq!(batch.kind(), RequestKind::Batch);

        let end = SpokeRequest::end_of_input(ScoringParams {
            threshold: 0.8,
            property_cap: Some(100),
        });
        let json = serde_json::to_value(&end).unwrap();
        assert_eq!(json["threshold"], 0.8);
        assert_eq!(json["propertyCap"], 100);
        assert_eq!(end.kind(), RequestKind::EndOfInput);
    }

    #[test]
    fn test_empty_frame_without_params_is_end_of_input() {
        let frame: SpokeRequest = serde_json::from_str(r#"{"currentValues":[],"nextValues":[]}"#).unwrap();
        assert!(frame.is_end_of_input());
        assert_eq!(frame.params(), ScoringParams::default());
    }

    #[test]
    fn test_response_decoding() {
        let finished: SpokeResponse = serde_json::from_str(r#"{"finished":true}"#).unwrap();
        assert!(finished.is_finished());

        let info: SpokeResponse = serde_json::from_str(r#"{"info":"Progress: 100%"}"#).unwrap();
        assert_eq!(info, SpokeResponse::info("Progress: 100%"));

        let m: SpokeResponse =
            serde_json::from_str(r#"{"currentId":1,"nextId":10,"similarity":0.75}"#).unwrap();
        assert_eq!(
            m,
            SpokeResponse::Match(SimilarityCandidate::new(RecordId::new(1), RecordId::new(10), 0.75))
        );
    }

    #[test]
    fn test_match_frame_encoding() {
        let frame = SpokeResponse::Match(SimilarityCandidate::new(RecordId::new(3), RecordId::new(4), 0.5));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"currentId": 3, "nextId": 4, "similarity": 0.5}));
    }
}
