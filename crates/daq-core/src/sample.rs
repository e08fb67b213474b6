use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::OpcQuality;

/// Polymorphic tag value.
///
/// Modeled as a tagged variant rather than an untyped container so that
/// serialization and the type check in [`crate::validate`] are total over
/// every logical OPC UA data type, including the raw fallback for anything
/// the transport hands us that doesn't fit the other arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum SampleValue {
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Bool(bool),
    Text(String),
    Raw(serde_json::Value),
}

impl SampleValue {
    /// Render the value the same way it would be compared against an
    /// enumerated `allowedValues` list: case-sensitive textual form, matched
    /// case-insensitively by the caller.
    pub fn as_rendered_string(&self) -> String {
        match self {
            SampleValue::Int64(v) => v.to_string(),
            SampleValue::UInt64(v) => v.to_string(),
            SampleValue::Float64(v) => v.to_string(),
            SampleValue::Bool(v) => v.to_string(),
            SampleValue::Text(v) => v.clone(),
            SampleValue::Raw(v) => v.to_string(),
        }
    }

    /// Coerce to `f64` for the range check. Returns `None` for non-numeric
    /// variants (`Bool`, `Text`, unparsable `Raw`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Int64(v) => Some(*v as f64),
            SampleValue::UInt64(v) => Some(*v as f64),
            SampleValue::Float64(v) => Some(*v),
            SampleValue::Bool(_) => None,
            SampleValue::Text(_) => None,
            SampleValue::Raw(v) => v.as_f64(),
        }
    }
}

/// One value-change observation, as produced by the subscription callback
/// and carried through validation into the batch sink.
///
/// Lifecycle: created with `machine_id`/`tag_id`/`tag_name` unset (zero /
/// empty), then enriched by the ingestion pipeline once the tag has been
/// resolved, then consumed (persisted or spooled) by the batch sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub machine_id: i32,
    pub tag_id: i32,
    pub tag_name: String,
    pub node_id: String,
    pub value: SampleValue,
    pub quality: OpcQuality,
    pub source_timestamp: DateTime<Utc>,
    pub server_timestamp: DateTime<Utc>,
    pub received_timestamp: DateTime<Utc>,
}

/// A spooled batch of samples, written as one immutable file by the
/// store-and-forward queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBatch {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub tag_values: Vec<Sample>,
}

impl StoredBatch {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
            tag_values: samples,
        }
    }

    /// `batch_<YYYYMMDD_HHMMSS>_<32-hex>.json`, chosen so lexicographic
    /// filename order equals chronological order.
    pub fn file_name(&self) -> String {
        format!(
            "batch_{}_{}.json",
            self.created_at.format("%Y%m%d_%H%M%S"),
            self.batch_id
        )
    }
}
