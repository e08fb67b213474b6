//! Domain types and pure validation rules shared across the ingestion pipeline.
//!
//! Nothing in this crate performs I/O: it is the vocabulary the rest of the
//! workspace builds on (metadata records, the wire sample, the quality
//! derivation, and the validation ruleset).

mod error;
mod machine;
mod quality;
mod sample;
mod tag;
mod validation;

pub use error::{DaqError, ValidationError};
pub use machine::Machine;
pub use quality::OpcQuality;
pub use sample::{Sample, SampleValue, StoredBatch};
pub use tag::{DataType, Tag};
pub use validation::validate;
