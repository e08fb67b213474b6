use thiserror::Error;

/// Reason a sample failed [`crate::validate`]. Ordered the same way the
/// checks run, so callers can rely on the first reported cause being the
/// check that actually tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tag is inactive")]
    InactiveTag,
    #[error("value does not match the tag's declared type")]
    TypeMismatch,
    #[error("value is not among the tag's allowed values")]
    NotAllowed,
    #[error("value is out of the tag's configured range")]
    OutOfRange,
    #[error("sample quality is not Good")]
    BadQuality,
}

/// Error kinds shared across the storage, batching, and subscription
/// crates. `ConfigurationError` and per-sample `ValidationError` are not
/// part of this enum: the former is fatal at startup (surfaced as a plain
/// `anyhow::Error`), the latter never escapes the ingestion pipeline.
#[derive(Debug, Error)]
pub enum DaqError {
    /// Transient: the relational store is unreachable or rejected a query
    /// in a way that indicates an outage rather than a programming error.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The bulk entry point (table-valued insert routine) is not present;
    /// triggers a one-shot fallback to the per-row insert path.
    #[error("bulk insert entry point missing: {0}")]
    StorageSchemaMissing(String),

    /// Filesystem error in the store-and-forward spool.
    #[error("spool I/O error: {0}")]
    SpoolIoError(#[from] std::io::Error),

    /// Per-session OPC UA error; the next worker tick will reconnect.
    #[error("subscription error: {0}")]
    SubscriptionError(String),

    /// Caught at a pipeline boundary; never propagates into the caller.
    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}
