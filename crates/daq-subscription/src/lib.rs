//! Subscription Manager contract, and a simulator implementation that emits
//! synthetic samples without talking to real OPC UA hardware.
//!
//! The real transport (session handling, certificates, monitored items) is
//! an external collaborator behind [`SubscriptionManager`] — nothing here
//! assumes a particular client library.

mod simulator;

use async_trait::async_trait;
use daq_core::{DaqError, Sample};

pub use simulator::SimulatorSubscription;

/// Where a subscription callback delivers samples. Implemented by the
/// ingestion pipeline; kept as a trait here so the subscription side has no
/// compile-time dependency on it.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn ingest(&self, sample: Sample);
}

/// One session per active machine, one monitored item per active tag.
/// `reconnect` is `stop` then `start` with a short grace delay.
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    async fn start(&self) -> Result<(), DaqError>;
    async fn stop(&self) -> Result<(), DaqError>;
    async fn reconnect(&self) -> Result<(), DaqError>;

    /// Aggregate connectivity across every session; used by the worker loop
    /// as the trigger for `reconnect`.
    async fn is_connected(&self) -> bool;
}
