//! Buffered writer sitting between the ingestion pipeline and the relational
//! store. Owns the process-wide in-memory buffer and health state described
//! in the sink's design — one instance per process, initialized at startup
//! and flushed at shutdown, never created per-request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use daq_core::{DaqError, Sample};
use daq_storage::{RelationalStore, Spool};
use parking_lot::Mutex;
use tracing::{error, warn};

const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

struct HealthState {
    health: Health,
    consecutive_failures: u32,
    next_attempt_at: Option<Instant>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            health: Health::Healthy,
            consecutive_failures: 0,
            next_attempt_at: None,
        }
    }
}

pub struct BatchSink {
    store: Arc<dyn RelationalStore>,
    spool: Arc<Spool>,
    buffer: Mutex<VecDeque<Sample>>,
    flush_lock: tokio::sync::Mutex<()>,
    health: Mutex<HealthState>,
    auto_flush_threshold: usize,
    max_chunk: usize,
}

impl BatchSink {
    pub fn new(
        store: Arc<dyn RelationalStore>,
        spool: Arc<Spool>,
        auto_flush_threshold: usize,
        max_chunk: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            spool,
            buffer: Mutex::new(VecDeque::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            health: Mutex::new(HealthState::default()),
            auto_flush_threshold,
            max_chunk,
        })
    }

    /// Appends to the in-memory FIFO buffer. Never blocks for I/O. If the
    /// buffer crosses `autoFlushThreshold` an asynchronous flush is spawned;
    /// the caller does not wait on it. Returns the number of samples appended.
    pub fn enqueue(self: &Arc<Self>, samples: Vec<Sample>) -> usize {
        let appended = samples.len();
        let pending = {
            let mut buf = self.buffer.lock();
            buf.extend(samples);
            buf.len()
        };

        if pending >= self.auto_flush_threshold {
            let sink = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = sink.flush().await {
                    error!(error = %e, "size-triggered flush failed");
                }
            });
        }

        appended
    }

    pub fn pending_count(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn health(&self) -> Health {
        self.health.lock().health
    }

    /// Lightweight liveness probe against the store. Does not mutate sink
    /// state — distinct from the internal Healthy/Unhealthy state machine.
    pub async fn is_healthy(&self) -> bool {
        self.store.probe().await
    }

    /// Drains the buffer, partitions into chunks of `maxChunk`, and attempts
    /// to persist each. Serialized by an exclusive flush lock.
    pub async fn flush(self: &Arc<Self>) -> Result<(), DaqError> {
        let _guard = self.flush_lock.lock().await;

        let drained: Vec<Sample> = {
            let mut buf = self.buffer.lock();
            buf.drain(..).collect()
        };

        if drained.is_empty() {
            return Ok(());
        }

        let was_unhealthy = self.health() == Health::Unhealthy;

        match self.persist_chunks(&drained).await {
            Ok(()) => {
                if was_unhealthy {
                    self.mark_healthy();
                    if let Err(e) = self.drain_spool().await {
                        warn!(error = %e, "post-recovery spool drain failed");
                    }
                }
                Ok(())
            }
            Err(DaqError::StorageUnavailable(reason)) => {
                self.mark_unhealthy();
                warn!(reason, count = drained.len(), "flush failed, spooling batch");
                self.spool.append(drained).await?;
                Ok(())
            }
            Err(other) => {
                error!(error = %other, "unexpected error during flush, spooling and re-raising");
                let _ = self.spool.append(drained).await;
                Err(other)
            }
        }
    }

    /// If currently healthy, a no-op. Otherwise consults the backoff clock;
    /// if the next attempt isn't due yet, a no-op. Else probes the store:
    /// on success, marks healthy, resets backoff, and drains the spool; on
    /// failure, extends the backoff.
    pub async fn try_recover(self: &Arc<Self>) -> Result<(), DaqError> {
        if self.health() == Health::Healthy {
            return Ok(());
        }

        let now = Instant::now();
        let due = {
            let state = self.health.lock();
            match state.next_attempt_at {
                Some(next) => now >= next,
                None => true,
            }
        };
        if !due {
            return Ok(());
        }

        if self.store.probe().await {
            self.mark_healthy();
            self.reset_backoff();
            self.drain_spool().await
        } else {
            self.record_failure();
            Ok(())
        }
    }

    async fn persist_chunks(&self, samples: &[Sample]) -> Result<(), DaqError> {
        for chunk in samples.chunks(self.max_chunk) {
            self.store.insert_batch(chunk).await?;
        }
        Ok(())
    }

    async fn drain_spool(&self) -> Result<(), DaqError> {
        let result = self
            .spool
            .drain(|batch| async move { self.persist_chunks(&batch.tag_values).await })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.mark_unhealthy();
                Err(e)
            }
        }
    }

    fn mark_healthy(&self) {
        self.health.lock().health = Health::Healthy;
    }

    fn mark_unhealthy(&self) {
        self.health.lock().health = Health::Unhealthy;
    }

    fn record_failure(&self) {
        let mut state = self.health.lock();
        state.consecutive_failures += 1;
        let delay = 2u64.saturating_pow(state.consecutive_failures).min(MAX_BACKOFF_SECS);
        state.next_attempt_at = Some(Instant::now() + Duration::from_secs(delay));
    }

    fn reset_backoff(&self) {
        let mut state = self.health.lock();
        state.consecutive_failures = 0;
        state.next_attempt_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use daq_core::{OpcQuality, SampleValue};
    use daq_storage::BulkInsertOutcome;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeStore {
        healthy: AtomicBool,
        insert_calls: AtomicUsize,
    }

    impl FakeStore {
        fn new(healthy: bool) -> Self {
            Self {
                healthy: AtomicBool::new(healthy),
                insert_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RelationalStore for FakeStore {
        async fn insert_batch(&self, _batch: &[Sample]) -> Result<BulkInsertOutcome, DaqError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(BulkInsertOutcome::BulkPath)
            } else {
                Err(DaqError::StorageUnavailable("down".into()))
            }
        }

        async fn probe(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn sample(n: i32) -> Sample {
        Sample {
            machine_id: 1,
            tag_id: n,
            tag_name: format!("tag{n}"),
            node_id: format!("ns=2;s=T{n}"),
            value: SampleValue::Float64(n as f64),
            quality: OpcQuality::from_status_word(0),
            source_timestamp: Utc::now(),
            server_timestamp: Utc::now(),
            received_timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn happy_path_flushes_and_empties_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Arc::new(Spool::new(dir.path(), 100_000).unwrap());
        let store = Arc::new(FakeStore::new(true));
        let sink = BatchSink::new(store, spool.clone(), 5000, 1000);

        sink.enqueue(vec![sample(1), sample(2), sample(3)]);
        sink.flush().await.unwrap();

        assert_eq!(sink.pending_count(), 0);
        assert_eq!(spool.total_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outage_spools_the_entire_flushed_set_and_marks_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Arc::new(Spool::new(dir.path(), 100_000).unwrap());
        let store = Arc::new(FakeStore::new(false));
        let sink = BatchSink::new(store.clone(), spool.clone(), 5000, 1000);

        let samples: Vec<Sample> = (0..2500).map(sample).collect();
        sink.enqueue(samples);
        sink.flush().await.unwrap();

        assert_eq!(sink.health(), Health::Unhealthy);
        assert_eq!(spool.total_records().await.unwrap(), 2500);

        let batches = spool.list_batches().await.unwrap();
        assert_eq!(batches.len(), 1);

        store.healthy.store(true, Ordering::SeqCst);
        sink.try_recover().await.unwrap();

        assert_eq!(sink.health(), Health::Healthy);
        assert_eq!(spool.total_records().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn try_recover_is_a_noop_while_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Arc::new(Spool::new(dir.path(), 100_000).unwrap());
        let store = Arc::new(FakeStore::new(true));
        let sink = BatchSink::new(store.clone(), spool, 5000, 1000);

        sink.try_recover().await.unwrap();
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_flush_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Arc::new(Spool::new(dir.path(), 100_000).unwrap());
        let store = Arc::new(FakeStore::new(true));
        let sink = BatchSink::new(store.clone(), spool, 5000, 1000);

        sink.flush().await.unwrap();
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 0);
    }
}
