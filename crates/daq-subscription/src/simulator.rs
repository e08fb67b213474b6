use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use daq_core::{DaqError, Machine, OpcQuality, Sample, SampleValue, Tag};
use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::debug;

const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(500);
const RECONNECT_GRACE_DELAY: Duration = Duration::from_millis(200);

/// Emits synthetic value-change notifications for every active tag of every
/// active machine, at a fixed sampling interval, using each tag's logical
/// type and configured bounds to keep values plausible.
pub struct SimulatorSubscription {
    machines: Vec<Machine>,
    sink: Arc<dyn crate::SampleSink>,
    sampling_interval: Duration,
    connected: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulatorSubscription {
    pub fn new(machines: Vec<Machine>, sink: Arc<dyn crate::SampleSink>) -> Self {
        Self {
            machines,
            sink,
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            connected: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }
}

#[async_trait]
impl crate::SubscriptionManager for SimulatorSubscription {
    async fn start(&self) -> Result<(), DaqError> {
        let mut tasks = self.tasks.lock();
        for machine in self.machines.iter().filter(|m| m.is_active) {
            for tag in machine.active_tags() {
                let tag = tag.clone();
                let sink = Arc::clone(&self.sink);
                let interval = self.sampling_interval;
                tasks.push(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    loop {
                        ticker.tick().await;
                        sink.ingest(synthesize(&tag)).await;
                    }
                }));
            }
        }
        self.connected.store(true, Ordering::SeqCst);
        debug!(task_count = tasks.len(), "simulator subscriptions started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), DaqError> {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), DaqError> {
        self.stop().await?;
        tokio::time::sleep(RECONNECT_GRACE_DELAY).await;
        self.start().await
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Picks a value consistent with the tag's logical type and, where set, its
/// range or enumerated values. `machineId`/`tagId`/`tagName` are left unset —
/// the same contract a real subscription callback would produce — so the
/// ingestion pipeline's enrichment step is exercised identically either way.
fn synthesize(tag: &Tag) -> Sample {
    let now = Utc::now();
    let mut rng = rand::thread_rng();

    let value = match &tag.data_type {
        daq_core::DataType::Int16 | daq_core::DataType::Int32 | daq_core::DataType::Int64 => {
            let (min, max) = integer_bounds(tag);
            SampleValue::Int64(rng.gen_range(min..=max))
        }
        daq_core::DataType::UInt16 | daq_core::DataType::UInt32 | daq_core::DataType::UInt64 => {
            let (min, max) = integer_bounds(tag);
            SampleValue::UInt64(min.max(0) as u64 + rng.gen_range(0..=(max - min.max(0)) as u64))
        }
        daq_core::DataType::Float | daq_core::DataType::Double => {
            let min = tag.min_value.unwrap_or(0.0);
            let max = tag.max_value.unwrap_or(100.0);
            let max = if max > min { max } else { min + 1.0 };
            SampleValue::Float64(rng.gen_range(min..max))
        }
        daq_core::DataType::Boolean => SampleValue::Bool(rng.gen_bool(0.5)),
        daq_core::DataType::String => match tag.allowed_values_list() {
            Some(values) if !values.is_empty() => {
                let idx = rng.gen_range(0..values.len());
                SampleValue::Text(values[idx].clone())
            }
            _ => SampleValue::Text("Simulated".to_string()),
        },
        daq_core::DataType::Other(_) => SampleValue::Text(tag.data_type.to_string()),
    };

    Sample {
        machine_id: 0,
        tag_id: 0,
        tag_name: String::new(),
        node_id: tag.node_id.clone(),
        value,
        quality: OpcQuality::from_status_word(0),
        source_timestamp: now,
        server_timestamp: now,
        received_timestamp: now,
    }
}

fn integer_bounds(tag: &Tag) -> (i64, i64) {
    let min = tag.min_value.unwrap_or(-100.0) as i64;
    let max = tag.max_value.unwrap_or(100.0) as i64;
    if max > min {
        (min, max)
    } else {
        (min, min + 1)
    }
}
