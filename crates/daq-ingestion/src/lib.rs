//! Ingestion Pipeline: the per-sample path from a subscription notification
//! to an enriched, validated entry in the batch sink's buffer.

use std::sync::Arc;

use async_trait::async_trait;
use daq_batch::BatchSink;
use daq_core::{validate, DaqError, Sample};
use daq_metadata::TagCache;
use daq_subscription::SampleSink;
use tracing::warn;

pub struct IngestionPipeline {
    cache: Arc<TagCache>,
    sink: Arc<BatchSink>,
}

impl IngestionPipeline {
    pub fn new(cache: Arc<TagCache>, sink: Arc<BatchSink>) -> Self {
        Self { cache, sink }
    }

    pub async fn ingest_one(&self, mut sample: Sample) {
        match self.process(&mut sample).await {
            Ok(true) => {
                self.sink.enqueue(vec![sample]);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, node_id = %sample.node_id, "unexpected error ingesting sample, dropping");
            }
        }
    }

    /// Resolves, enriches, and validates a batch; enqueues only the
    /// survivors in a single call. Returns the number enqueued.
    pub async fn ingest_batch(&self, samples: Vec<Sample>) -> usize {
        let mut valid = Vec::with_capacity(samples.len());
        for mut sample in samples {
            match self.process(&mut sample).await {
                Ok(true) => valid.push(sample),
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, node_id = %sample.node_id, "unexpected error ingesting sample, dropping");
                }
            }
        }

        let accepted = valid.len();
        if !valid.is_empty() {
            self.sink.enqueue(valid);
        }
        accepted
    }

    /// Resolves the tag, enriches `sample` in place, and validates it.
    /// `Ok(false)` means the sample was dropped for an ordinary reason
    /// (unknown tag, failed validation) and has already been logged.
    async fn process(&self, sample: &mut Sample) -> Result<bool, DaqError> {
        let tag = match self.cache.resolve(&sample.node_id).await? {
            Some(tag) => tag,
            None => {
                warn!(node_id = %sample.node_id, "unknown tag, dropping sample");
                return Ok(false);
            }
        };

        sample.tag_id = tag.id;
        sample.machine_id = tag.machine_id;
        sample.tag_name = tag.name.clone();

        if let Err(reason) = validate(&tag, &sample.value, sample.quality) {
            warn!(node_id = %sample.node_id, %reason, "validation failed, dropping sample");
            return Ok(false);
        }

        Ok(true)
    }
}

#[async_trait]
impl SampleSink for IngestionPipeline {
    async fn ingest(&self, sample: Sample) {
        self.ingest_one(sample).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as async_trait_attr;
    use chrono::Utc;
    use daq_core::{Machine, OpcQuality, SampleValue, Tag};
    use daq_metadata::MetadataRepository;
    use daq_storage::{RelationalStore, Spool};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeRepo {
        tag: Option<Tag>,
    }

    #[async_trait_attr]
    impl MetadataRepository for FakeRepo {
        async fn list_active_machines(&self) -> Result<Vec<Machine>, DaqError> {
            Ok(Vec::new())
        }
        async fn get_machine(&self, _id: i32) -> Result<Option<Machine>, DaqError> {
            Ok(None)
        }
        async fn get_tag_by_node_id(&self, _node_id: &str) -> Result<Option<Tag>, DaqError> {
            Ok(self.tag.clone())
        }
        async fn list_active_tags_by_machine(&self, _id: i32) -> Result<Vec<Tag>, DaqError> {
            Ok(Vec::new())
        }
    }

    struct FakeStore {
        healthy: AtomicBool,
        insert_count: AtomicUsize,
    }

    #[async_trait_attr]
    impl RelationalStore for FakeStore {
        async fn insert_batch(
            &self,
            batch: &[daq_core::Sample],
        ) -> Result<daq_storage::BulkInsertOutcome, DaqError> {
            self.insert_count.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(daq_storage::BulkInsertOutcome::BulkPath)
        }
        async fn probe(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn bounded_tag() -> Tag {
        Tag {
            id: 7,
            machine_id: 3,
            name: "Temp".into(),
            node_id: "ns=2;s=T".into(),
            data_type: "Float".parse().unwrap(),
            unit: None,
            min_value: Some(0.0),
            max_value: Some(100.0),
            allowed_values: None,
            is_active: true,
        }
    }

    fn raw_sample(node_id: &str, value: SampleValue) -> Sample {
        let now = Utc::now();
        Sample {
            machine_id: 0,
            tag_id: 0,
            tag_name: String::new(),
            node_id: node_id.to_string(),
            value,
            quality: OpcQuality::from_status_word(0),
            source_timestamp: now,
            server_timestamp: now,
            received_timestamp: now,
        }
    }

    fn pipeline_with_tag(tag: Option<Tag>) -> IngestionPipeline {
        let repo = Arc::new(FakeRepo { tag });
        let cache = Arc::new(TagCache::new(repo));
        let dir = tempfile::tempdir().unwrap();
        let spool = Arc::new(Spool::new(dir.path(), 100_000).unwrap());
        let store = Arc::new(FakeStore {
            healthy: AtomicBool::new(true),
            insert_count: AtomicUsize::new(0),
        });
        let sink = BatchSink::new(store, spool, 5000, 1000);
        IngestionPipeline::new(cache, sink)
    }

    #[tokio::test]
    async fn known_tag_is_enriched_and_enqueued() {
        let pipeline = pipeline_with_tag(Some(bounded_tag()));
        pipeline
            .ingest_one(raw_sample("ns=2;s=T", SampleValue::Float64(42.0)))
            .await;

        assert_eq!(pipeline.sink.pending_count(), 1);
    }

    #[tokio::test]
    async fn unknown_tag_is_dropped() {
        let pipeline = pipeline_with_tag(None);
        pipeline
            .ingest_one(raw_sample("ns=2;s=UNKNOWN", SampleValue::Float64(42.0)))
            .await;

        assert_eq!(pipeline.sink.pending_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_value_is_dropped() {
        let pipeline = pipeline_with_tag(Some(bounded_tag()));
        pipeline
            .ingest_one(raw_sample("ns=2;s=T", SampleValue::Float64(150.0)))
            .await;

        assert_eq!(pipeline.sink.pending_count(), 0);
    }

    #[tokio::test]
    async fn batch_mode_enqueues_only_the_valid_subset() {
        let pipeline = pipeline_with_tag(Some(bounded_tag()));
        let samples = vec![
            raw_sample("ns=2;s=T", SampleValue::Float64(10.0)),
            raw_sample("ns=2;s=T", SampleValue::Float64(150.0)),
            raw_sample("ns=2;s=UNKNOWN", SampleValue::Float64(5.0)),
        ];

        let accepted = pipeline.ingest_batch(samples).await;

        assert_eq!(accepted, 1);
        assert_eq!(pipeline.sink.pending_count(), 1);
    }
}
