use std::collections::HashMap;
use std::sync::Arc;

use daq_core::{DaqError, Tag};
use parking_lot::RwLock;

use crate::repository::MetadataRepository;

/// NodeId -> Tag cache in front of the [`MetadataRepository`].
///
/// Concurrent readers, exclusive invalidation. Populated lazily on
/// [`TagCache::resolve`] misses; a miss is never negative-cached, so a tag
/// added to the store after the last invalidation is found on the very next
/// lookup — but a tag that's still absent is re-queried every time it's
/// referenced, by design (stale-read tolerance is bounded only by explicit
/// operator reloads, not by a TTL).
pub struct TagCache {
    repository: Arc<dyn MetadataRepository>,
    entries: RwLock<HashMap<String, Tag>>,
}

impl TagCache {
    pub fn new(repository: Arc<dyn MetadataRepository>) -> Self {
        Self {
            repository,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, node_id: &str) -> Result<Option<Tag>, DaqError> {
        if let Some(tag) = self.entries.read().get(node_id) {
            return Ok(Some(tag.clone()));
        }

        match self.repository.get_tag_by_node_id(node_id).await? {
            Some(tag) => {
                self.entries.write().insert(node_id.to_string(), tag.clone());
                Ok(Some(tag))
            }
            None => Ok(None),
        }
    }

    /// Empties the map. Under concurrent invalidation the last writer wins;
    /// there is no ordering guarantee across simultaneous reloads.
    pub fn invalidate(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use daq_core::Machine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRepo {
        tag: Option<Tag>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl MetadataRepository for CountingRepo {
        async fn list_active_machines(&self) -> Result<Vec<Machine>, DaqError> {
            Ok(Vec::new())
        }
        async fn get_machine(&self, _id: i32) -> Result<Option<Machine>, DaqError> {
            Ok(None)
        }
        async fn get_tag_by_node_id(&self, _node_id: &str) -> Result<Option<Tag>, DaqError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.tag.clone())
        }
        async fn list_active_tags_by_machine(&self, _id: i32) -> Result<Vec<Tag>, DaqError> {
            Ok(Vec::new())
        }
    }

    fn sample_tag() -> Tag {
        Tag {
            id: 1,
            machine_id: 1,
            name: "Temp".into(),
            node_id: "ns=2;s=T".into(),
            data_type: "Float".parse().unwrap(),
            unit: None,
            min_value: None,
            max_value: None,
            allowed_values: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn hit_populates_cache_and_avoids_repeat_lookups() {
        let repo = Arc::new(CountingRepo {
            tag: Some(sample_tag()),
            lookups: AtomicUsize::new(0),
        });
        let cache = TagCache::new(repo.clone());

        assert!(cache.resolve("ns=2;s=T").await.unwrap().is_some());
        assert!(cache.resolve("ns=2;s=T").await.unwrap().is_some());

        assert_eq!(repo.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn miss_is_not_negative_cached() {
        let repo = Arc::new(CountingRepo {
            tag: None,
            lookups: AtomicUsize::new(0),
        });
        let cache = TagCache::new(repo.clone());

        assert!(cache.resolve("ns=2;s=unknown").await.unwrap().is_none());
        assert!(cache.resolve("ns=2;s=unknown").await.unwrap().is_none());

        assert_eq!(repo.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_lookup() {
        let repo = Arc::new(CountingRepo {
            tag: Some(sample_tag()),
            lookups: AtomicUsize::new(0),
        });
        let cache = TagCache::new(repo.clone());

        cache.resolve("ns=2;s=T").await.unwrap();
        cache.invalidate();
        cache.resolve("ns=2;s=T").await.unwrap();

        assert_eq!(repo.lookups.load(Ordering::SeqCst), 2);
    }
}
