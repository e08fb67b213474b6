// Store-and-forward queue: a durable on-disk spool of StoredBatch files.
//
// Single-writer-friendly: one intra-process lock serializes every operation
// that touches the directory. Cross-process access to the same directory is
// not supported — a documented restriction, not an oversight.

use std::future::Future;
use std::path::{Path, PathBuf};

use daq_core::{DaqError, Sample, StoredBatch};
use tokio::sync::Mutex;
use tracing::warn;

const FILE_PREFIX: &str = "batch_";
const FILE_SUFFIX: &str = ".json";

pub struct Spool {
    dir: PathBuf,
    max_records: usize,
    lock: Mutex<()>,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>, max_records: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_records,
            lock: Mutex::new(()),
        })
    }

    /// Allocates a batch id, writes the file via write-then-rename so a
    /// partial write never surfaces as a corrupt file to [`Spool::list_batches`],
    /// and runs [`Spool::cleanup_if_needed`] first.
    pub async fn append(&self, samples: Vec<Sample>) -> Result<String, DaqError> {
        let _guard = self.lock.lock().await;
        self.cleanup_if_needed_locked().await?;

        let batch = StoredBatch::new(samples);
        let file_name = batch.file_name();
        let final_path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_vec_pretty(&batch)
            .map_err(|e| DaqError::SpoolIoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        Ok(batch.batch_id)
    }

    /// Ascending filename order, which equals chronological order. Corrupt
    /// files are logged and skipped rather than surfaced as an error.
    pub async fn list_batches(&self) -> Result<Vec<StoredBatch>, DaqError> {
        let _guard = self.lock.lock().await;
        self.list_batches_locked().await
    }

    pub async fn delete_batch(&self, batch_id: &str) -> Result<(), DaqError> {
        let _guard = self.lock.lock().await;
        for path in self.batch_file_paths()? {
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(batch_id))
            {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    pub async fn total_records(&self) -> Result<usize, DaqError> {
        let _guard = self.lock.lock().await;
        let batches = self.list_batches_locked().await?;
        Ok(batches.iter().map(|b| b.tag_values.len()).sum())
    }

    /// If `total_records >= max_records`, deletes the oldest files (by
    /// filename, which sorts chronologically) until the residual count is
    /// at most `0.8 * max_records`. Deletion is per-file, so the target is
    /// approximate to within one batch's record count.
    pub async fn cleanup_if_needed(&self) -> Result<(), DaqError> {
        let _guard = self.lock.lock().await;
        self.cleanup_if_needed_locked().await
    }

    pub async fn clear_all(&self) -> Result<(), DaqError> {
        let _guard = self.lock.lock().await;
        for path in self.batch_file_paths()? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// Drains every spooled batch through `persist_batch`, in filename order.
    /// Holds the spool lock for the whole operation so a concurrent `append`
    /// can't interleave with the read-persist-clear cycle. Only clears the
    /// spool once every batch has persisted; a failure aborts immediately,
    /// leaves every file intact, and propagates the error so the sink can
    /// re-mark itself unhealthy.
    pub async fn drain<F, Fut>(&self, mut persist_batch: F) -> Result<usize, DaqError>
    where
        F: FnMut(StoredBatch) -> Fut,
        Fut: Future<Output = Result<(), DaqError>>,
    {
        let _guard = self.lock.lock().await;
        let batches = self.list_batches_locked().await?;

        let mut persisted = 0usize;
        for batch in batches {
            let record_count = batch.tag_values.len();
            persist_batch(batch).await?;
            persisted += record_count;
        }

        for path in self.batch_file_paths()? {
            tokio::fs::remove_file(&path).await?;
        }

        Ok(persisted)
    }

    async fn cleanup_if_needed_locked(&self) -> Result<(), DaqError> {
        let batches = self.list_batches_locked().await?;
        let total: usize = batches.iter().map(|b| b.tag_values.len()).sum();
        if total < self.max_records {
            return Ok(());
        }

        let target = (self.max_records as f64 * 0.8) as usize;
        let mut remaining = total;
        for batch in &batches {
            if remaining <= target {
                break;
            }
            let path = self.dir.join(batch.file_name());
            tokio::fs::remove_file(&path).await?;
            remaining = remaining.saturating_sub(batch.tag_values.len());
        }

        Ok(())
    }

    async fn list_batches_locked(&self) -> Result<Vec<StoredBatch>, DaqError> {
        let mut paths = self.batch_file_paths()?;
        paths.sort();

        let mut batches = Vec::with_capacity(paths.len());
        for path in paths {
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<StoredBatch>(&bytes) {
                    Ok(batch) => batches.push(batch),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt spool file"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read spool file"),
            }
        }

        Ok(batches)
    }

    fn batch_file_paths(&self) -> Result<Vec<PathBuf>, DaqError> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if is_batch_file(&path) {
                out.push(path);
            }
        }
        Ok(out)
    }
}

fn is_batch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX))
}
