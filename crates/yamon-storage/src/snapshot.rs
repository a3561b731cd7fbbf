use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use yamon_common::types::MetricEnvelope;

/// Reads and writes the full metric set as one JSON document.
pub trait SnapshotCodec: Send + Sync {
    /// Loads the last written snapshot. An absent or empty file yields no
    /// metrics; unreadable or malformed contents are an error.
    fn read(&self) -> Result<Vec<MetricEnvelope>>;

    /// Replaces the snapshot with `metrics`.
    fn write(&self, metrics: &[MetricEnvelope]) -> Result<()>;

    /// Releases any resources held by the codec.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Picks the codec for an optional snapshot path.
pub fn codec_for(path: Option<&Path>) -> Arc<dyn SnapshotCodec> {
    match path {
        Some(path) => Arc::new(FileSnapshot::new(path)),
        None => Arc::new(NoopSnapshot),
    }
}

/// Snapshot stored as a single JSON array of envelopes.
///
/// Every write replaces the whole file: contents go to a sibling temporary
/// file first and are renamed over the target, so a crash mid-write leaves the
/// previous snapshot intact.
pub struct FileSnapshot {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Lock the writer, recovering from a poisoned Mutex if necessary.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotCodec for FileSnapshot {
    fn read(&self) -> Result<Vec<MetricEnvelope>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot file, nothing to restore");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let metrics: Vec<MetricEnvelope> = serde_json::from_str(&content)?;
        Ok(metrics)
    }

    fn write(&self, metrics: &[MetricEnvelope]) -> Result<()> {
        let body = serde_json::to_vec(metrics)?;
        let _guard = self.lock_writer();
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &body)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), count = metrics.len(), "Snapshot written");
        Ok(())
    }
}

/// Stand-in used when no snapshot path is configured.
pub struct NoopSnapshot;

impl SnapshotCodec for NoopSnapshot {
    fn read(&self) -> Result<Vec<MetricEnvelope>> {
        Ok(Vec::new())
    }

    fn write(&self, _metrics: &[MetricEnvelope]) -> Result<()> {
        Ok(())
    }
}
