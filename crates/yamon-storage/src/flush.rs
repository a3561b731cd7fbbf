use crate::error::{Result, StorageError};
use crate::snapshot::SnapshotCodec;
use crate::Repository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Writes the repository's current contents through `codec`. Returns the
/// number of metrics written.
pub fn flush_once(repo: &dyn Repository, codec: &dyn SnapshotCodec) -> Result<usize> {
    let envelopes = repo.list_stored_metrics()?.to_envelopes();
    codec.write(&envelopes)?;
    Ok(envelopes.len())
}

/// Background task that snapshots a repository to disk.
///
/// Flushes on every `interval` tick and whenever the shared signal fires
/// (every write in synchronous mode, or an explicit [`FlushTask::trigger`]).
/// A failed flush is logged and retried on the next trigger. The task owns its
/// cancellation token; [`FlushTask::shutdown`] cancels it, waits for a final
/// flush and joins it.
#[derive(Debug)]
pub struct FlushTask {
    cancel: CancellationToken,
    signal: Arc<Notify>,
    flushed: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl FlushTask {
    /// Spawns the task on the current tokio runtime. A zero `interval`
    /// disables the timer, leaving only signal-driven flushes.
    pub fn spawn(
        repo: Arc<dyn Repository>,
        codec: Arc<dyn SnapshotCodec>,
        interval: Duration,
        signal: Arc<Notify>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (tx, flushed) = watch::channel(0);
        let handle = tokio::spawn(run(
            repo,
            codec,
            interval,
            signal.clone(),
            cancel.clone(),
            tx,
        ));
        Self {
            cancel,
            signal,
            flushed,
            handle,
        }
    }

    /// Requests a flush without waiting for the next tick.
    pub fn trigger(&self) {
        self.signal.notify_one();
    }

    /// Receiver of the number of successful flushes so far.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.flushed.clone()
    }

    /// Stops the task after one last flush and waits for it to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| StorageError::Task(e.to_string()))
    }
}

async fn run(
    repo: Arc<dyn Repository>,
    codec: Arc<dyn SnapshotCodec>,
    interval: Duration,
    signal: Arc<Notify>,
    cancel: CancellationToken,
    flushed: watch::Sender<u64>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Snapshot flush task started");

    let mut ticker = (!interval.is_zero()).then(|| {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = next_tick(&mut ticker) => {}
            _ = signal.notified() => {}
        }
        flush(&repo, &codec, &flushed).await;
    }

    flush(&repo, &codec, &flushed).await;
    if let Err(e) = codec.close() {
        tracing::warn!(error = %e, "Failed to close snapshot codec");
    }
    tracing::info!("Snapshot flush task stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn flush(
    repo: &Arc<dyn Repository>,
    codec: &Arc<dyn SnapshotCodec>,
    flushed: &watch::Sender<u64>,
) {
    let (repo, codec) = (repo.clone(), codec.clone());
    match tokio::task::spawn_blocking(move || flush_once(repo.as_ref(), codec.as_ref())).await {
        Ok(Ok(count)) => {
            flushed.send_modify(|n| *n += 1);
            tracing::debug!(count, "Flushed metrics to snapshot");
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Snapshot flush failed, retrying next cycle");
        }
        Err(e) => {
            tracing::error!(error = %e, "Snapshot flush task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStore, InMemoryStoreConfig};
    use crate::snapshot::FileSnapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use yamon_common::types::{Counter, Gauge, MetricEnvelope};

    async fn wait_for_flushes(rx: &mut watch::Receiver<u64>, at_least: u64) {
        time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= at_least))
            .await
            .expect("flush did not happen in time")
            .expect("flush task dropped its sender");
    }

    fn config(dir: &TempDir, interval: Duration, restore: bool) -> InMemoryStoreConfig {
        InMemoryStoreConfig {
            store_file: Some(dir.path().join("metrics.json")),
            store_interval: interval,
            restore,
        }
    }

    #[tokio::test]
    async fn sync_mode_flushes_after_write() {
        let dir = TempDir::new().unwrap();
        let (store, flusher) = InMemoryStore::open(&config(&dir, Duration::ZERO, false)).unwrap();
        let mut rx = flusher.subscribe();

        store.store_counter(&Counter::new("requests", 5)).unwrap();
        wait_for_flushes(&mut rx, 1).await;

        let saved = FileSnapshot::new(dir.path().join("metrics.json")).read().unwrap();
        assert_eq!(saved, vec![MetricEnvelope::from(&Counter::new("requests", 5))]);
        flusher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn periodic_mode_flushes_on_tick() {
        let dir = TempDir::new().unwrap();
        let (store, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_millis(20), false)).unwrap();
        let mut rx = flusher.subscribe();

        store.store_gauge(&Gauge::new("temp", 36.6)).unwrap();
        wait_for_flushes(&mut rx, 1).await;
        flusher.shutdown().await.unwrap();

        let saved = FileSnapshot::new(dir.path().join("metrics.json")).read().unwrap();
        assert_eq!(saved, vec![MetricEnvelope::from(&Gauge::new("temp", 36.6))]);
    }

    #[tokio::test]
    async fn shutdown_performs_final_flush() {
        let dir = TempDir::new().unwrap();
        let (store, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_secs(3600), false)).unwrap();

        store.store_counter(&Counter::new("requests", 5)).unwrap();
        store.store_counter(&Counter::new("requests", 7)).unwrap();
        flusher.shutdown().await.unwrap();

        let saved = FileSnapshot::new(dir.path().join("metrics.json")).read().unwrap();
        assert_eq!(saved, vec![MetricEnvelope::from(&Counter::new("requests", 12))]);
    }

    #[tokio::test]
    async fn flush_then_restore_round_trips() {
        let dir = TempDir::new().unwrap();
        let (store, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_secs(3600), false)).unwrap();
        store.store_counter(&Counter::new("requests", 5)).unwrap();
        store.store_counter(&Counter::new("PollCount", 3)).unwrap();
        store.store_gauge(&Gauge::new("temp", 37.1)).unwrap();
        store.store_gauge(&Gauge::new("RandomValue", 0.123456789)).unwrap();
        let before = store.list_stored_metrics().unwrap();
        flusher.shutdown().await.unwrap();

        let (restored, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_secs(3600), true)).unwrap();
        assert_eq!(restored.list_stored_metrics().unwrap(), before);
        flusher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn restore_keeps_full_precision_gauges() {
        let dir = TempDir::new().unwrap();
        let (store, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_secs(3600), false)).unwrap();
        store.store_gauge(&Gauge::new("RandomValue", 0.9856906946328695)).unwrap();
        store.store_gauge(&Gauge::new("third", 1.0 / 3.0)).unwrap();
        let before = store.list_stored_metrics().unwrap();
        flusher.shutdown().await.unwrap();

        let (restored, flusher) =
            InMemoryStore::open(&config(&dir, Duration::from_secs(3600), true)).unwrap();
        assert_eq!(
            restored.retrieve_gauge("RandomValue").unwrap().value,
            0.9856906946328695
        );
        assert_eq!(restored.list_stored_metrics().unwrap(), before);
        flusher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_snapshot_aborts_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("metrics.json"), "{not json").unwrap();
        let Err(err) = InMemoryStore::open(&config(&dir, Duration::from_secs(1), true)) else {
            panic!("corrupt snapshot should abort open");
        };
        assert!(matches!(err, StorageError::Json(_)));
    }

    struct FlakyCodec {
        calls: AtomicUsize,
    }

    impl SnapshotCodec for FlakyCodec {
        fn read(&self) -> Result<Vec<MetricEnvelope>> {
            Ok(Vec::new())
        }

        fn write(&self, _metrics: &[MetricEnvelope]) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::other("disk full").into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn failed_flush_is_retried_on_next_trigger() {
        let codec = Arc::new(FlakyCodec {
            calls: AtomicUsize::new(0),
        });
        let flusher = FlushTask::spawn(
            Arc::new(InMemoryStore::new()),
            codec.clone(),
            Duration::ZERO,
            Arc::new(Notify::new()),
        );
        let mut rx = flusher.subscribe();

        flusher.trigger();
        time::timeout(Duration::from_secs(5), async {
            while codec.calls.load(Ordering::SeqCst) < 1 {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*rx.borrow(), 0);

        flusher.trigger();
        wait_for_flushes(&mut rx, 1).await;
        flusher.shutdown().await.unwrap();
    }
}
