use crate::error::{Result, StorageError};
use crate::flush::FlushTask;
use crate::snapshot::{self, SnapshotCodec};
use crate::{MetricSet, Repository};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use yamon_common::types::{Counter, Gauge, Metric, MetricEnvelope, MetricKind};

/// Construction parameters for a persistent [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Snapshot file; `None` disables persistence.
    pub store_file: Option<PathBuf>,
    /// Period between snapshots. Zero flushes after every write.
    pub store_interval: Duration,
    /// Load the snapshot file at startup.
    pub restore: bool,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            store_file: None,
            store_interval: Duration::from_secs(300),
            restore: false,
        }
    }
}

#[derive(Debug, Default)]
struct Maps {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

impl Maps {
    fn merge_counter(&mut self, counter: &Counter) -> Result<()> {
        counter.validate()?;
        match self.counters.get_mut(&counter.name) {
            Some(total) => {
                *total = total
                    .checked_add(counter.value)
                    .ok_or_else(|| StorageError::CounterOverflow {
                        name: counter.name.clone(),
                    })?;
            }
            None => {
                self.counters.insert(counter.name.clone(), counter.value);
            }
        }
        Ok(())
    }

    fn put_gauge(&mut self, gauge: &Gauge) -> Result<()> {
        gauge.validate()?;
        self.gauges.insert(gauge.name.clone(), gauge.value);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }
}

/// Concurrent in-memory [`Repository`].
///
/// Both maps sit behind one reader/writer lock: lookups and listings share it,
/// each store holds it exclusively for exactly one validate-then-write. Counter
/// merges commute, so the final total does not depend on the order concurrent
/// stores acquire the lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    maps: RwLock<Maps>,
    write_signal: Option<Arc<Notify>>,
}

impl InMemoryStore {
    /// Empty store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `config`: restores the snapshot if asked to and
    /// starts the background flush task.
    ///
    /// Must be called from within a tokio runtime. A snapshot that exists but
    /// cannot be decoded is returned as an error, since starting without it
    /// would silently drop counter totals.
    pub fn open(config: &InMemoryStoreConfig) -> Result<(Arc<Self>, FlushTask)> {
        let codec = snapshot::codec_for(config.store_file.as_deref());
        let sync_flush = config.store_interval.is_zero();
        let signal = Arc::new(Notify::new());

        let mut store = Self::new();
        if sync_flush {
            store.write_signal = Some(signal.clone());
        }
        if config.restore {
            let restored = store.restore(codec.as_ref())?;
            tracing::info!(count = restored, "Restored metrics from snapshot");
        }

        let store = Arc::new(store);
        let flusher = FlushTask::spawn(store.clone(), codec, config.store_interval, signal);
        Ok((store, flusher))
    }

    /// Loads persisted totals into an empty store.
    ///
    /// The snapshot holds final totals, and counters are re-applied through
    /// the additive merge, so any pre-existing state would be double counted.
    /// Returns [`StorageError::RestoreIntoNonEmpty`] in that case.
    pub fn restore(&self, codec: &dyn SnapshotCodec) -> Result<usize> {
        let envelopes = codec.read()?;
        self.restore_envelopes(&envelopes)?;
        Ok(envelopes.len())
    }

    fn restore_envelopes(&self, envelopes: &[MetricEnvelope]) -> Result<()> {
        let mut maps = self.write_maps();
        if !maps.is_empty() {
            return Err(StorageError::RestoreIntoNonEmpty);
        }
        for envelope in envelopes {
            match envelope.to_metric()? {
                Metric::Counter(c) => maps.merge_counter(&c)?,
                Metric::Gauge(g) => maps.put_gauge(&g)?,
            }
        }
        Ok(())
    }

    fn read_maps(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_maps(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_write(&self) {
        if let Some(signal) = &self.write_signal {
            signal.notify_one();
        }
    }
}

impl Repository for InMemoryStore {
    fn store_counter(&self, counter: &Counter) -> Result<()> {
        self.write_maps().merge_counter(counter)?;
        self.notify_write();
        Ok(())
    }

    fn retrieve_counter(&self, name: &str) -> Result<Counter> {
        self.read_maps()
            .counters
            .get(name)
            .map(|v| Counter::new(name, *v))
            .ok_or_else(|| StorageError::not_found(MetricKind::Counter, name))
    }

    fn store_gauge(&self, gauge: &Gauge) -> Result<()> {
        self.write_maps().put_gauge(gauge)?;
        self.notify_write();
        Ok(())
    }

    fn retrieve_gauge(&self, name: &str) -> Result<Gauge> {
        self.read_maps()
            .gauges
            .get(name)
            .map(|v| Gauge::new(name, *v))
            .ok_or_else(|| StorageError::not_found(MetricKind::Gauge, name))
    }

    fn list_stored_metrics(&self) -> Result<MetricSet> {
        let mut set = {
            let maps = self.read_maps();
            MetricSet {
                gauges: maps
                    .gauges
                    .iter()
                    .map(|(name, value)| Gauge::new(name.clone(), *value))
                    .collect(),
                counters: maps
                    .counters
                    .iter()
                    .map(|(name, value)| Counter::new(name.clone(), *value))
                    .collect(),
            }
        };
        set.sort();
        Ok(set)
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
