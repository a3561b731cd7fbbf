//! Server-side metric storage.
//!
//! [`Repository`] is the storage contract the HTTP layer talks to. Two
//! backends implement it: [`memory::InMemoryStore`], a pair of maps behind one
//! reader/writer lock made durable by periodic JSON snapshots
//! ([`snapshot::FileSnapshot`] flushed by [`flush::FlushTask`]), and
//! [`sqlite::SqliteRepository`], which keeps the same semantics in SQLite
//! tables.

pub mod error;
pub mod flush;
pub mod memory;
pub mod snapshot;
pub mod sqlite;


use yamon_common::types::{Counter, Gauge, MetricEnvelope};

pub use error::{Result, StorageError};
pub use flush::FlushTask;
pub use memory::{InMemoryStore, InMemoryStoreConfig};
pub use snapshot::{FileSnapshot, NoopSnapshot, SnapshotCodec};
pub use sqlite::SqliteRepository;

/// Point-in-time copy of every stored metric, each list sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    pub gauges: Vec<Gauge>,
    pub counters: Vec<Counter>,
}

impl MetricSet {
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// Envelopes for persistence: gauges first, then counters, no hashes.
    pub fn to_envelopes(&self) -> Vec<MetricEnvelope> {
        self.gauges
            .iter()
            .map(MetricEnvelope::from)
            .chain(self.counters.iter().map(MetricEnvelope::from))
            .collect()
    }

    fn sort(&mut self) {
        self.gauges.sort_by(|a, b| a.name.cmp(&b.name));
        self.counters.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Storage backend for gauges and counters.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because every HTTP handler and the background flush task hold the same
/// instance.
///
/// Semantics every backend honours:
/// - counters merge by addition; a negative delta is rejected without touching
///   the stored total;
/// - gauges are overwritten by the latest store; non-finite values are rejected;
/// - a single store is atomic, and [`Repository::list_stored_metrics`] never
///   observes a half-applied one.
pub trait Repository: Send + Sync {
    /// Adds `counter.value` to the stored total, creating it if absent.
    fn store_counter(&self, counter: &Counter) -> Result<()>;

    /// Returns the stored total for `name`.
    fn retrieve_counter(&self, name: &str) -> Result<Counter>;

    /// Replaces the stored value for `gauge.name`.
    fn store_gauge(&self, gauge: &Gauge) -> Result<()>;

    /// Returns the stored value for `name`.
    fn retrieve_gauge(&self, name: &str) -> Result<Gauge>;

    /// Consistent snapshot of everything stored.
    fn list_stored_metrics(&self) -> Result<MetricSet>;

    /// Stores each gauge in order. On failure the gauges before the failing
    /// one stay applied and the error is returned.
    fn write_bulk_gauges(&self, gauges: &[Gauge]) -> Result<()> {
        for gauge in gauges {
            self.store_gauge(gauge)?;
        }
        Ok(())
    }

    /// Stores each counter in order, with the same prefix semantics as
    /// [`Repository::write_bulk_gauges`].
    fn write_bulk_counters(&self, counters: &[Counter]) -> Result<()> {
        for counter in counters {
            self.store_counter(counter)?;
        }
        Ok(())
    }

    /// Reports whether the backend can serve requests.
    fn ping(&self) -> Result<()>;
}
