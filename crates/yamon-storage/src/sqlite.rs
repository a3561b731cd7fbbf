use crate::error::{Result, StorageError};
use crate::{MetricSet, Repository};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use yamon_common::types::{Counter, Gauge, MetricKind};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gauges (
    name TEXT PRIMARY KEY,
    value REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

/// Bound on how long a call waits for a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// [`Repository`] backed by a SQLite database.
///
/// Holds the same contract as the in-memory store. Durability comes from the
/// database itself, so no snapshot file is involved.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Opens (or creates) the database at `path`. With `restore == false`
    /// any previously stored metrics are dropped.
    pub fn open(path: &Path, restore: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn, restore)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, false)
    }

    fn init(conn: Connection, restore: bool) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if !restore {
            conn.execute_batch("DROP TABLE IF EXISTS gauges; DROP TABLE IF EXISTS counters;")?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn merge_counter(tx: &Transaction<'_>, counter: &Counter) -> Result<()> {
    counter.validate()?;
    let current: Option<i64> = tx
        .query_row(
            "SELECT value FROM counters WHERE name = ?1",
            [&counter.name],
            |row| row.get(0),
        )
        .optional()?;
    let total = match current {
        Some(current) => {
            current
                .checked_add(counter.value)
                .ok_or_else(|| StorageError::CounterOverflow {
                    name: counter.name.clone(),
                })?
        }
        None => counter.value,
    };
    tx.execute(
        "INSERT INTO counters (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        rusqlite::params![&counter.name, total],
    )?;
    Ok(())
}

fn put_gauge(tx: &Transaction<'_>, gauge: &Gauge) -> Result<()> {
    gauge.validate()?;
    tx.execute(
        "INSERT INTO gauges (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        rusqlite::params![&gauge.name, gauge.value],
    )?;
    Ok(())
}

impl SqliteRepository {
    /// Applies `op` to every item inside one transaction. The prefix before a
    /// failing item is committed, matching the in-memory bulk semantics.
    fn write_each<T>(
        &self,
        items: &[T],
        op: impl Fn(&Transaction<'_>, &T) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        let mut outcome = Ok(());
        for item in items {
            if let Err(e) = op(&tx, item) {
                outcome = Err(e);
                break;
            }
        }
        tx.commit()?;
        outcome
    }
}

impl Repository for SqliteRepository {
    fn store_counter(&self, counter: &Counter) -> Result<()> {
        self.write_each(std::slice::from_ref(counter), merge_counter)
    }

    fn retrieve_counter(&self, name: &str) -> Result<Counter> {
        let conn = self.lock_conn();
        conn.query_row("SELECT value FROM counters WHERE name = ?1", [name], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
        .map(|v| Counter::new(name, v))
        .ok_or_else(|| StorageError::not_found(MetricKind::Counter, name))
    }

    fn store_gauge(&self, gauge: &Gauge) -> Result<()> {
        self.write_each(std::slice::from_ref(gauge), put_gauge)
    }

    fn retrieve_gauge(&self, name: &str) -> Result<Gauge> {
        let conn = self.lock_conn();
        conn.query_row("SELECT value FROM gauges WHERE name = ?1", [name], |row| {
            row.get::<_, f64>(0)
        })
        .optional()?
        .map(|v| Gauge::new(name, v))
        .ok_or_else(|| StorageError::not_found(MetricKind::Gauge, name))
    }

    fn list_stored_metrics(&self) -> Result<MetricSet> {
        let mut conn = self.lock_conn();
        // One read transaction so both tables come from the same state.
        let tx = conn.transaction()?;
        let mut gauges = Vec::new();
        {
            let mut stmt = tx.prepare("SELECT name, value FROM gauges ORDER BY name")?;
            let rows = stmt.query_map([], |row| {
                Ok(Gauge::new(row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            for row in rows {
                gauges.push(row?);
            }
        }
        let mut counters = Vec::new();
        {
            let mut stmt = tx.prepare("SELECT name, value FROM counters ORDER BY name")?;
            let rows = stmt.query_map([], |row| {
                Ok(Counter::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                counters.push(row?);
            }
        }
        tx.commit()?;
        Ok(MetricSet { gauges, counters })
    }

    fn write_bulk_gauges(&self, gauges: &[Gauge]) -> Result<()> {
        self.write_each(gauges, put_gauge)
    }

    fn write_bulk_counters(&self, counters: &[Counter]) -> Result<()> {
        self.write_each(counters, merge_counter)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.lock_conn();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
