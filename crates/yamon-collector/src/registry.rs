use crate::cpu::CpuCollector;
use crate::load::LoadCollector;
use crate::memory::MemoryCollector;
use crate::process::ProcessCollector;
use crate::Collector;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock};
use yamon_common::error::MetricError;
use yamon_common::types::{Counter, Gauge, POLL_COUNTER, RANDOM_GAUGE};

#[derive(Debug, Default)]
struct Samples {
    gauges: Vec<Gauge>,
    counters: BTreeMap<String, i64>,
}

/// Point-in-time copy of the registry handed to the reporter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub gauges: Vec<Gauge>,
    /// Running totals, `PollCount` included.
    pub counters: Vec<Counter>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }
}

/// Agent-side holder of the current sample set.
///
/// The gauge set is rebuilt on every [`Registry::collect`] and swapped in under
/// the write lock, so a concurrent [`Registry::snapshot`] sees either the old
/// set or the new one, never a mix. Counters persist for the lifetime of the
/// registry; `PollCount` is bumped once per collect and never reset.
pub struct Registry {
    collectors: Mutex<Vec<Box<dyn Collector>>>,
    samples: RwLock<Samples>,
}

impl Registry {
    pub fn new(collectors: Vec<Box<dyn Collector>>) -> Self {
        let mut counters = BTreeMap::new();
        counters.insert(POLL_COUNTER.to_string(), 0);
        Self {
            collectors: Mutex::new(collectors),
            samples: RwLock::new(Samples {
                gauges: Vec::new(),
                counters,
            }),
        }
    }

    /// Registry wired with every built-in runtime collector.
    pub fn with_runtime_collectors() -> Self {
        Self::new(vec![
            Box::new(MemoryCollector::new()),
            Box::new(CpuCollector::new()),
            Box::new(ProcessCollector::new()),
            Box::new(LoadCollector::new()),
        ])
    }

    /// Runs every collector, replaces the gauge set and bumps `PollCount`.
    ///
    /// A failing collector is logged and its gauges are left out; collection
    /// as a whole never fails. Returns the size of the new gauge set.
    pub fn collect(&self) -> usize {
        let mut gauges = Vec::new();
        {
            let mut collectors = self
                .collectors
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for collector in collectors.iter_mut() {
                match collector.collect() {
                    Ok(points) => gauges.extend(points.into_iter().filter(|g| {
                        let ok = g.validate().is_ok();
                        if !ok {
                            tracing::debug!(collector = collector.name(), gauge = %g.name, "Dropping non-finite gauge");
                        }
                        ok
                    })),
                    Err(e) => {
                        tracing::warn!(collector = collector.name(), error = %e, "Collection failed")
                    }
                }
            }
        }
        gauges.push(Gauge::new(RANDOM_GAUGE, rand::thread_rng().gen::<f64>()));

        let count = gauges.len();
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        samples.gauges = gauges;
        let poll = samples.counters.entry(POLL_COUNTER.to_string()).or_insert(0);
        *poll = poll.saturating_add(1);
        tracing::debug!(gauges = count, poll_count = *poll, "Collected metrics");
        count
    }

    /// Adds `delta` to an application-owned counter.
    pub fn add_counter(&self, name: &str, delta: i64) -> Result<(), MetricError> {
        Counter::new(name, delta).validate()?;
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        let total = samples.counters.entry(name.to_string()).or_insert(0);
        *total = total.saturating_add(delta);
        Ok(())
    }

    pub fn poll_count(&self) -> i64 {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples.counters.get(POLL_COUNTER).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        RegistrySnapshot {
            gauges: samples.gauges.clone(),
            counters: samples
                .counters
                .iter()
                .map(|(name, total)| Counter::new(name.clone(), *total))
                .collect(),
        }
    }
}
