//! Sample collection for the yamon agent.
//!
//! Each [`Collector`] reads one category of runtime statistics (memory, cpu,
//! the agent process itself, load average) and returns them as gauges. The
//! [`registry::Registry`] drives all collectors once per poll interval and
//! holds the latest sample set between report cycles.

pub mod cpu;
pub mod load;
pub mod memory;
pub mod process;
pub mod registry;

use anyhow::Result;
use yamon_common::types::Gauge;

pub use registry::{Registry, RegistrySnapshot};

/// A source of runtime gauges on the agent host.
///
/// Implementations are registered with the [`Registry`] and called on every
/// poll tick. A collector that fails is skipped for that tick; the others
/// still contribute.
pub trait Collector: Send {
    /// Returns the collector name (e.g., `"memory"`), used for logging.
    fn name(&self) -> &str;

    /// Reads the current values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system statistics are unavailable.
    fn collect(&mut self) -> Result<Vec<Gauge>>;
}
