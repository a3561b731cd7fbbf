//! Types shared by the yamon agent and server: samples, the wire envelope,
//! the integrity hash and environment override parsing.

pub mod env;
pub mod error;
pub mod integrity;
pub mod types;

pub use error::MetricError;
pub use integrity::HashKey;
pub use types::{Counter, Gauge, Metric, MetricEnvelope, MetricKind};
