//! yamon agent: samples runtime statistics into a [`yamon_collector::Registry`]
//! and pushes them to the server's batch endpoint on a timer.

pub mod agent;
pub mod config;
pub mod reporter;

pub use agent::Agent;
pub use config::AgentConfig;
pub use reporter::{ReportError, Reporter};
