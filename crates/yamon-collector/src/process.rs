use crate::Collector;
use anyhow::{anyhow, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};
use yamon_common::types::Gauge;

/// Statistics of the agent process itself: the closest thing a native binary
/// has to runtime heap statistics.
pub struct ProcessCollector {
    system: System,
    pid: Option<Pid>,
}

impl ProcessCollector {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot resolve own pid, process gauges disabled");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ProcessCollector {
    fn name(&self) -> &str {
        "process"
    }

    fn collect(&mut self) -> Result<Vec<Gauge>> {
        let pid = self.pid.ok_or_else(|| anyhow!("own pid unavailable"))?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = self
            .system
            .process(pid)
            .ok_or_else(|| anyhow!("process {pid} not found"))?;

        Ok(vec![
            Gauge::new("ProcessResidentMemory", process.memory() as f64),
            Gauge::new("ProcessVirtualMemory", process.virtual_memory() as f64),
            Gauge::new("ProcessCPUutilization", process.cpu_usage() as f64),
            Gauge::new("ProcessRunTime", process.run_time() as f64),
        ])
    }
}
