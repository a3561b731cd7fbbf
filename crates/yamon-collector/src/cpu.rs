use crate::Collector;
use anyhow::Result;
use sysinfo::System;
use yamon_common::types::Gauge;

pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        // Usage is computed between two refreshes; prime the first one.
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Vec<Gauge>> {
        self.system.refresh_cpu_all();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            anyhow::bail!("no cpus reported");
        }

        let mut gauges = Vec::with_capacity(cpus.len() + 1);
        gauges.push(Gauge::new(
            "GlobalCPUutilization",
            self.system.global_cpu_usage() as f64,
        ));
        for (i, cpu) in cpus.iter().enumerate() {
            gauges.push(Gauge::new(
                format!("CPUutilization{}", i + 1),
                cpu.cpu_usage() as f64,
            ));
        }

        Ok(gauges)
    }
}
