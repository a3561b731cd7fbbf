use crate::Collector;
use anyhow::Result;
use sysinfo::System;
use yamon_common::types::Gauge;

pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Vec<Gauge>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            anyhow::bail!("memory statistics are not available on this platform");
        }

        let mut gauges = vec![
            Gauge::new("TotalMemory", total as f64),
            Gauge::new("FreeMemory", self.system.free_memory() as f64),
            Gauge::new("AvailableMemory", self.system.available_memory() as f64),
            Gauge::new("UsedMemory", self.system.used_memory() as f64),
        ];

        // Hosts without swap report zero; leave the swap gauges out instead.
        let swap_total = self.system.total_swap();
        if swap_total > 0 {
            gauges.push(Gauge::new("TotalSwap", swap_total as f64));
            gauges.push(Gauge::new("UsedSwap", self.system.used_swap() as f64));
        }

        Ok(gauges)
    }
}
