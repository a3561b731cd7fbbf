use crate::Collector;
use anyhow::Result;
use sysinfo::System;
use yamon_common::types::Gauge;

pub struct LoadCollector;

impl LoadCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LoadCollector {
    fn name(&self) -> &str {
        "load"
    }

    fn collect(&mut self) -> Result<Vec<Gauge>> {
        let load_avg = System::load_average();
        Ok(vec![
            Gauge::new("LoadAverage1", load_avg.one),
            Gauge::new("LoadAverage5", load_avg.five),
            Gauge::new("LoadAverage15", load_avg.fifteen),
        ])
    }
}
