//! Run statistics and reporting
//!
//! Flows are folded in one at a time (in id order, so floating-point
//! accumulation is reproducible), then the summary goes to stdout for
//! humans and to a `metric,value` CSV for scripts.

use crate::flow::Flow;
use crate::ns_to_ms;
use std::error::Error;
use std::fs::File;
use std::io;

/// Aggregated results of one run
#[derive(Debug, Default)]
pub struct Statistics {
    total_flows: usize,
    completed_flows: usize,
    dropped_packets: u64,
    throughput_gbps: f64,
    sim_time_ms: f64,
    fcts_ms: Vec<f64>,
}

impl Statistics {
    /// An empty tally
    pub fn new() -> Statistics {
        Statistics::default()
    }

    /// Folds one flow into the tally
    pub fn add_flow(&mut self, flow: &Flow) {
        self.total_flows += 1;
        if let Some(fct) = flow.fct() {
            self.completed_flows += 1;
            self.fcts_ms.push(ns_to_ms(fct));
        }
    }

    /// Records the fabric-wide drop count
    pub fn set_dropped_packets(&mut self, dropped: u64) {
        self.dropped_packets = dropped;
    }

    /// Records the achieved throughput
    pub fn set_throughput(&mut self, gbps: f64) {
        self.throughput_gbps = gbps;
    }

    /// Records the configured horizon, for reporting
    pub fn set_sim_time(&mut self, ms: f64) {
        self.sim_time_ms = ms;
    }

    /// Flows folded in so far
    pub fn total_flows(&self) -> usize {
        self.total_flows
    }

    /// Flows that delivered every packet
    pub fn completed_flows(&self) -> usize {
        self.completed_flows
    }

    /// Packets refused a queue slot
    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }

    /// Delivered bits over the whole horizon, in Gb/s
    pub fn throughput_gbps(&self) -> f64 {
        self.throughput_gbps
    }

    /// Completion times of the completed flows, in ms, insertion order
    pub fn fcts_ms(&self) -> &[f64] {
        &self.fcts_ms
    }

    /// Mean completion time in ms; 0 with no completed flows
    pub fn mean_fct_ms(&self) -> f64 {
        if self.fcts_ms.is_empty() {
            return 0.0;
        }
        self.fcts_ms.iter().sum::<f64>() / self.fcts_ms.len() as f64
    }

    /// The `p`-quantile of the completion times, `p` in [0, 1]
    pub fn percentile_fct_ms(&self, p: f64) -> f64 {
        if self.fcts_ms.is_empty() {
            return 0.0;
        }
        let mut sorted = self.fcts_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("fct is never NaN"));

        let mut idx = (p * sorted.len() as f64) as usize;
        if idx >= sorted.len() {
            idx = sorted.len() - 1;
        }
        sorted[idx]
    }

    /// Human summary on stdout
    pub fn print(&self) {
        println!("\n========== Simulation Results ==========");
        println!("Flows:");
        println!("  total: {}", self.total_flows);
        let share = if self.total_flows > 0 {
            100.0 * self.completed_flows as f64 / self.total_flows as f64
        } else {
            0.0
        };
        println!("  completed: {} ({:.1}%)", self.completed_flows, share);
        println!("  dropped packets: {}", self.dropped_packets);

        if !self.fcts_ms.is_empty() {
            println!("Flow completion times:");
            println!("  mean: {:.3} ms", self.mean_fct_ms());
            println!("  median: {:.3} ms", self.percentile_fct_ms(0.5));
            println!("  95th: {:.3} ms", self.percentile_fct_ms(0.95));
            println!("  99th: {:.3} ms", self.percentile_fct_ms(0.99));
            println!("  max: {:.3} ms", self.percentile_fct_ms(1.0));
        }

        println!("Throughput:");
        println!("  {:.3} Gb/s over {} ms", self.throughput_gbps, self.sim_time_ms);
        println!("========================================");
    }

    /// Writes the `metric,value` rows; byte-identical for identical runs
    pub fn write_csv<W: io::Write>(&self, out: W) -> Result<(), Box<dyn Error>> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&["metric", "value"])?;
        wtr.write_record(&["total_flows", self.total_flows.to_string().as_str()])?;
        wtr.write_record(&["completed_flows", self.completed_flows.to_string().as_str()])?;
        wtr.write_record(&["dropped_packets", self.dropped_packets.to_string().as_str()])?;
        wtr.write_record(&["throughput_gbps", self.throughput_gbps.to_string().as_str()])?;

        if !self.fcts_ms.is_empty() {
            wtr.write_record(&["mean_fct_ms", self.mean_fct_ms().to_string().as_str()])?;
            wtr.write_record(&["median_fct_ms", self.percentile_fct_ms(0.5).to_string().as_str()])?;
            wtr.write_record(&["p95_fct_ms", self.percentile_fct_ms(0.95).to_string().as_str()])?;
            wtr.write_record(&["p99_fct_ms", self.percentile_fct_ms(0.99).to_string().as_str()])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Writes the results CSV to `path`
    pub fn save(&self, path: &str) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)
            .map_err(|e| format!("cannot write results file {}: {}", path, e))?;
        self.write_csv(file)
    }
}
