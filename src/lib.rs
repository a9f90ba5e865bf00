#![deny(missing_docs)]
//! Packet-level simulator for a rotor-scheduled optical circuit fabric
//!
//! Racks are connected through a set of rotor switches that cycle through a
//! fixed sequence of perfect matchings. Every rack pair gets a direct slot
//! once per cycle; traffic either waits for its slot or takes a two-hop
//! detour through a random intermediate rack. The simulator replays a flow
//! workload over this fabric and reports flow completion times, achieved
//! throughput, and drops.

// Many small files, one concern each.
mod config;
mod convert;
mod events;
mod flow;
mod logger;
mod routing;
mod simulator;
mod stats;
mod topology;
mod voq;
mod workload;

pub use self::config::*;
pub use self::convert::*;
pub use self::events::*;
pub use self::flow::*;
pub use self::logger::*;
pub use self::routing::*;
pub use self::simulator::*;
pub use self::stats::*;
pub use self::topology::*;
pub use self::voq::*;
pub use self::workload::*;

use slog::Logger;
use std::error::Error;

/// Simulated time, in nanoseconds
pub type Time = u64;

/// Unique flow identifier
pub type FlowId = u64;

/// Unique packet identifier
pub type PacketId = u64;

/// Rack index, `0..num_racks`
pub type RackId = usize;

/// Converts microseconds (the unit the configuration speaks) to [`Time`]
pub fn us_to_ns(us: f64) -> Time {
    (us * 1_000.0).round() as Time
}

/// Converts milliseconds (the unit flow files speak) to [`Time`]
pub fn ms_to_ns(ms: f64) -> Time {
    (ms * 1_000_000.0).round() as Time
}

/// Converts [`Time`] back to milliseconds for reporting
pub fn ns_to_ms(ns: Time) -> f64 {
    ns as f64 / 1e6
}

/// Loads or generates the workload, runs it, and returns the statistics
///
/// This is the whole program minus argument parsing: the binary calls it
/// once, tests call it with hand-built configs.
pub fn run_config(config: &SimConfig, log: &Logger) -> Result<Statistics, Box<dyn Error>> {
    config.validate()?;

    let flows = if !config.flow_file.is_empty() {
        let flows = load_flows(&config.flow_file, log)?;
        for flow in &flows {
            if flow.src_rack == flow.dst_rack
                || flow.src_rack >= config.num_racks
                || flow.dst_rack >= config.num_racks
            {
                return Err(format!(
                    "flow {} runs {} -> {}, which does not fit a {}-rack fabric",
                    flow.id, flow.src_rack, flow.dst_rack, config.num_racks
                )
                .into());
            }
        }
        flows
    } else {
        let mut wg = WorkloadGenerator::new(config, log.clone());
        let flows = wg.generate()?;
        if config.save_flows {
            save_flows(&flows, &config.flow_output_file)?;
        }
        flows
    };

    let mut sim = Simulator::new(config, log.clone())?;
    sim.run(flows);
    Ok(sim.statistics())
}
