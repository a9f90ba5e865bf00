//! Workload generation and flow-file IO
//!
//! Flow sizes are sampled from published datacenter CDFs with log-scale
//! interpolation between the breakpoints; arrivals are Poisson at a rate
//! that hits the configured load factor against the aggregate host
//! capacity. Generated (or externally produced) flow lists round-trip
//! through a small CSV format.

use crate::config::{SimConfig, WorkloadKind};
use crate::flow::{Flow, FlowKind};
use crate::{ms_to_ns, ns_to_ms, FlowId};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp;
use slog::{info, warn, Logger};
use std::error::Error;

/// Flow-size CDF breakpoints: (bytes, cumulative probability)
type Cdf = &'static [(u64, f64)];

// From the VL2 paper
const DATAMINING_CDF: Cdf = &[
    (100, 0.0),
    (1_000, 0.5),
    (10_000, 0.6),
    (100_000, 0.7),
    (1_000_000, 0.8),
    (10_000_000, 0.9),
    (100_000_000, 0.97),
    (1_000_000_000, 1.0),
];

// From the DCTCP paper
const WEBSEARCH_CDF: Cdf = &[
    (100, 0.0),
    (1_000, 0.15),
    (10_000, 0.2),
    (100_000, 0.3),
    (1_000_000, 0.4),
    (10_000_000, 0.53),
    (100_000_000, 0.6),
    (300_000_000, 1.0),
];

// From the Facebook Hadoop paper
const HADOOP_CDF: Cdf = &[
    (1_000, 0.0),
    (10_000, 0.05),
    (100_000, 0.2),
    (1_000_000, 0.5),
    (10_000_000, 0.7),
    (100_000_000, 0.85),
    (1_000_000_000, 1.0),
];

fn cdf_for(workload: WorkloadKind) -> Cdf {
    match workload {
        WorkloadKind::Datamining => DATAMINING_CDF,
        WorkloadKind::Websearch => WEBSEARCH_CDF,
        WorkloadKind::Hadoop => HADOOP_CDF,
    }
}

/// Rough mean flow size per workload, used to size the arrival rate
fn mean_flow_bytes(workload: WorkloadKind) -> f64 {
    match workload {
        WorkloadKind::Datamining => 50e6,
        WorkloadKind::Websearch => 5e6,
        WorkloadKind::Hadoop => 30e6,
    }
}

fn sample_flow_size(cdf: Cdf, rng: &mut StdRng) -> u64 {
    let u: f64 = rng.gen();

    for i in 1..cdf.len() {
        if u <= cdf[i].1 {
            let frac = (u - cdf[i - 1].1) / (cdf[i].1 - cdf[i - 1].1);
            // interpolate in log space, sizes span seven decades
            let log_size = (cdf[i - 1].0 as f64).log10()
                + frac * ((cdf[i].0 as f64).log10() - (cdf[i - 1].0 as f64).log10());
            return 10f64.powf(log_size) as u64;
        }
    }

    cdf[cdf.len() - 1].0
}

/// Samples a flow list matching the configured load
pub struct WorkloadGenerator<'a> {
    config: &'a SimConfig,
    rng: StdRng,
    next_flow_id: FlowId,
    log: Logger,
}

impl<'a> WorkloadGenerator<'a> {
    /// A generator seeded from the config
    pub fn new(config: &'a SimConfig, log: Logger) -> WorkloadGenerator<'a> {
        WorkloadGenerator {
            config,
            rng: StdRng::seed_from_u64(config.random_seed),
            next_flow_id: 0,
            log,
        }
    }

    /// Poisson arrivals over the horizon, sizes from the workload CDF
    pub fn generate(&mut self) -> Result<Vec<Flow>, Box<dyn Error>> {
        let config = self.config;
        let mut flows = Vec::new();

        if config.load_factor <= 0.0 {
            info!(self.log, "load factor is 0, generated no flows");
            return Ok(flows);
        }

        let total_hosts = (config.num_racks * config.hosts_per_rack) as f64;
        let capacity_bits = total_hosts * config.link_rate_gbps * 1e9;
        let mean_flow_bits = mean_flow_bytes(config.workload) * 8.0;
        let lambda_per_ms = config.load_factor * capacity_bits / mean_flow_bits / 1000.0;

        let interarrival =
            Exp::new(lambda_per_ms).map_err(|e| format!("bad arrival rate: {:?}", e))?;
        let rack_dist = Uniform::from(0..config.num_racks);
        let host_dist = Uniform::from(0..config.hosts_per_rack);
        let cdf = cdf_for(config.workload);

        let mut now_ms = 0.0;
        while now_ms < config.sim_time_ms {
            let src_rack = rack_dist.sample(&mut self.rng);
            let mut dst_rack = rack_dist.sample(&mut self.rng);
            while dst_rack == src_rack {
                // only inter-rack traffic touches the fabric
                dst_rack = rack_dist.sample(&mut self.rng);
            }

            let flow = Flow::new(
                self.next_flow_id,
                src_rack,
                dst_rack,
                host_dist.sample(&mut self.rng),
                host_dist.sample(&mut self.rng),
                sample_flow_size(cdf, &mut self.rng),
                ms_to_ns(now_ms),
                FlowKind::Bulk,
            );
            self.next_flow_id += 1;
            flows.push(flow);

            now_ms += interarrival.sample(&mut self.rng);
        }

        info!(self.log, "generated {} flows", flows.len());
        Ok(flows)
    }
}

const FLOW_CSV_HEADER: [&str; 8] = [
    "flow_id",
    "src_rack",
    "dst_rack",
    "src_host",
    "dst_host",
    "size_bytes",
    "start_time_ms",
    "flow_type",
];

/// Writes a flow list to `path` in the flow CSV format
pub fn save_flows(flows: &[Flow], path: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| format!("cannot write flow file {}: {}", path, e))?;
    wtr.write_record(&FLOW_CSV_HEADER)?;

    for flow in flows {
        wtr.write_record(&[
            flow.id.to_string().as_str(),
            flow.src_rack.to_string().as_str(),
            flow.dst_rack.to_string().as_str(),
            flow.src_host.to_string().as_str(),
            flow.dst_host.to_string().as_str(),
            flow.size_bytes.to_string().as_str(),
            ns_to_ms(flow.start_time).to_string().as_str(),
            flow.kind.name(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Reads a flow list back from the flow CSV format
///
/// Low-latency flows are accepted with a warning; this simulator only
/// models the circuit fabric and runs them as bulk.
pub fn load_flows(path: &str, log: &Logger) -> Result<Vec<Flow>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| format!("cannot open flow file {}: {}", path, e))?;

    let mut flows = Vec::new();
    for try_record in rdr.records() {
        let record = try_record?;
        if record.len() < 8 {
            return Err(format!("flow file {}: short record {:?}", path, record).into());
        }

        let kind = FlowKind::parse(&record[7])
            .ok_or_else(|| format!("flow file {}: unknown flow_type {:?}", path, &record[7]))?;

        let flow = Flow::new(
            record[0].parse()?,
            record[1].parse()?,
            record[2].parse()?,
            record[3].parse()?,
            record[4].parse()?,
            record[5].parse()?,
            ms_to_ns(record[6].parse()?),
            kind,
        );

        if kind == FlowKind::LowLatency {
            warn!(
                log,
                "flow {}: low_latency is not modeled here, running it as bulk", flow.id
            );
        }

        flows.push(flow);
    }

    info!(log, "loaded {} flows from {}", flows.len(), path);
    Ok(flows)
}
