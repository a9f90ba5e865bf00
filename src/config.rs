//! Simulation parameters
//!
//! One value object, built once from defaults or a config file, then handed
//! around by shared reference. The file format is whitespace-separated
//! key/value pairs, one setting per pair; unknown keys are skipped along
//! with their value.

use crate::{ms_to_ns, us_to_ns, Time};
use std::error::Error;
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Flow-size distribution families, from published datacenter traces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    /// VL2 datamining trace
    Datamining,
    /// DCTCP websearch trace
    Websearch,
    /// Facebook Hadoop trace
    Hadoop,
}

impl WorkloadKind {
    /// The key used in config files and reports
    pub fn name(self) -> &'static str {
        match self {
            WorkloadKind::Datamining => "datamining",
            WorkloadKind::Websearch => "websearch",
            WorkloadKind::Hadoop => "hadoop",
        }
    }
}

/// Everything a run needs to know
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of racks in the fabric
    pub num_racks: usize,
    /// Number of rotor switches the matchings are spread over
    pub num_switches: usize,
    /// Hosts per rack, used by the workload generator and the converter
    pub hosts_per_rack: usize,
    /// Per-rack uplink rate in Gb/s
    pub link_rate_gbps: f64,
    /// Per-packet size cap in bytes
    pub mtu_bytes: u64,
    /// One-way propagation delay in µs
    pub propagation_delay_us: f64,
    /// Dead time at the head of every slot while switches retune, in µs
    pub reconfig_delay_us: f64,
    /// Fraction of a slot the links are actually up, in [0, 1)
    pub duty_cycle: f64,
    /// Which flow-size distribution to sample
    pub workload: WorkloadKind,
    /// Offered load as a fraction of aggregate host capacity, in [0, 1]
    pub load_factor: f64,
    /// Simulation horizon in ms
    pub sim_time_ms: f64,
    /// Seed for workload generation; the simulator derives its own from it
    pub random_seed: u64,
    /// Capacity of each virtual output queue, in packets
    pub queue_size_pkts: usize,
    /// Local-queue depth above which admission spills to a two-hop detour
    pub queue_threshold: usize,
    /// If non-empty, load flows from this CSV instead of generating
    pub flow_file: String,
    /// Write the generated flows out before running
    pub save_flows: bool,
    /// Where `save_flows` writes to
    pub flow_output_file: String,
}

impl Default for SimConfig {
    fn default() -> SimConfig {
        SimConfig {
            num_racks: 16,
            num_switches: 4,
            hosts_per_rack: 32,
            link_rate_gbps: 10.0,
            mtu_bytes: 1500,
            propagation_delay_us: 0.5,
            reconfig_delay_us: 20.0,
            duty_cycle: 0.9,
            workload: WorkloadKind::Datamining,
            load_factor: 0.25,
            sim_time_ms: 1000.0,
            random_seed: 42,
            queue_size_pkts: 100,
            queue_threshold: 3,
            flow_file: String::new(),
            save_flows: false,
            flow_output_file: "flows.csv".to_string(),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, Box<dyn Error>> {
    value
        .parse()
        .map_err(|_| format!("bad value {:?} for config key {}", value, key).into())
}

impl SimConfig {
    /// Reads a config file on top of the defaults
    pub fn load(path: &str) -> Result<SimConfig, Box<dyn Error>> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot open config file {}: {}", path, e))?;
        let config = SimConfig::parse(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses whitespace-separated key/value pairs on top of the defaults
    pub fn parse(text: &str) -> Result<SimConfig, Box<dyn Error>> {
        let mut config = SimConfig::default();
        let mut tokens = text.split_whitespace();

        while let Some(key) = tokens.next() {
            let value = match tokens.next() {
                Some(v) => v,
                None => return Err(format!("config key {} has no value", key).into()),
            };
            config.set(key, value)?;
        }

        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        match key {
            "num_racks" => self.num_racks = parse_value(key, value)?,
            "num_switches" => self.num_switches = parse_value(key, value)?,
            "hosts_per_rack" => self.hosts_per_rack = parse_value(key, value)?,
            "link_rate_gbps" => self.link_rate_gbps = parse_value(key, value)?,
            "mtu_bytes" => self.mtu_bytes = parse_value(key, value)?,
            "propagation_delay_us" => self.propagation_delay_us = parse_value(key, value)?,
            "reconfig_delay_us" => self.reconfig_delay_us = parse_value(key, value)?,
            "duty_cycle" => self.duty_cycle = parse_value(key, value)?,
            "load_factor" => self.load_factor = parse_value(key, value)?,
            "sim_time_ms" => self.sim_time_ms = parse_value(key, value)?,
            "random_seed" => self.random_seed = parse_value(key, value)?,
            "queue_size_pkts" => self.queue_size_pkts = parse_value(key, value)?,
            "queue_threshold" => self.queue_threshold = parse_value(key, value)?,
            "flow_file" => self.flow_file = value.to_string(),
            "flow_output_file" => self.flow_output_file = value.to_string(),
            "save_flows" => {
                self.save_flows = match value {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    _ => return Err(format!("bad value {:?} for save_flows", value).into()),
                }
            }
            "workload" => {
                self.workload = match value {
                    "datamining" => WorkloadKind::Datamining,
                    "websearch" => WorkloadKind::Websearch,
                    "hadoop" => WorkloadKind::Hadoop,
                    _ => return Err(format!("unknown workload {:?}", value).into()),
                }
            }
            // unknown keys are skipped, value token included
            _ => {}
        }
        Ok(())
    }

    /// Rejects parameter combinations the simulator cannot run
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.num_racks < 2 {
            return Err(format!("num_racks must be at least 2, got {}", self.num_racks).into());
        }
        if self.num_switches < 1 {
            return Err("num_switches must be at least 1".into());
        }
        if self.hosts_per_rack < 1 {
            return Err("hosts_per_rack must be at least 1".into());
        }
        if self.link_rate_gbps <= 0.0 {
            return Err(format!("link_rate_gbps must be positive, got {}", self.link_rate_gbps).into());
        }
        if self.mtu_bytes < 1 {
            return Err("mtu_bytes must be at least 1".into());
        }
        if self.reconfig_delay_us <= 0.0 {
            return Err(format!(
                "reconfig_delay_us must be positive, got {}",
                self.reconfig_delay_us
            )
            .into());
        }
        if !(self.duty_cycle >= 0.0 && self.duty_cycle < 1.0) {
            return Err(format!("duty_cycle must be in [0, 1), got {}", self.duty_cycle).into());
        }
        if !(self.load_factor >= 0.0 && self.load_factor <= 1.0) {
            return Err(format!("load_factor must be in [0, 1], got {}", self.load_factor).into());
        }
        if self.queue_size_pkts < 1 {
            return Err("queue_size_pkts must be at least 1".into());
        }
        Ok(())
    }

    /// Matchings each switch rotates through; also the slots per cycle
    pub fn num_matchings(&self) -> usize {
        (self.num_racks - 1 + self.num_switches - 1) / self.num_switches
    }

    /// Slot duration in µs: the reconfiguration dead time stretched by the duty cycle
    pub fn slot_time_us(&self) -> f64 {
        self.reconfig_delay_us / (1.0 - self.duty_cycle)
    }

    /// Slot duration
    pub fn slot_time(&self) -> Time {
        us_to_ns(self.slot_time_us())
    }

    /// Reconfiguration dead time at the head of each slot
    pub fn reconfig_delay(&self) -> Time {
        us_to_ns(self.reconfig_delay_us)
    }

    /// One full rotation through all matchings
    pub fn cycle_time(&self) -> Time {
        self.num_matchings() as Time * self.slot_time()
    }

    /// One-way propagation delay
    pub fn propagation_delay(&self) -> Time {
        us_to_ns(self.propagation_delay_us)
    }

    /// Simulation horizon
    pub fn sim_end(&self) -> Time {
        ms_to_ns(self.sim_time_ms)
    }

    /// Serialization time of `size_bytes` onto the uplink
    pub fn tx_time(&self, size_bytes: u64) -> Time {
        // 1 Gb/s is exactly one bit per ns
        ((size_bytes * 8) as f64 / self.link_rate_gbps).round() as Time
    }
}

impl fmt::Display for SimConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(
            f,
            "  racks: {} ({} hosts each), switches: {}",
            self.num_racks, self.hosts_per_rack, self.num_switches
        )?;
        writeln!(
            f,
            "  link rate: {} Gb/s, mtu: {} B, propagation: {} us",
            self.link_rate_gbps, self.mtu_bytes, self.propagation_delay_us
        )?;
        writeln!(
            f,
            "  slot: {} us ({} us reconfig, duty {}), cycle: {} us",
            self.slot_time_us(),
            self.reconfig_delay_us,
            self.duty_cycle,
            self.num_matchings() as f64 * self.slot_time_us()
        )?;
        writeln!(
            f,
            "  workload: {}, load {}, queues {} pkts (vlb over {})",
            self.workload.name(),
            self.load_factor,
            self.queue_size_pkts,
            self.queue_threshold
        )?;
        write!(
            f,
            "  sim time: {} ms, seed {}",
            self.sim_time_ms, self.random_seed
        )
    }
}
