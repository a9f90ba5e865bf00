//! Fixed seeds make runs bit-reproducible, and flow files round-trip.

use rotorsim::{
    load_flows, null_logger, run_config, save_flows, SimConfig, Simulator, WorkloadGenerator,
    WorkloadKind,
};
use std::env;
use std::fs;
use std::path::PathBuf;

fn config() -> SimConfig {
    let mut config = SimConfig::default();
    config.num_racks = 4;
    config.num_switches = 1;
    config.hosts_per_rack = 2;
    config.workload = WorkloadKind::Websearch;
    config.load_factor = 1.0;
    config.sim_time_ms = 1.0;
    config.random_seed = 11;
    config
}

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(name)
}

#[test]
fn identical_seeds_give_identical_results_csv() {
    let flow_path = temp_path("rotorsim_det_flows.csv");
    let flow_path = flow_path.to_str().unwrap();

    let config = config();
    let flows = WorkloadGenerator::new(&config, null_logger())
        .generate()
        .unwrap();
    assert!(!flows.is_empty(), "this seed should produce traffic");
    save_flows(&flows, flow_path).unwrap();

    let mut config = config;
    config.flow_file = flow_path.to_string();

    let run_bytes = || {
        let stats = run_config(&config, &null_logger()).unwrap();
        let mut buf = Vec::new();
        stats.write_csv(&mut buf).unwrap();
        buf
    };

    let first = run_bytes();
    let second = run_bytes();
    fs::remove_file(flow_path).ok();

    assert_eq!(first, second, "two identical runs diverged");
}

#[test]
fn identical_seeds_give_identical_fct_vectors() {
    let flow_path = temp_path("rotorsim_det_fcts.csv");
    let flow_path = flow_path.to_str().unwrap();

    let config = config();
    let flows = WorkloadGenerator::new(&config, null_logger())
        .generate()
        .unwrap();
    save_flows(&flows, flow_path).unwrap();

    let run_fcts = || {
        let flows = load_flows(flow_path, &null_logger()).unwrap();
        let mut sim = Simulator::new(&config, null_logger()).unwrap();
        sim.run(flows);
        sim.flows().map(|f| f.fct()).collect::<Vec<_>>()
    };

    let first = run_fcts();
    let second = run_fcts();
    fs::remove_file(flow_path).ok();

    assert_eq!(first, second);
}

#[test]
fn reloaded_flows_reproduce_the_original_run() {
    let flow_path = temp_path("rotorsim_det_reload.csv");
    let flow_path = flow_path.to_str().unwrap();

    let config = config();
    let flows = WorkloadGenerator::new(&config, null_logger())
        .generate()
        .unwrap();
    save_flows(&flows, flow_path).unwrap();

    // run the freshly generated list
    let mut sim_fresh = Simulator::new(&config, null_logger()).unwrap();
    sim_fresh.run(flows);

    // run the list after a trip through the flow file
    let reloaded = load_flows(flow_path, &null_logger()).unwrap();
    let mut sim_reloaded = Simulator::new(&config, null_logger()).unwrap();
    sim_reloaded.run(reloaded);
    fs::remove_file(flow_path).ok();

    let fresh: Vec<_> = sim_fresh.flows().map(|f| (f.id, f.completed, f.fct())).collect();
    let again: Vec<_> = sim_reloaded.flows().map(|f| (f.id, f.completed, f.fct())).collect();
    assert_eq!(fresh, again);

    let mut fresh_csv = Vec::new();
    sim_fresh.statistics().write_csv(&mut fresh_csv).unwrap();
    let mut again_csv = Vec::new();
    sim_reloaded.statistics().write_csv(&mut again_csv).unwrap();
    assert_eq!(fresh_csv, again_csv);
}

#[test]
fn different_seeds_give_different_workloads() {
    let config_a = config();
    let mut config_b = config();
    config_b.random_seed = 12;

    let a = WorkloadGenerator::new(&config_a, null_logger())
        .generate()
        .unwrap();
    let b = WorkloadGenerator::new(&config_b, null_logger())
        .generate()
        .unwrap();

    let a_sig: Vec<_> = a.iter().map(|f| (f.start_time, f.size_bytes)).collect();
    let b_sig: Vec<_> = b.iter().map(|f| (f.start_time, f.size_bytes)).collect();
    assert_ne!(a_sig, b_sig);
}
