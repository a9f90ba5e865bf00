use clap::{App, Arg};
use rotorsim::{run_config, term_logger, SimConfig};
use slog::info;
use std::process;

fn main() {
    let matches = App::new("rotorsim")
        .about("Packet-level simulator for a rotor-scheduled circuit fabric")
        .arg(
            Arg::with_name("config")
                .short("f")
                .long("config")
                .value_name("FILE")
                .help("Config file of whitespace-separated key/value pairs; defaults apply without it")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Where to write the results CSV")
                .takes_value(true)
                .default_value("results.csv"),
        )
        .get_matches();

    let log = term_logger();

    let config = match matches.value_of("config") {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    info!(log, "{}", config);

    let stats = match run_config(&config, &log) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    stats.print();

    let out_path = matches.value_of("output").unwrap_or("results.csv");
    if let Err(e) = stats.save(out_path) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    println!("Results saved to {}", out_path);
}
