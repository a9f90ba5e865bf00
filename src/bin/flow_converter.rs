use clap::{App, Arg};
use std::error::Error;
use std::fs::File;
use std::process;

fn run(mode: &str, input_path: &str, output_path: &str, hosts: usize) -> Result<u64, Box<dyn Error>> {
    let input = File::open(input_path).map_err(|e| format!("cannot open {}: {}", input_path, e))?;
    let output =
        File::create(output_path).map_err(|e| format!("cannot create {}: {}", output_path, e))?;

    match mode {
        "opera2rotor" => rotorsim::opera_to_rotor(input, output, hosts),
        "rotor2opera" => rotorsim::rotor_to_opera(input, output, hosts),
        _ => Err(format!("unknown mode {}", mode).into()),
    }
}

fn main() {
    let matches = App::new("flow_converter")
        .about("Converts between the simulator's flow CSV and opera-style traces")
        .arg(
            Arg::with_name("mode")
                .required(true)
                .possible_values(&["opera2rotor", "rotor2opera"])
                .help("Conversion direction"),
        )
        .arg(Arg::with_name("input").required(true).help("Input file"))
        .arg(Arg::with_name("output").required(true).help("Output file"))
        .arg(
            Arg::with_name("hosts_per_rack")
                .long("hosts-per-rack")
                .value_name("N")
                .takes_value(true)
                .default_value("32")
                .help("Rack size used to split global host ids"),
        )
        .get_matches();

    let hosts: usize = match matches.value_of("hosts_per_rack").unwrap().parse() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("Error: hosts-per-rack must be a positive integer");
            process::exit(1);
        }
    };

    match run(
        matches.value_of("mode").unwrap(),
        matches.value_of("input").unwrap(),
        matches.value_of("output").unwrap(),
        hosts,
    ) {
        Ok(count) => println!("Converted {} flows", count),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
