//! Flow-format conversion
//!
//! Interoperates with opera-style traces: whitespace-separated
//! `src_host dst_host size_bytes start_time_ns` rows over global host ids,
//! where `host_global = rack * hosts_per_rack + host`. Both directions work
//! on readers and writers so the converter binary and the tests share the
//! same code paths.

use crate::flow::FlowKind;
use std::error::Error;
use std::io;

/// Flows at least this large are classed as bulk on import (the Opera
/// paper's 15 MB split)
pub const BULK_THRESHOLD_BYTES: u64 = 15_000_000;

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

/// Converts an opera-style trace into the flow CSV format
///
/// Returns the number of flows converted.
pub fn opera_to_rotor<R: io::Read, W: io::Write>(
    input: R,
    output: W,
    hosts_per_rack: usize,
) -> Result<u64, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .comment(Some(b'#'))
        .from_reader(input);
    let mut wtr = csv::Writer::from_writer(output);
    wtr.write_record(&FLOW_CSV_HEADER)?;

    let mut flow_id: u64 = 0;
    for try_record in rdr.records() {
        let record = try_record?;
        if record.len() < 4 {
            return Err(format!("short opera record: {:?}", record).into());
        }

        let src_global: usize = record[0].parse()?;
        let dst_global: usize = record[1].parse()?;
        let size_bytes: u64 = record[2].parse()?;
        let start_time_ns: u64 = record[3].parse()?;

        let kind = if size_bytes >= BULK_THRESHOLD_BYTES {
            FlowKind::Bulk
        } else {
            FlowKind::LowLatency
        };

        wtr.write_record(&[
            flow_id.to_string().as_str(),
            (src_global / hosts_per_rack).to_string().as_str(),
            (dst_global / hosts_per_rack).to_string().as_str(),
            (src_global % hosts_per_rack).to_string().as_str(),
            (dst_global % hosts_per_rack).to_string().as_str(),
            size_bytes.to_string().as_str(),
            (start_time_ns as f64 / 1e6).to_string().as_str(),
            kind.name(),
        ])?;
        flow_id += 1;
    }

    wtr.flush()?;
    Ok(flow_id)
}

/// Converts the flow CSV format into an opera-style trace
///
/// Returns the number of flows converted.
pub fn rotor_to_opera<R: io::Read, W: io::Write>(
    input: R,
    output: W,
    hosts_per_rack: usize,
) -> Result<u64, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
    let mut wtr = csv::WriterBuilder::new().delimiter(b' ').from_writer(output);

    let mut count: u64 = 0;
    for try_record in rdr.records() {
        let record = try_record?;
        if record.len() < 8 {
            return Err(format!("short flow record: {:?}", record).into());
        }

        let src_rack: usize = record[1].parse()?;
        let dst_rack: usize = record[2].parse()?;
        let src_host: usize = record[3].parse()?;
        let dst_host: usize = record[4].parse()?;
        let size_bytes: u64 = record[5].parse()?;
        let start_time_ms: f64 = record[6].parse()?;

        let src_global = src_rack * hosts_per_rack + src_host;
        let dst_global = dst_rack * hosts_per_rack + dst_host;
        let start_time_ns = (start_time_ms * 1e6).round() as u64;

        wtr.write_record(&[
            src_global.to_string().as_str(),
            dst_global.to_string().as_str(),
            size_bytes.to_string().as_str(),
            start_time_ns.to_string().as_str(),
        ])?;
        count += 1;
    }

    wtr.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: usize = 32;

    #[test]
    fn opera_to_rotor_maps_hosts_to_racks() {
        let opera = "64 999 20000000 1500000\n0 33 1000 0\n";
        let mut out = Vec::new();
        let n = opera_to_rotor(opera.as_bytes(), &mut out, HOSTS).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("flow_id,"));
        // host 64 = rack 2 host 0; host 999 = rack 31 host 7; 20 MB is bulk
        assert_eq!(lines.next().unwrap(), "0,2,31,0,7,20000000,1.5,bulk");
        // 1 kB falls under the bulk threshold
        assert_eq!(lines.next().unwrap(), "1,0,1,0,1,1000,0,low_latency");
    }

    #[test]
    fn comment_lines_are_skipped() {
        let opera = "# header comment\n0 33 1000 0\n";
        let mut out = Vec::new();
        assert_eq!(opera_to_rotor(opera.as_bytes(), &mut out, HOSTS).unwrap(), 1);
    }

    #[test]
    fn round_trip_preserves_placement_and_size() {
        let opera = "64 999 20000000 1500000\n0 33 1000 0\n100 231 123456789 987654321\n";

        let mut rotor = Vec::new();
        opera_to_rotor(opera.as_bytes(), &mut rotor, HOSTS).unwrap();

        let mut back = Vec::new();
        rotor_to_opera(rotor.as_slice(), &mut back, HOSTS).unwrap();

        assert_eq!(String::from_utf8(back).unwrap(), opera);
    }

    #[test]
    fn rotor_to_opera_rounds_times_to_ns() {
        let rotor = "flow_id,src_rack,dst_rack,src_host,dst_host,size_bytes,start_time_ms,flow_type\n\
                     0,1,2,3,4,1500,0.0000015,bulk\n";
        let mut out = Vec::new();
        rotor_to_opera(rotor.as_bytes(), &mut out, HOSTS).unwrap();
        // 1.5 ns rounds to 2
        assert_eq!(String::from_utf8(out).unwrap(), "35,68,1500,2\n");
    }
}
