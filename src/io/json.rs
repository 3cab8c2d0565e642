use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::sim::data::{BranchOutcome, FlightData, FlightSummary, Warning};
use crate::sim::event::FlightEvent;

/// Per-branch part of the JSON report.
#[derive(Debug, Serialize)]
pub struct BranchReport<'a> {
    pub name: &'a str,
    pub outcome: &'a BranchOutcome,
    pub summary: FlightSummary,
    pub events: &'a [FlightEvent],
    pub warnings: &'a [Warning],
}

/// JSON report of a run: summaries and event logs, no samples.
#[derive(Debug, Serialize)]
pub struct FlightReport<'a> {
    pub rocket: &'a str,
    pub configuration: &'a str,
    pub warnings: &'a [Warning],
    pub branches: Vec<BranchReport<'a>>,
}

impl<'a> FlightReport<'a> {
    pub fn new(data: &'a FlightData) -> Self {
        Self {
            rocket: &data.rocket,
            configuration: &data.configuration,
            warnings: data.warnings(),
            branches: data
                .branches()
                .iter()
                .map(|b| BranchReport {
                    name: &b.name,
                    outcome: b.outcome(),
                    summary: b.summary(),
                    events: b.events(),
                    warnings: b.warnings(),
                })
                .collect(),
        }
    }
}

/// Write the flight report as pretty JSON to a writer.
pub fn write_report<W: Write>(writer: &mut W, data: &FlightData) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &FlightReport::new(data))?;
    writeln!(writer)
}

/// Write the flight report JSON to a file.
pub fn write_report_file(path: &Path, data: &FlightData) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_report(&mut file, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{simulate, SimulationOptions};
    use crate::vehicle::presets;

    #[test]
    fn json_report_is_valid() {
        let rocket = presets::alpha_iii().unwrap();
        let options = SimulationOptions::default().max_time(1.0);
        let data = simulate(&rocket, &presets::default_configuration(), &options).unwrap();

        let mut buf = Vec::new();
        write_report(&mut buf, &data).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["rocket"], "Alpha III");
        assert_eq!(value["branches"][0]["name"], "Sustainer");
        assert_eq!(value["branches"][0]["outcome"], "timed_out");
        assert_eq!(value["branches"][0]["events"][0]["kind"], "LAUNCH");
    }
}
