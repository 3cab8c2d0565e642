use std::io::{self, Write};
use std::path::Path;

use crate::sim::data::FlightDataBranch;
use crate::vehicle::rocket::Rocket;

/// Write the samples of one branch in CSV format.
///
/// Columns: time, x, y, altitude, vx, vy, vz, airspeed, mach,
///          acceleration, mass, thrust, aoa_deg
pub fn write_samples<W: Write>(writer: &mut W, branch: &FlightDataBranch) -> io::Result<()> {
    writeln!(
        writer,
        "time,x,y,altitude,vx,vy,vz,airspeed,mach,\
         acceleration,mass,thrust,aoa_deg"
    )?;

    for s in branch.samples() {
        writeln!(
            writer,
            "{:.4},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.4},\
             {:.3},{:.5},{:.3},{:.2}",
            s.time,
            s.x, s.y, s.altitude,
            s.vx, s.vy, s.vz,
            s.airspeed, s.mach,
            s.acceleration,
            s.mass,
            s.thrust,
            s.angle_of_attack.to_degrees(),
        )?;
    }

    Ok(())
}

/// Write the event log of one branch: time, event, source component name.
pub fn write_events<W: Write>(writer: &mut W, branch: &FlightDataBranch, rocket: &Rocket) -> io::Result<()> {
    writeln!(writer, "time,event,source")?;
    for e in branch.events() {
        let source = e.source.map(|id| rocket.name_of(id)).unwrap_or("");
        writeln!(writer, "{:.4},{},{}", e.time, e.kind, source)?;
    }
    Ok(())
}

/// Write samples and events of a branch as `<stem>.csv` and
/// `<stem>_events.csv` under `dir`.
pub fn write_branch_files(dir: &Path, stem: &str, branch: &FlightDataBranch, rocket: &Rocket) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut samples = std::fs::File::create(dir.join(format!("{stem}.csv")))?;
    write_samples(&mut samples, branch)?;
    let mut events = std::fs::File::create(dir.join(format!("{stem}_events.csv")))?;
    write_events(&mut events, branch, rocket)
}

/// File-name friendly form of a branch name.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
