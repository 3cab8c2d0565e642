use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rocket_flight_sim::io::{csv, json};
use rocket_flight_sim::vehicle::presets;
use rocket_flight_sim::{FlightConfigurationId, Simulation, SimulationOptions};

#[derive(Parser)]
#[command(name = "rocket-flight-sim")]
#[command(about = "Multi-stage rocket flight simulation with staging and recovery")]
struct Cli {
    /// Preset vehicle: alpha, beta or heavy
    #[arg(short, long, default_value = "heavy")]
    rocket: String,

    /// Flight configuration id (defaults to the rocket's default)
    #[arg(short, long)]
    configuration: Option<String>,

    /// YAML file with simulation options
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Directory for per-branch sample and event CSV files
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Path for the JSON flight report
    #[arg(long)]
    json: Option<PathBuf>,

    /// Run sibling branches on the thread pool
    #[arg(long)]
    parallel: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let rocket = presets::by_name(&cli.rocket)
        .ok_or_else(|| format!("unknown rocket '{}' (expected one of {:?})", cli.rocket, presets::NAMES))??;

    let mut options = match &cli.options {
        Some(path) => SimulationOptions::from_yaml_file(path)?,
        None => SimulationOptions::default(),
    };
    if cli.parallel {
        options = options.parallel_branches(true);
    }
    let configuration = cli
        .configuration
        .clone()
        .map(FlightConfigurationId::new)
        .unwrap_or_else(presets::default_configuration);

    let data = Simulation::new(&rocket, configuration).with_options(options).run()?;

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  ROCKET FLIGHT SIMULATION  {} [{}]", data.rocket, data.configuration);
    println!("====================================================================");

    for warning in data.warnings() {
        println!("  warning: {warning}");
    }

    for branch in data.branches() {
        println!();
        println!("  Branch: {} ({:?})", branch.name, branch.outcome());
        println!("  ──────────────────────────────────────────────────────────────────");
        for e in branch.events() {
            let source = e.source.map(|id| rocket.name_of(id)).unwrap_or("");
            println!("  {:>8.3}s  {:<28} {}", e.time, e.kind.to_string(), source);
        }
        for warning in branch.warnings() {
            println!("  warning: {warning}");
        }

        let s = branch.summary();
        println!();
        println!("  Max altitude:  {:>8.1} m", s.max_altitude);
        println!("  Max speed:     {:>8.1} m/s (Mach {:.2})", s.max_velocity, s.max_mach);
        println!("  Max accel:     {:>8.1} m/s^2 ({:.1} g)", s.max_acceleration, s.max_acceleration / 9.80665);
        if let Some(t) = s.time_to_apogee {
            println!("  Apogee at:     {:>8.2} s", t);
        }
        if let Some(v) = s.launch_rod_velocity {
            println!("  Rod clearance: {:>8.1} m/s", v);
        }
        if let Some(v) = s.deployment_velocity {
            println!("  Deployment:    {:>8.1} m/s", v);
        }
        if let Some(v) = s.ground_hit_velocity {
            println!("  Ground hit:    {:>8.1} m/s", v);
        }
        println!("  Flight time:   {:>8.1} s", s.flight_time);
    }
    println!();
    println!("====================================================================");

    if let Some(dir) = &cli.csv {
        for (i, branch) in data.branches().iter().enumerate() {
            let stem = format!("{i:02}_{}", csv::file_stem(&branch.name));
            csv::write_branch_files(dir, &stem, branch, &rocket)?;
        }
        println!("  CSV written to {}", dir.display());
    }
    if let Some(path) = &cli.json {
        json::write_report_file(path, &data)?;
        println!("  JSON report written to {}", path.display());
    }
    Ok(())
}
