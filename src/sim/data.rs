use std::fmt;

use serde::Serialize;

use super::event::{FlightEvent, FlightEventKind};
use crate::error::BranchError;

// ---------------------------------------------------------------------------
// Recorded samples
// ---------------------------------------------------------------------------

/// One committed integration step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub x: f64,        // m east
    pub y: f64,        // m north
    pub altitude: f64, // m above the launch site
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub airspeed: f64,
    pub mach: f64,
    pub acceleration: f64, // m/s^2, magnitude
    pub mass: f64,
    pub thrust: f64,
    pub angle_of_attack: f64, // rad
}

impl Sample {
    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy + self.vz * self.vz).sqrt()
    }
}

/// Non-fatal advisory raised during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Recovery device opened faster than its rated speed
    HighDeploymentSpeed { device: String, time: f64, speed: f64, limit: f64 },
    /// A stage separated but carried no mass, so no branch was created
    MasslessSeparation { stage: String, time: f64 },
    /// A motor whose ignition condition can never occur
    UnreachableIgnition { mount: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::HighDeploymentSpeed { device, time, speed, limit } => write!(
                f,
                "{device} deployed at {speed:.1} m/s (limit {limit:.1} m/s) at t={time:.3}s"
            ),
            Warning::MasslessSeparation { stage, time } => {
                write!(f, "{stage} separated without mass at t={time:.3}s; no branch created")
            }
            Warning::UnreachableIgnition { mount } => {
                write!(f, "motor in {mount} can never ignite")
            }
        }
    }
}

/// How a branch ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOutcome {
    Completed,
    /// Simulated or wall-clock limit reached
    TimedOut,
    Cancelled,
    Failed(BranchError),
}

// ---------------------------------------------------------------------------
// Per-branch recorder
// ---------------------------------------------------------------------------

/// Append-only record of one branch.
#[derive(Debug, Clone, Serialize)]
pub struct FlightDataBranch {
    pub name: String,
    samples: Vec<Sample>,
    events: Vec<FlightEvent>,
    warnings: Vec<Warning>,
    outcome: BranchOutcome,
}

impl FlightDataBranch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Vec::new(),
            events: Vec::new(),
            warnings: Vec::new(),
            outcome: BranchOutcome::Completed,
        }
    }

    /// Start a forked branch carrying over some of the parent's history.
    pub(crate) fn forked(name: impl Into<String>, events: Vec<FlightEvent>) -> Self {
        Self { events, ..Self::new(name) }
    }

    pub(crate) fn push_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub(crate) fn push_event(&mut self, event: FlightEvent) {
        self.events.push(event);
    }

    pub(crate) fn push_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub(crate) fn set_outcome(&mut self, outcome: BranchOutcome) {
        self.outcome = outcome;
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn events(&self) -> &[FlightEvent] {
        &self.events
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn outcome(&self) -> &BranchOutcome {
        &self.outcome
    }

    pub fn event_kinds(&self) -> Vec<FlightEventKind> {
        self.events.iter().map(|e| e.kind).collect()
    }

    pub fn first_event(&self, kind: FlightEventKind) -> Option<&FlightEvent> {
        self.events.iter().find(|e| e.kind == kind)
    }

    fn sample_near(&self, time: f64) -> Option<&Sample> {
        self.samples
            .iter()
            .min_by(|a, b| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
    }

    fn speed_at_event(&self, kind: FlightEventKind) -> Option<f64> {
        let event = self.first_event(kind)?;
        self.sample_near(event.time).map(Sample::speed)
    }

    pub fn summary(&self) -> FlightSummary {
        let fold_max = |f: fn(&Sample) -> f64| self.samples.iter().map(f).fold(0.0_f64, f64::max);
        let flight_time = self
            .first_event(FlightEventKind::GroundHit)
            .map(|e| e.time)
            .or_else(|| self.samples.last().map(|s| s.time))
            .unwrap_or(0.0);

        FlightSummary {
            max_altitude: fold_max(|s| s.altitude),
            max_velocity: fold_max(Sample::speed),
            max_mach: fold_max(|s| s.mach),
            max_acceleration: fold_max(|s| s.acceleration),
            flight_time,
            time_to_apogee: self.first_event(FlightEventKind::Apogee).map(|e| e.time),
            launch_rod_velocity: self.speed_at_event(FlightEventKind::LaunchRod),
            deployment_velocity: self.speed_at_event(FlightEventKind::RecoveryDeviceDeployment),
            ground_hit_velocity: self.speed_at_event(FlightEventKind::GroundHit),
        }
    }
}

/// Derived figures of one branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlightSummary {
    pub max_altitude: f64,     // m
    pub max_velocity: f64,     // m/s
    pub max_mach: f64,
    pub max_acceleration: f64, // m/s^2
    pub flight_time: f64,      // s
    pub time_to_apogee: Option<f64>,
    pub launch_rod_velocity: Option<f64>,
    pub deployment_velocity: Option<f64>,
    pub ground_hit_velocity: Option<f64>,
}

// ---------------------------------------------------------------------------
// Whole run
// ---------------------------------------------------------------------------

/// All branches of a run: the main branch first, then forks depth-first.
#[derive(Debug, Clone, Serialize)]
pub struct FlightData {
    pub rocket: String,
    pub configuration: String,
    branches: Vec<FlightDataBranch>,
    warnings: Vec<Warning>,
}

impl FlightData {
    pub(crate) fn new(
        rocket: impl Into<String>,
        configuration: impl Into<String>,
        branches: Vec<FlightDataBranch>,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            rocket: rocket.into(),
            configuration: configuration.into(),
            branches,
            warnings,
        }
    }

    pub fn branches(&self) -> &[FlightDataBranch] {
        &self.branches
    }

    pub fn branch(&self, index: usize) -> Option<&FlightDataBranch> {
        self.branches.get(index)
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Run-level advisories (not tied to one branch).
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Summary of the main branch.
    pub fn summary(&self) -> Option<FlightSummary> {
        self.branches.first().map(FlightDataBranch::summary)
    }

    pub fn is_cancelled(&self) -> bool {
        self.branches.iter().any(|b| *b.outcome() == BranchOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time: f64, altitude: f64, vz: f64) -> Sample {
        Sample {
            time,
            x: 0.0,
            y: 0.0,
            altitude,
            vx: 0.0,
            vy: 0.0,
            vz,
            airspeed: vz.abs(),
            mach: vz.abs() / 340.0,
            acceleration: 9.8,
            mass: 1.0,
            thrust: 0.0,
            angle_of_attack: 0.0,
        }
    }

    fn flight() -> FlightDataBranch {
        let mut b = FlightDataBranch::new("Sustainer");
        b.push_sample(sample(0.0, 0.0, 100.0));
        b.push_sample(sample(10.0, 5000.0, 0.0));
        b.push_sample(sample(20.0, 0.0, -50.0));
        b.push_event(FlightEvent::new(FlightEventKind::Apogee, 10.0, None));
        b.push_event(FlightEvent::new(FlightEventKind::GroundHit, 20.0, None));
        b
    }

    #[test]
    fn summary_computes_apogee() {
        let s = flight().summary();
        assert!((s.max_altitude - 5000.0).abs() < 0.1);
        assert_eq!(s.time_to_apogee, Some(10.0));
        assert_eq!(s.flight_time, 20.0);
        assert_eq!(s.ground_hit_velocity, Some(50.0));
        assert_eq!(s.launch_rod_velocity, None);
    }

    #[test]
    fn run_summary_reads_main_branch() {
        let data = FlightData::new("R", "default", vec![flight(), FlightDataBranch::new("Booster")], vec![]);
        assert_eq!(data.branch_count(), 2);
        assert_eq!(data.summary().map(|s| s.max_altitude), Some(5000.0));
    }

    #[test]
    fn json_output_is_valid() {
        let json = serde_json::to_string(&flight()).unwrap();
        assert!(json.contains("\"GROUND_HIT\""));
        assert!(json.contains("\"completed\""));
    }
}
