pub mod branch;
pub mod data;
pub mod deployment;
pub mod event;
pub mod ignition;
pub mod integrator;
pub mod options;
pub mod runner;
pub mod status;
pub mod stepper;

#[cfg(test)]
mod tests;

pub use data::{BranchOutcome, FlightData, FlightDataBranch, FlightSummary, Sample, Warning};
pub use event::{FlightEvent, FlightEventKind};
pub use ignition::{IgnitionTrigger, MotorInstance};
pub use integrator::rk4_step;
pub use options::{CancellationToken, SimulationOptions};
pub use runner::{simulate, Simulation};
