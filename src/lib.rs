pub mod error;
pub mod physics;
pub mod dynamics;
pub mod vehicle;
pub mod sim;
pub mod io;

pub use error::{BranchError, Result, SimulationError};
pub use sim::{
    simulate, BranchOutcome, CancellationToken, FlightData, FlightDataBranch, FlightEvent, FlightEventKind,
    FlightSummary, Simulation, SimulationOptions, Warning,
};
pub use vehicle::{FlightConfigurationId, Rocket};
