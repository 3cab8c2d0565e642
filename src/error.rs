//! Simulation error types

use serde::Serialize;
use thiserror::Error;

use crate::vehicle::component::ComponentId;
use crate::vehicle::config::FlightConfigurationId;

/// Result type for topology, configuration and run-level operations
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Run-level failures. Anything surfaced to the caller is one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// The active configuration never ignites a motor
    #[error("no motor would ignite in flight configuration {0}")]
    NoActiveMotor(FlightConfigurationId),

    /// The rocket has no flight configuration with this id
    #[error("unknown flight configuration: {0}")]
    UnknownConfiguration(FlightConfigurationId),

    /// A stage index outside the topology
    #[error("unknown stage index {index} (rocket has {count} stages)")]
    UnknownStage { index: usize, count: usize },

    /// A component id that is not part of the topology
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    /// The topology has no active stage to fly
    #[error("rocket topology has no active stage")]
    EmptyTopology,

    /// Structural rule broken while building the topology
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Recovery device trigger that can never be evaluated
    #[error("malformed deployment trigger on {device}: {reason}")]
    MalformedTrigger { device: String, reason: String },

    /// Motor definition that cannot produce a thrust curve
    #[error("malformed motor {designation}: {reason}")]
    MalformedMotor { designation: String, reason: String },

    /// Run options outside their valid range
    #[error("invalid simulation options: {0}")]
    InvalidOptions(String),

    /// Options file could not be read or parsed
    #[error("failed to load options: {0}")]
    OptionsLoad(String),
}

/// Failure confined to a single branch. Sibling branches keep running.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum BranchError {
    #[error("non-finite state at t={time:.4}s")]
    NumericalDivergence { time: f64 },
}
