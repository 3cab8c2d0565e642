pub mod assembly;
pub mod component;
pub mod config;
pub mod motor;
pub mod presets;
pub mod recovery;
pub mod rocket;

pub use assembly::{Assembly, MassProperties};
pub use component::{Component, ComponentId, ComponentKind};
pub use config::{
    FlightConfiguration, FlightConfigurationId, IgnitionEvent, MotorConfig, SeparationEvent, StageSeparation,
};
pub use motor::Motor;
pub use recovery::{DeployTrigger, RecoveryDevice, RecoveryKind};
pub use rocket::Rocket;
