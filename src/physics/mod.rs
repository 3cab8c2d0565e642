pub mod aerodynamics;
pub mod atmosphere;
pub mod gravity;
pub mod wind;

pub use aerodynamics::{AerodynamicModel, BasicAerodynamics};
pub use atmosphere::{isa, Atmo, Atmosphere};
pub use wind::WindModel;
