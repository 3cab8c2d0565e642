pub mod descent;
pub mod sixdof;
pub mod state;

use nalgebra::Vector3;

use crate::physics::atmosphere::{Atmo, Atmosphere};
use crate::physics::gravity::gravity_accel;
use crate::physics::wind::WindModel;
use state::{Deriv, State};

pub use descent::{DescentDynamics, TumbleDynamics};
pub use sixdof::{AscentDynamics, LaunchRod};

// ---------------------------------------------------------------------------
// Force model seam
// ---------------------------------------------------------------------------

/// Equations of motion for one flight phase.
pub trait Dynamics {
    fn derivatives(&self, state: &State) -> Deriv;

    /// Vehicle mass at `time`, kg.
    fn mass_at(&self, time: f64) -> f64;

    /// Largest step that keeps explicit RK4 stable near `state`.
    fn max_step(&self, _state: &State) -> f64 {
        f64::INFINITY
    }
}

/// Air and gravity around the launch site.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment {
    pub atmosphere: Atmosphere,
    pub wind: WindModel,
    pub launch_altitude: f64, // m above mean sea level
}

impl Environment {
    /// `altitude` is above the launch site.
    pub fn air(&self, altitude: f64) -> Atmo {
        self.atmosphere.at(self.launch_altitude + altitude.max(0.0))
    }

    pub fn gravity(&self, altitude: f64) -> Vector3<f64> {
        gravity_accel(self.launch_altitude + altitude)
    }

    /// Velocity relative to the surrounding air.
    pub fn air_velocity(&self, state: &State) -> Vector3<f64> {
        state.vel - self.wind.velocity(state.pos.z)
    }
}

/// Stability limit for quadratic drag: 0.5 / (k |v|) with k = ρ·CdA / (2m).
pub(crate) fn drag_step_limit(density: f64, drag_area: f64, mass: f64, airspeed: f64) -> f64 {
    let k = 0.5 * density * drag_area / mass.max(1e-9);
    let rate = k * airspeed;
    if rate > 1e-12 { 0.5 / rate } else { f64::INFINITY }
}
