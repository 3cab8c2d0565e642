use nalgebra::Vector3;

use crate::dynamics::state::{EARTH_RADIUS, G0};

/// Inverse-square gravity acceleration (ENU, launch-site frame).
/// `altitude` is above mean sea level.
pub fn gravity_accel(altitude: f64) -> Vector3<f64> {
    let alt = altitude.max(0.0);
    let g = G0 * (EARTH_RADIUS / (EARTH_RADIUS + alt)).powi(2);
    Vector3::new(0.0, 0.0, -g)
}
