use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Horizontal wind with a linear shear profile.
///
/// `direction` is where the wind blows *from*, radians clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindModel {
    pub speed: f64,     // m/s at the launch site
    pub direction: f64, // rad
    pub shear: f64,     // (m/s) per m of altitude
}

impl Default for WindModel {
    fn default() -> Self {
        Self::calm()
    }
}

impl WindModel {
    pub fn calm() -> Self {
        Self { speed: 0.0, direction: 0.0, shear: 0.0 }
    }

    pub fn constant(speed: f64, direction: f64) -> Self {
        Self { speed, direction, shear: 0.0 }
    }

    /// Wind velocity (ENU) at `altitude` above the launch site.
    pub fn velocity(&self, altitude: f64) -> Vector3<f64> {
        let magnitude = (self.speed + self.shear * altitude.max(0.0)).max(0.0);
        if magnitude == 0.0 {
            return Vector3::zeros();
        }
        // Blowing from `direction` means moving towards the opposite heading.
        -Vector3::new(self.direction.sin(), self.direction.cos(), 0.0) * magnitude
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(format!("wind speed {} must be finite and >= 0", self.speed));
        }
        if !self.direction.is_finite() || !self.shear.is_finite() {
            return Err("wind direction and shear must be finite".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calm_is_zero_everywhere() {
        assert_eq!(WindModel::calm().velocity(1_000.0), Vector3::zeros());
    }

    #[test]
    fn north_wind_blows_south() {
        let w = WindModel::constant(5.0, 0.0);
        let v = w.velocity(0.0);
        assert!((v.y + 5.0).abs() < 1e-12);
        assert!(v.x.abs() < 1e-12);
    }

    #[test]
    fn shear_increases_with_altitude() {
        let w = WindModel { speed: 2.0, direction: 0.0, shear: 0.01 };
        assert!(w.velocity(500.0).norm() > w.velocity(0.0).norm());
    }
}
