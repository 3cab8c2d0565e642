use nalgebra::{Quaternion, UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665;
pub const EARTH_RADIUS: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// 6DOF State: position, velocity, attitude, angular rate, mass
// ---------------------------------------------------------------------------

/// Continuous state of one branch. Position is ENU relative to the launch
/// site, so `pos.z` is altitude above the launch site.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub time: f64,
    pub pos: Vector3<f64>,              // m, inertial ENU
    pub vel: Vector3<f64>,              // m/s, inertial
    pub quat: UnitQuaternion<f64>,      // body→inertial rotation
    pub omega: Vector3<f64>,            // rad/s, body frame angular velocity
    pub mass: f64,                      // kg, evaluated from the motor model
}

impl State {
    /// At rest at the launch site, body +Z along `attitude`.
    pub fn at_rest(attitude: UnitQuaternion<f64>, mass: f64) -> Self {
        State {
            time: 0.0,
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            quat: attitude,
            omega: Vector3::zeros(),
            mass,
        }
    }

    pub fn apply(&self, d: &Deriv, dt: f64) -> State {
        // Quaternion integration: q_new = normalize(q + dq * dt)
        let q_raw = self.quat.quaternion() + d.dquat * dt;
        State {
            time: self.time + dt,
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            quat: UnitQuaternion::new_normalize(q_raw),
            omega: self.omega + d.domega * dt,
            mass: self.mass,
        }
    }

    pub fn is_finite(&self) -> bool {
        let q = self.quat.quaternion();
        self.time.is_finite()
            && self.pos.iter().all(|v| v.is_finite())
            && self.vel.iter().all(|v| v.is_finite())
            && self.omega.iter().all(|v| v.is_finite())
            && q.coords.iter().all(|v| v.is_finite())
            && self.mass.is_finite()
    }

    /// Body Z-axis (thrust direction) in inertial frame.
    pub fn body_z(&self) -> Vector3<f64> {
        self.quat * Vector3::z()
    }

    /// Pitch angle from local horizontal (rad). Positive = nose up.
    pub fn pitch(&self) -> f64 {
        self.body_z().z.clamp(-1.0, 1.0).asin()
    }

    /// Angle between an air-relative velocity and the body Z-axis (rad).
    pub fn angle_of_attack(&self, air_velocity: &Vector3<f64>) -> f64 {
        let speed = air_velocity.norm();
        if speed < 1e-6 {
            return 0.0;
        }
        let cos_alpha = air_velocity.dot(&self.body_z()) / speed;
        cos_alpha.clamp(-1.0, 1.0).acos()
    }
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Deriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
    pub dquat: Quaternion<f64>,   // not unit, raw quaternion derivative
    pub domega: Vector3<f64>,     // angular acceleration, body frame
}

impl Deriv {
    /// Translation only; attitude frozen.
    pub fn translational(vel: Vector3<f64>, accel: Vector3<f64>) -> Self {
        Deriv {
            dpos: vel,
            dvel: accel,
            dquat: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            domega: Vector3::zeros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_mass_and_advances_time() {
        let s = State::at_rest(UnitQuaternion::identity(), 1.5);
        let d = Deriv::translational(Vector3::new(0.0, 0.0, 2.0), Vector3::new(0.0, 0.0, 1.0));
        let n = s.apply(&d, 0.5);
        assert!((n.time - 0.5).abs() < 1e-12);
        assert!((n.pos.z - 1.0).abs() < 1e-12);
        assert!((n.vel.z - 0.5).abs() < 1e-12);
        assert_eq!(n.mass, 1.5);
    }

    #[test]
    fn nan_is_detected() {
        let mut s = State::at_rest(UnitQuaternion::identity(), 1.0);
        assert!(s.is_finite());
        s.vel.x = f64::NAN;
        assert!(!s.is_finite());
    }

    #[test]
    fn aoa_of_sideways_wind() {
        let s = State::at_rest(UnitQuaternion::identity(), 1.0);
        let aoa = s.angle_of_attack(&Vector3::new(1.0, 0.0, 1.0));
        assert!((aoa - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert!((s.pitch() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
