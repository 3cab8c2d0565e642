use nalgebra::{Quaternion, Vector3};

use super::state::{Deriv, State};
use super::{drag_step_limit, Dynamics, Environment};
use crate::physics::aerodynamics::{
    damping_moment, drag_force, restoring_moment, AeroConditions, AerodynamicModel,
};
use crate::sim::ignition::MotorInstance;
use crate::vehicle::assembly::Assembly;

// ---------------------------------------------------------------------------
// Launch rod constraint
// ---------------------------------------------------------------------------

/// Guide rail the vehicle slides along until it clears the end.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRod {
    pub direction: Vector3<f64>, // unit, inertial
    pub length: f64,             // m
}

impl LaunchRod {
    /// Rod tilted `angle` from vertical towards azimuth `direction`
    /// (rad, clockwise from north).
    pub fn new(length: f64, angle: f64, direction: f64) -> Self {
        let dir = Vector3::new(angle.sin() * direction.sin(), angle.sin() * direction.cos(), angle.cos());
        Self { direction: dir, length }
    }

    /// Distance travelled along the rod.
    pub fn travel(&self, state: &State) -> f64 {
        state.pos.dot(&self.direction)
    }
}

// ---------------------------------------------------------------------------
// 6DOF Equations of motion (powered and coasting flight)
// ---------------------------------------------------------------------------

/// Full 6DOF ascent model.
///
/// Forces & moments:
///   1. Gravity (inverse-square, inertial frame)
///   2. Thrust of every burning motor along body +Z
///   3. Aerodynamic drag (opposing air-relative velocity)
///   4. Aerodynamic restoring moment (CP-CG offset)
///   5. Aerodynamic damping moment
///
/// While `rod` is set, translation is confined to the rod and rotation is
/// locked.
pub struct AscentDynamics<'a> {
    pub assembly: &'a Assembly,
    pub motors: &'a [MotorInstance],
    pub env: &'a Environment,
    pub aero: &'a dyn AerodynamicModel,
    pub rod: Option<LaunchRod>,
}

impl AscentDynamics<'_> {
    pub fn thrust_at(&self, t: f64) -> f64 {
        self.motors
            .iter()
            .filter(|m| self.assembly.contains_stage(m.stage))
            .map(|m| m.thrust_at(t))
            .sum()
    }
}

impl Dynamics for AscentDynamics<'_> {
    fn derivatives(&self, state: &State) -> Deriv {
        let props = self.assembly.mass_properties(self.motors, state.time);
        let mass = props.mass.max(1e-9);
        let geometry = &self.assembly.geometry;
        let area = geometry.reference_area;

        let atm = self.env.air(state.pos.z);
        let v_air = self.env.air_velocity(state);
        let speed = v_air.norm();
        let conditions = AeroConditions {
            mach: if atm.sound_speed > 0.0 { speed / atm.sound_speed } else { 0.0 },
            airspeed: speed,
            angle_of_attack: state.angle_of_attack(&v_air),
        };
        let coeffs = self.aero.coefficients(geometry, &conditions);

        // --- Forces (inertial) ---
        let f_gravity = self.env.gravity(state.pos.z) * mass;
        let f_thrust = state.body_z() * self.thrust_at(state.time);
        let f_drag = drag_force(&v_air, &atm, coeffs.cd, area);
        let mut accel = (f_gravity + f_thrust + f_drag) / mass;

        // --- Torques (body frame) ---
        let vel_body = state.quat.inverse() * v_air;
        // positive offset = CP behind CG = stable
        let cp_offset = (self.assembly.top + coeffs.cp) - props.cg;
        let mut torque = restoring_moment(&vel_body, speed, &atm, area, coeffs.cn_alpha, cp_offset);
        torque += damping_moment(&state.omega, speed, &atm, area, geometry.length);

        // --- Euler's equation: I * domega = torque - omega × (I * omega) ---
        let i_vec = Vector3::new(props.inertia_long, props.inertia_long, props.inertia_roll);
        let i_omega = i_vec.component_mul(&state.omega);
        let mut domega = (torque - state.omega.cross(&i_omega)).component_div(&i_vec);

        // --- Quaternion kinematics: dq/dt = 0.5 * q * omega_quat ---
        let omega_quat = Quaternion::new(0.0, state.omega.x, state.omega.y, state.omega.z);
        let mut dquat = state.quat.quaternion() * omega_quat * 0.5;

        if let Some(rod) = self.rod {
            let u = rod.direction;
            let along = accel.dot(&u);
            // resting on the launcher: no sinking below the start of the rod
            let along = if rod.travel(state) <= 0.0 && state.vel.dot(&u) <= 0.0 {
                along.max(0.0)
            } else {
                along
            };
            accel = u * along;
            domega = Vector3::zeros();
            dquat = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        }

        Deriv {
            dpos: if self.rod.is_some() { u_project(state.vel, self.rod) } else { state.vel },
            dvel: accel,
            dquat,
            domega,
        }
    }

    fn mass_at(&self, time: f64) -> f64 {
        self.assembly.mass_properties(self.motors, time).mass
    }

    fn max_step(&self, state: &State) -> f64 {
        let props = self.assembly.mass_properties(self.motors, state.time);
        let geometry = &self.assembly.geometry;
        let atm = self.env.air(state.pos.z);
        let speed = self.env.air_velocity(state).norm();
        let q_dyn = 0.5 * atm.density * speed * speed;

        let conditions = AeroConditions {
            mach: if atm.sound_speed > 0.0 { speed / atm.sound_speed } else { 0.0 },
            airspeed: speed,
            angle_of_attack: 0.0,
        };
        let coeffs = self.aero.coefficients(geometry, &conditions);
        let cp_offset = (self.assembly.top + coeffs.cp) - props.cg;

        let mut limit = drag_step_limit(atm.density, coeffs.cd * geometry.reference_area, props.mass, speed);
        if self.rod.is_none() {
            // weathercock natural frequency
            let stiffness = q_dyn * geometry.reference_area * coeffs.cn_alpha * cp_offset.abs();
            let omega_n = (stiffness / props.inertia_long).sqrt();
            if omega_n > 1e-9 {
                limit = limit.min(1.0 / omega_n);
            }
            if speed > 1.0 {
                let l = geometry.length.max(1e-3);
                let damping = 0.5 * q_dyn * geometry.reference_area * l * l / speed / props.inertia_long;
                if damping > 1e-9 {
                    limit = limit.min(1.0 / damping);
                }
            }
            let spin = state.omega.norm();
            if spin > 1e-9 {
                limit = limit.min(0.2 / spin);
            }
        }
        limit
    }
}

fn u_project(vel: Vector3<f64>, rod: Option<LaunchRod>) -> Vector3<f64> {
    match rod {
        Some(rod) => rod.direction * vel.dot(&rod.direction),
        None => vel,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
