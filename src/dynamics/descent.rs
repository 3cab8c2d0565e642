use super::state::{Deriv, State};
use super::{drag_step_limit, Dynamics, Environment};
use crate::physics::aerodynamics::{drag_force, AeroConditions, AerodynamicModel};
use crate::sim::ignition::MotorInstance;
use crate::vehicle::assembly::Assembly;

// ---------------------------------------------------------------------------
// 3DOF descent models (attitude frozen)
// ---------------------------------------------------------------------------

/// Falling under deployed recovery devices. `device_drag_area` is the sum of
/// Cd·A over every deployed device.
pub struct DescentDynamics<'a> {
    pub assembly: &'a Assembly,
    pub motors: &'a [MotorInstance],
    pub env: &'a Environment,
    pub aero: &'a dyn AerodynamicModel,
    pub device_drag_area: f64,
}

impl DescentDynamics<'_> {
    fn drag_area(&self, state: &State) -> f64 {
        let atm = self.env.air(state.pos.z);
        let speed = self.env.air_velocity(state).norm();
        let conditions = AeroConditions {
            mach: if atm.sound_speed > 0.0 { speed / atm.sound_speed } else { 0.0 },
            airspeed: speed,
            angle_of_attack: 0.0,
        };
        let body = self.aero.coefficients(&self.assembly.geometry, &conditions).cd
            * self.assembly.geometry.reference_area;
        self.device_drag_area + body
    }
}

impl Dynamics for DescentDynamics<'_> {
    fn derivatives(&self, state: &State) -> Deriv {
        point_mass(self.env, state, self.mass_at(state.time), self.drag_area(state))
    }

    fn mass_at(&self, time: f64) -> f64 {
        self.assembly.mass_properties(self.motors, time).mass
    }

    fn max_step(&self, state: &State) -> f64 {
        let atm = self.env.air(state.pos.z);
        let speed = self.env.air_velocity(state).norm();
        drag_step_limit(atm.density, self.drag_area(state), self.mass_at(state.time), speed)
    }
}

/// Broadside tumbling with no recovery device out.
pub struct TumbleDynamics<'a> {
    pub assembly: &'a Assembly,
    pub motors: &'a [MotorInstance],
    pub env: &'a Environment,
    pub aero: &'a dyn AerodynamicModel,
}

impl Dynamics for TumbleDynamics<'_> {
    fn derivatives(&self, state: &State) -> Deriv {
        let area = self.aero.tumble_drag_area(&self.assembly.geometry);
        point_mass(self.env, state, self.mass_at(state.time), area)
    }

    fn mass_at(&self, time: f64) -> f64 {
        self.assembly.mass_properties(self.motors, time).mass
    }

    fn max_step(&self, state: &State) -> f64 {
        let atm = self.env.air(state.pos.z);
        let speed = self.env.air_velocity(state).norm();
        let area = self.aero.tumble_drag_area(&self.assembly.geometry);
        drag_step_limit(atm.density, area, self.mass_at(state.time), speed)
    }
}

fn point_mass(env: &Environment, state: &State, mass: f64, drag_area: f64) -> Deriv {
    let mass = mass.max(1e-9);
    let atm = env.air(state.pos.z);
    let v_air = env.air_velocity(state);
    // drag_force takes (cd, area); fold Cd·A into the area with cd = 1
    let f_drag = drag_force(&v_air, &atm, 1.0, drag_area);
    let accel = env.gravity(state.pos.z) + f_drag / mass;
    Deriv::translational(state.vel, accel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::aerodynamics::BasicAerodynamics;
    use crate::vehicle::component::Component;
    use crate::vehicle::rocket::Rocket;
    use nalgebra::{UnitQuaternion, Vector3};

    fn body() -> Assembly {
        let mut r = Rocket::new("Test");
        let s = r.add_stage("S1");
        r.add(s, Component::nose_cone("Nose").length(0.1).radius(0.02).mass(0.05)).unwrap();
        r.add(s, Component::body_tube("Tube").length(0.4).radius(0.02).mass(0.15)).unwrap();
        Assembly::new(&r, &[0])
    }

    fn falling(speed: f64) -> State {
        let mut s = State::at_rest(UnitQuaternion::identity(), 0.2);
        s.pos.z = 200.0;
        s.vel = Vector3::new(0.0, 0.0, -speed);
        s
    }

    #[test]
    fn chute_reaches_terminal_velocity() {
        let assembly = body();
        let env = Environment::default();
        let d = DescentDynamics {
            assembly: &assembly,
            motors: &[],
            env: &env,
            aero: &BasicAerodynamics,
            device_drag_area: 0.8 * 0.0707,
        };
        // Cd·A = 0.0566 m^2, m = 0.2 kg → v_t ≈ sqrt(2mg / (ρ CdA)) ≈ 7.5 m/s
        let slow = d.derivatives(&falling(3.0));
        let fast = d.derivatives(&falling(12.0));
        assert!(slow.dvel.z < 0.0);
        assert!(fast.dvel.z > 0.0);
    }

    #[test]
    fn tumbling_drags_more_than_falling_nose_first() {
        let assembly = body();
        let env = Environment::default();
        let tumble = TumbleDynamics { assembly: &assembly, motors: &[], env: &env, aero: &BasicAerodynamics };
        let bare = DescentDynamics {
            assembly: &assembly,
            motors: &[],
            env: &env,
            aero: &BasicAerodynamics,
            device_drag_area: 0.0,
        };
        let s = falling(40.0);
        assert!(tumble.derivatives(&s).dvel.z > bare.derivatives(&s).dvel.z);
    }

    #[test]
    fn step_limit_shrinks_with_speed() {
        let assembly = body();
        let env = Environment::default();
        let d = DescentDynamics {
            assembly: &assembly,
            motors: &[],
            env: &env,
            aero: &BasicAerodynamics,
            device_drag_area: 0.5,
        };
        assert!(d.max_step(&falling(100.0)) < d.max_step(&falling(10.0)));
    }
}
