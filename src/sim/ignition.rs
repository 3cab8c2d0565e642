use crate::error::{Result, SimulationError};
use crate::vehicle::component::ComponentId;
use crate::vehicle::config::{FlightConfiguration, IgnitionEvent};
use crate::vehicle::motor::Motor;
use crate::vehicle::rocket::Rocket;

// ---------------------------------------------------------------------------
// Motor instances and ignition resolution
// ---------------------------------------------------------------------------

/// Ignition condition with `Automatic` and relative references resolved
/// against the active stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnitionTrigger {
    Launch,
    /// Ejection charge of this stage
    Ejection(usize),
    /// Burnout of a motor in this stage
    Burnout(usize),
    Never,
}

/// A motor mounted in the flying vehicle (one per mount; `count` > 1 for
/// boosters).
#[derive(Debug, Clone)]
pub struct MotorInstance {
    pub mount: ComponentId,
    pub stage: usize,
    pub motor: Motor,
    pub trigger: IgnitionTrigger,
    pub delay: f64,
    pub position: f64, // m, absolute axial position of the motor's CG
    pub radial: f64,   // m from the vehicle axis
    pub count: u32,
    pub ignited_at: Option<f64>,
    pub(crate) ignition_scheduled: bool,
}

impl MotorInstance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mount: ComponentId,
        stage: usize,
        motor: Motor,
        trigger: IgnitionTrigger,
        delay: f64,
        position: f64,
        radial: f64,
        count: u32,
    ) -> Self {
        Self {
            mount,
            stage,
            motor,
            trigger,
            delay,
            position,
            radial,
            count,
            ignited_at: None,
            ignition_scheduled: false,
        }
    }

    fn since_ignition(&self, t: f64) -> f64 {
        self.ignited_at.map(|t0| t - t0).unwrap_or(-1.0)
    }

    pub fn thrust_at(&self, t: f64) -> f64 {
        self.count as f64 * self.motor.thrust_at(self.since_ignition(t))
    }

    pub fn mass_at(&self, t: f64) -> f64 {
        self.count as f64 * self.motor.mass_at(self.since_ignition(t))
    }

    pub fn is_burning(&self, t: f64) -> bool {
        self.ignited_at.is_some() && self.since_ignition(t) < self.motor.burn_time()
    }

    /// Ignition queued but not yet fired.
    pub fn is_pending(&self) -> bool {
        self.ignited_at.is_none() && self.ignition_scheduled
    }
}

/// Next active axial stage below the axial stage that carries `stage`.
fn active_axial_below(rocket: &Rocket, config: &FlightConfiguration, stage: usize) -> Option<usize> {
    let mut carrier = stage;
    while let Some(parent) = rocket.parent_stage(carrier) {
        carrier = parent;
    }
    rocket
        .axial_stages()
        .into_iter()
        .filter(|&s| s > carrier)
        .find(|&s| config.is_stage_active(s))
}

/// Resolve the motors of every active stage, boosters first (stage index
/// descending), then mounts in tree order.
///
/// Fails with `NoActiveMotor` when nothing in the configuration can ever
/// ignite.
pub fn resolve_motors(rocket: &Rocket, config: &FlightConfiguration) -> Result<Vec<MotorInstance>> {
    let bottom = rocket.bottom_active_axial_stage(config);
    let mut motors = Vec::new();

    for stage in config.active_stages().into_iter().rev() {
        for mount in rocket.stage_components(stage) {
            if !rocket.is_motor_mount(mount) {
                continue;
            }
            let Some(mc) = config.motor(mount) else { continue };
            mc.motor.validate()?;

            let below = active_axial_below(rocket, config, stage);
            let trigger = match mc.ignition {
                IgnitionEvent::Automatic => {
                    if rocket.is_parallel(stage) || Some(stage) == bottom || below.is_none() {
                        IgnitionTrigger::Launch
                    } else {
                        below.map(IgnitionTrigger::Ejection).unwrap_or(IgnitionTrigger::Launch)
                    }
                }
                IgnitionEvent::Launch => IgnitionTrigger::Launch,
                IgnitionEvent::EjectionCharge => below.map(IgnitionTrigger::Ejection).unwrap_or(IgnitionTrigger::Never),
                IgnitionEvent::Burnout => below.map(IgnitionTrigger::Burnout).unwrap_or(IgnitionTrigger::Never),
                IgnitionEvent::Never => IgnitionTrigger::Never,
            };

            let length = rocket.component(mount).map(|c| c.length).unwrap_or(0.0);
            motors.push(MotorInstance::new(
                mount,
                stage,
                mc.motor.clone(),
                trigger,
                mc.ignition_delay.max(0.0),
                rocket.absolute_position(mount) + 0.5 * length,
                rocket.radial_offset(mount),
                rocket.multiplicity(mount),
            ));
        }
    }

    if !ignition_reachable(&motors).iter().any(|&lit| lit) {
        return Err(SimulationError::NoActiveMotor(config.id.clone()));
    }
    Ok(motors)
}

/// Which motors can light, following launch → burnout → ejection chains.
pub fn ignition_reachable(motors: &[MotorInstance]) -> Vec<bool> {
    let mut lit = vec![false; motors.len()];
    loop {
        let mut changed = false;
        for i in 0..motors.len() {
            if lit[i] {
                continue;
            }
            let reachable = match motors[i].trigger {
                IgnitionTrigger::Launch => true,
                IgnitionTrigger::Never => false,
                IgnitionTrigger::Burnout(s) => motors
                    .iter()
                    .zip(&lit)
                    .any(|(m, &l)| l && m.stage == s),
                IgnitionTrigger::Ejection(s) => motors
                    .iter()
                    .zip(&lit)
                    .any(|(m, &l)| l && m.stage == s && m.motor.ejection_delay.is_some()),
            };
            if reachable {
                lit[i] = true;
                changed = true;
            }
        }
        if !changed {
            return lit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::component::Component;
    use crate::vehicle::config::{FlightConfigurationId, MotorConfig};

    fn motor(delay: Option<f64>) -> Motor {
        let m = Motor::new("T", vec![(0.0, 0.0), (0.1, 10.0), (1.0, 0.0)], 0.01, 0.01);
        match delay {
            Some(d) => m.ejection_delay(d),
            None => m,
        }
    }

    /// Upper, lower axial stages; boosters on the lower stage.
    fn rocket() -> (Rocket, [ComponentId; 3]) {
        let mut r = Rocket::new("R");
        let s0 = r.add_stage("Upper");
        let t0 = r.add(s0, Component::body_tube("Upper tube").length(0.3).radius(0.02)).unwrap();
        let m0 = r.add(t0, Component::inner_tube("Upper mount").offset(0.2).length(0.1)).unwrap();
        let s1 = r.add_stage("Lower");
        let m1 = r.add(s1, Component::body_tube("Lower tube").length(0.3).radius(0.02)).unwrap();
        let b = r.add_parallel_stage(m1, "Boosters", 2, 0.04, 0.0).unwrap();
        let bt = r.add(b, Component::body_tube("Booster tube").length(0.2).radius(0.01)).unwrap();
        let m2 = r.add(bt, Component::inner_tube("Booster mount").length(0.1)).unwrap();
        (r, [m0, m1, m2])
    }

    fn configured(r: &mut Rocket, mounts: [ComponentId; 3], delay: Option<f64>) -> FlightConfigurationId {
        let id = FlightConfigurationId::new("default");
        let c = r.create_configuration(id.clone());
        for m in mounts {
            c.set_motor(m, MotorConfig::new(motor(delay)));
        }
        id
    }

    #[test]
    fn boosters_resolve_first_and_at_launch() {
        let (mut r, mounts) = rocket();
        let id = configured(&mut r, mounts, Some(0.0));
        let motors = resolve_motors(&r, r.configuration(&id).unwrap()).unwrap();
        let order: Vec<usize> = motors.iter().map(|m| m.stage).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert_eq!(motors[0].trigger, IgnitionTrigger::Launch);
        assert_eq!(motors[0].count, 2);
        assert_eq!(motors[1].trigger, IgnitionTrigger::Launch);
        assert_eq!(motors[2].trigger, IgnitionTrigger::Ejection(1));
    }

    #[test]
    fn upper_stage_launches_when_lower_disabled() {
        let (mut r, mounts) = rocket();
        let id = configured(&mut r, mounts, Some(0.0));
        let c = r.configuration_mut(&id).unwrap();
        c.set_stage_active(1, false).unwrap();
        let c = r.configuration(&id).unwrap();
        let motors = resolve_motors(&r, c).unwrap();
        // booster stays active with its parent disabled
        assert_eq!(motors.iter().map(|m| m.stage).collect::<Vec<_>>(), vec![2, 0]);
        assert!(motors.iter().all(|m| m.trigger == IgnitionTrigger::Launch));
    }

    #[test]
    fn no_motor_is_fatal() {
        let (mut r, _) = rocket();
        let id = FlightConfigurationId::new("empty");
        r.create_configuration(id.clone());
        assert_eq!(
            resolve_motors(&r, r.configuration(&id).unwrap()).unwrap_err(),
            SimulationError::NoActiveMotor(id)
        );
    }

    #[test]
    fn plugged_lower_motor_cannot_light_upper() {
        let (mut r, mounts) = rocket();
        let id = configured(&mut r, mounts, None);
        let motors = resolve_motors(&r, r.configuration(&id).unwrap()).unwrap();
        assert_eq!(ignition_reachable(&motors), vec![true, true, false]);
    }

    #[test]
    fn never_ignited_everywhere_is_fatal() {
        let (mut r, mounts) = rocket();
        let id = FlightConfigurationId::new("never");
        let c = r.create_configuration(id.clone());
        c.set_motor(mounts[0], MotorConfig::new(motor(Some(0.0))).ignition(IgnitionEvent::Never));
        assert!(matches!(
            resolve_motors(&r, r.configuration(&id).unwrap()),
            Err(SimulationError::NoActiveMotor(_))
        ));
    }

    #[test]
    fn unlit_motor_carries_full_mass_and_no_thrust() {
        let m = MotorInstance::new(ComponentId(1), 0, motor(None), IgnitionTrigger::Launch, 0.0, 0.0, 0.0, 2);
        assert_eq!(m.thrust_at(0.5), 0.0);
        assert!((m.mass_at(0.5) - 0.04).abs() < 1e-12);
        assert!(!m.is_pending() && !m.is_burning(0.5));
    }
}
