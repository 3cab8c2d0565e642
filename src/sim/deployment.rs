use super::event::Crossing;
use super::status::SimulationStatus;
use crate::dynamics::Environment;
use crate::vehicle::component::ComponentId;
use crate::vehicle::recovery::{DeployTrigger, RecoveryDevice};
use crate::vehicle::rocket::Rocket;

// ---------------------------------------------------------------------------
// Recovery deployment
// ---------------------------------------------------------------------------

/// Discrete happenings that can arm a recovery device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployCause {
    /// Ejection charge of this stage fired
    Ejection(usize),
    Apogee,
    /// The stage directly below this stage separated
    LowerStageSeparation(usize),
}

fn attached_devices<'r>(
    rocket: &'r Rocket,
    status: &'r SimulationStatus,
) -> impl Iterator<Item = (ComponentId, &'r RecoveryDevice)> + 'r {
    status
        .assembly
        .recovery_devices
        .iter()
        .copied()
        .filter(|id| !status.armed.contains(id))
        .filter_map(|id| rocket.component(id).and_then(|c| c.recovery_device()).map(|d| (id, d)))
}

/// Unarmed devices whose trigger is satisfied by `cause`, topmost first,
/// paired with their deploy delay.
pub fn triggered_devices(rocket: &Rocket, status: &SimulationStatus, cause: DeployCause) -> Vec<(ComponentId, f64)> {
    let altitude = status.state.pos.z;
    let mut devices: Vec<(ComponentId, f64)> = attached_devices(rocket, status)
        .filter(|(id, device)| match (cause, device.trigger) {
            (DeployCause::Ejection(stage), DeployTrigger::Ejection) => rocket.stage_index_of(*id) == Some(stage),
            (DeployCause::Apogee, DeployTrigger::Apogee) => true,
            // apogee below the deploy altitude: open right away
            (DeployCause::Apogee, DeployTrigger::Altitude(h)) => altitude <= h,
            (DeployCause::LowerStageSeparation(stage), DeployTrigger::LowerStageSeparation) => {
                rocket.stage_index_of(*id) == Some(stage)
            }
            _ => false,
        })
        .map(|(id, device)| (id, device.deploy_delay))
        .collect();
    devices.sort_by(|a, b| rocket.absolute_position(a.0).total_cmp(&rocket.absolute_position(b.0)));
    devices
}

/// Continuous deploy conditions worth watching from the current state.
pub fn deploy_crossings(rocket: &Rocket, status: &SimulationStatus, env: &Environment) -> Vec<Crossing> {
    let state = &status.state;
    let airspeed = env.air_velocity(state).norm();
    let mut crossings: Vec<(f64, Crossing)> = attached_devices(rocket, status)
        .filter_map(|(device, d)| match d.trigger {
            DeployTrigger::Altitude(altitude) if status.apogee && state.pos.z > altitude => {
                Some((rocket.absolute_position(device), Crossing::DeployAltitude { device, altitude }))
            }
            DeployTrigger::Speed(speed) if status.rod_cleared && airspeed > speed => {
                Some((rocket.absolute_position(device), Crossing::DeploySpeed { device, speed }))
            }
            _ => None,
        })
        .collect();
    crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
    crossings.into_iter().map(|(_, c)| c).collect()
}

/// Whether a device opening at `airspeed` exceeds its rated speed.
pub fn deployment_speed_exceeded(device: &RecoveryDevice, airspeed: f64) -> bool {
    airspeed > device.max_deploy_speed
}
