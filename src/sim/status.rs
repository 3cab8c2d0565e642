use std::collections::BTreeSet;

use super::data::FlightDataBranch;
use super::event::{Action, EventQueue};
use super::ignition::MotorInstance;
use crate::dynamics::state::State;
use crate::vehicle::assembly::Assembly;
use crate::vehicle::component::ComponentId;
use crate::vehicle::rocket::Rocket;

/// Which equations of motion drive the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 6DOF, powered or coasting (launch rod included)
    Ascent,
    /// 3DOF under deployed recovery devices
    Descent,
    /// 3DOF broadside tumble
    Tumble,
}

/// Everything one branch loop owns. Cloned on a fork.
#[derive(Debug, Clone)]
pub struct SimulationStatus {
    pub state: State,
    pub assembly: Assembly,
    pub motors: Vec<MotorInstance>,
    pub queue: EventQueue,
    pub phase: Phase,
    pub deployed: Vec<ComponentId>,
    /// Devices whose deployment is scheduled or done
    pub armed: BTreeSet<ComponentId>,
    pub ejected: BTreeSet<usize>,
    pub liftoff: bool,
    pub rod_cleared: bool,
    pub apogee: bool,
    pub tumbling: bool,
    pub ended: bool,
    pub data: FlightDataBranch,
}

impl SimulationStatus {
    pub fn new(name: impl Into<String>, state: State, assembly: Assembly, motors: Vec<MotorInstance>) -> Self {
        Self {
            state,
            assembly,
            motors,
            queue: EventQueue::new(),
            phase: Phase::Ascent,
            deployed: Vec::new(),
            armed: BTreeSet::new(),
            ejected: BTreeSet::new(),
            liftoff: false,
            rod_cleared: false,
            apogee: false,
            tumbling: false,
            ended: false,
            data: FlightDataBranch::new(name),
        }
    }

    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn is_attached(&self, stage: usize) -> bool {
        self.assembly.contains_stage(stage)
    }

    pub fn device_attached(&self, rocket: &Rocket, device: ComponentId) -> bool {
        rocket.stage_index_of(device).is_some_and(|s| self.is_attached(s))
    }

    /// Stage directly above `stage` in this branch: the carrier of a
    /// booster, or the next attached axial stage up.
    pub fn upper_stage(&self, rocket: &Rocket, stage: usize) -> Option<usize> {
        if let Some(parent) = rocket.parent_stage(stage) {
            return Some(parent);
        }
        rocket
            .axial_stages()
            .into_iter()
            .filter(|&s| s < stage && self.is_attached(s))
            .last()
    }

    /// Any attached motor burning now or about to ignite.
    pub fn has_active_motor(&self) -> bool {
        let t = self.state.time;
        self.motors
            .iter()
            .filter(|m| self.is_attached(m.stage))
            .any(|m| m.is_burning(t) || m.is_pending())
    }

    /// Sum of Cd·A of the deployed devices still attached.
    pub fn deployed_drag_area(&self, rocket: &Rocket) -> f64 {
        self.deployed
            .iter()
            .filter(|d| self.device_attached(rocket, **d))
            .filter_map(|d| rocket.component(*d).and_then(|c| c.recovery_device()))
            .map(|device| device.drag_area())
            .sum()
    }
}

/// Stage an action belongs to; used to split the queue on a fork.
pub fn action_stage(rocket: &Rocket, motors: &[MotorInstance], action: &Action) -> Option<usize> {
    match *action {
        Action::Ignition { motor } | Action::Burnout { motor } => motors.get(motor).map(|m| m.stage),
        Action::Ejection { stage } | Action::Separation { stage } => Some(stage),
        Action::Deployment { device } => rocket.stage_index_of(device),
    }
}
