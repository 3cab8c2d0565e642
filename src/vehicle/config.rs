use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::component::ComponentId;
use super::motor::Motor;
use crate::error::{Result, SimulationError};

// ---------------------------------------------------------------------------
// Flight configuration: which stages fly, with which motors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightConfigurationId(pub String);

impl FlightConfigurationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for FlightConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a mounted motor is lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnitionEvent {
    /// Launch for boosters and the lowest active axial stage,
    /// otherwise the ejection charge of the next active stage below.
    Automatic,
    Launch,
    /// Ejection charge of the next active axial stage below
    EjectionCharge,
    /// Burnout of the next active axial stage below
    Burnout,
    Never,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorConfig {
    pub motor: Motor,
    pub ignition: IgnitionEvent,
    pub ignition_delay: f64, // s
}

impl MotorConfig {
    pub fn new(motor: Motor) -> Self {
        Self { motor, ignition: IgnitionEvent::Automatic, ignition_delay: 0.0 }
    }

    pub fn ignition(mut self, event: IgnitionEvent) -> Self { self.ignition = event; self }
    pub fn delay(mut self, v: f64) -> Self { self.ignition_delay = v; self }
}

/// What separates a stage from the stage above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationEvent {
    EjectionCharge,
    Burnout,
    /// Ignition of a motor in the stage above
    UpperIgnition,
    Launch,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSeparation {
    pub event: SeparationEvent,
    pub delay: f64,
}

impl Default for StageSeparation {
    fn default() -> Self {
        Self { event: SeparationEvent::EjectionCharge, delay: 0.0 }
    }
}

/// Active-stage selection plus motor and separation assignments.
///
/// Stages are addressed by index in the rocket's depth-first stage order;
/// internally they are keyed by component so structural edits keep the
/// selection attached to the right stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightConfiguration {
    pub id: FlightConfigurationId,
    pub name: String,
    stages: Vec<ComponentId>,
    inactive: BTreeSet<ComponentId>,
    motors: BTreeMap<ComponentId, MotorConfig>,
    separations: BTreeMap<ComponentId, StageSeparation>,
}

impl FlightConfiguration {
    pub(crate) fn new(id: FlightConfigurationId, stages: Vec<ComponentId>) -> Self {
        Self {
            name: id.0.clone(),
            id,
            stages,
            inactive: BTreeSet::new(),
            motors: BTreeMap::new(),
            separations: BTreeMap::new(),
        }
    }

    /// Keep the stage list in step with the rocket after a structural edit.
    pub(crate) fn sync_stages(&mut self, stages: Vec<ComponentId>, alive: impl Fn(ComponentId) -> bool) {
        self.inactive.retain(|id| stages.contains(id));
        self.separations.retain(|id, _| stages.contains(id));
        self.motors.retain(|id, _| alive(*id));
        self.stages = stages;
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn stage_id(&self, index: usize) -> Result<ComponentId> {
        self.stages.get(index).copied().ok_or(SimulationError::UnknownStage {
            index,
            count: self.stages.len(),
        })
    }

    // --- stage activation surface -----------------------------------------

    pub fn set_stage_active(&mut self, index: usize, active: bool) -> Result<()> {
        let id = self.stage_id(index)?;
        if active {
            self.inactive.remove(&id);
        } else {
            self.inactive.insert(id);
        }
        Ok(())
    }

    pub fn set_all_stages(&mut self) {
        self.inactive.clear();
    }

    pub fn set_only_stage(&mut self, index: usize) -> Result<()> {
        let keep = self.stage_id(index)?;
        self.inactive = self.stages.iter().copied().filter(|id| *id != keep).collect();
        Ok(())
    }

    pub fn toggle_stage(&mut self, index: usize) -> Result<()> {
        let active = self.is_stage_active(index);
        self.set_stage_active(index, !active)
    }

    pub fn is_stage_active(&self, index: usize) -> bool {
        self.stages
            .get(index)
            .is_some_and(|id| !self.inactive.contains(id))
    }

    pub fn active_stages(&self) -> Vec<usize> {
        (0..self.stages.len()).filter(|&i| self.is_stage_active(i)).collect()
    }

    // --- motors and separation --------------------------------------------

    pub fn set_motor(&mut self, mount: ComponentId, config: MotorConfig) {
        self.motors.insert(mount, config);
    }

    pub fn clear_motor(&mut self, mount: ComponentId) {
        self.motors.remove(&mount);
    }

    pub fn motor(&self, mount: ComponentId) -> Option<&MotorConfig> {
        self.motors.get(&mount)
    }

    pub fn motors(&self) -> impl Iterator<Item = (ComponentId, &MotorConfig)> {
        self.motors.iter().map(|(id, m)| (*id, m))
    }

    pub fn set_separation(&mut self, index: usize, separation: StageSeparation) -> Result<()> {
        let id = self.stage_id(index)?;
        self.separations.insert(id, separation);
        Ok(())
    }

    pub fn separation(&self, index: usize) -> StageSeparation {
        self.stages
            .get(index)
            .and_then(|id| self.separations.get(id))
            .copied()
            .unwrap_or_default()
    }
}
