use std::f64::consts::PI;

use crate::error::{Result, SimulationError};

/// What arms a recovery device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeployTrigger {
    /// Ejection charge of the stage holding the device
    Ejection,
    /// Vertical velocity crossing zero
    Apogee,
    /// Descending through this altitude above the launch site, m
    Altitude(f64),
    /// Airspeed dropping below this value after liftoff, m/s
    Speed(f64),
    /// Separation of the stage directly below the device's stage
    LowerStageSeparation,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryKind {
    Parachute { diameter: f64 },
    Streamer { strip_length: f64, strip_width: f64 },
}

/// Drag device deployed during descent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryDevice {
    pub kind: RecoveryKind,
    pub cd: f64,
    pub trigger: DeployTrigger,
    pub deploy_delay: f64,     // s after the trigger
    pub max_deploy_speed: f64, // m/s, above this a warning is raised
}

impl RecoveryDevice {
    pub fn parachute(diameter: f64, cd: f64) -> Self {
        Self {
            kind: RecoveryKind::Parachute { diameter },
            cd,
            trigger: DeployTrigger::Ejection,
            deploy_delay: 0.0,
            max_deploy_speed: 250.0,
        }
    }

    pub fn streamer(strip_length: f64, strip_width: f64, cd: f64) -> Self {
        Self {
            kind: RecoveryKind::Streamer { strip_length, strip_width },
            cd,
            trigger: DeployTrigger::Ejection,
            deploy_delay: 0.0,
            max_deploy_speed: 250.0,
        }
    }

    pub fn trigger(mut self, trigger: DeployTrigger) -> Self { self.trigger = trigger; self }
    pub fn delay(mut self, v: f64) -> Self { self.deploy_delay = v; self }
    pub fn max_deploy_speed(mut self, v: f64) -> Self { self.max_deploy_speed = v; self }

    /// Reference area used with `cd`, m^2.
    pub fn area(&self) -> f64 {
        match self.kind {
            RecoveryKind::Parachute { diameter } => PI * 0.25 * diameter * diameter,
            RecoveryKind::Streamer { strip_length, strip_width } => strip_length * strip_width,
        }
    }

    pub fn drag_area(&self) -> f64 {
        self.cd * self.area()
    }

    /// Reject triggers and sizes that can never be evaluated.
    pub fn validate(&self, name: &str) -> Result<()> {
        let malformed = |reason: String| SimulationError::MalformedTrigger {
            device: name.to_string(),
            reason,
        };
        if !(self.deploy_delay.is_finite() && self.deploy_delay >= 0.0) {
            return Err(malformed(format!("deploy delay {} s", self.deploy_delay)));
        }
        match self.trigger {
            DeployTrigger::Altitude(h) if !(h.is_finite() && h >= 0.0) => {
                return Err(malformed(format!("deploy altitude {h} m")));
            }
            DeployTrigger::Speed(v) if !(v.is_finite() && v > 0.0) => {
                return Err(malformed(format!("deploy speed {v} m/s")));
            }
            _ => {}
        }
        if !(self.cd.is_finite() && self.cd > 0.0 && self.area().is_finite() && self.area() > 0.0) {
            return Err(malformed("drag area must be positive".into()));
        }
        Ok(())
    }
}
