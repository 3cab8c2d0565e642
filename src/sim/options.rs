use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};
use crate::physics::atmosphere::Atmosphere;
use crate::physics::wind::WindModel;

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

/// Per-run settings. Every field has a default, so a YAML file only needs
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    pub time_step: f64,        // s, nominal RK4 step
    pub max_time: f64,         // s, simulated-time cutoff per branch
    pub event_tolerance: f64,  // s, bisection resolution for crossing events
    pub atmosphere: Atmosphere,
    pub launch_rod_length: f64,    // m
    pub launch_rod_angle: f64,     // rad from vertical
    pub launch_rod_direction: f64, // rad, azimuth the rod leans towards
    pub launch_altitude: f64,      // m above mean sea level
    pub wind: WindModel,
    pub max_wall_time: Option<f64>, // s of wall-clock time for the whole run
    pub parallel_branches: bool,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            max_time: 1200.0,
            event_tolerance: 1e-4,
            atmosphere: Atmosphere::Isa,
            launch_rod_length: 1.0,
            launch_rod_angle: 0.0,
            launch_rod_direction: 0.0,
            launch_altitude: 0.0,
            wind: WindModel::calm(),
            max_wall_time: None,
            parallel_branches: false,
            cancel: CancellationToken::new(),
        }
    }
}

impl SimulationOptions {
    pub fn time_step(mut self, v: f64) -> Self { self.time_step = v; self }
    pub fn max_time(mut self, v: f64) -> Self { self.max_time = v; self }
    pub fn event_tolerance(mut self, v: f64) -> Self { self.event_tolerance = v; self }
    pub fn atmosphere(mut self, v: Atmosphere) -> Self { self.atmosphere = v; self }
    pub fn launch_rod(mut self, length: f64, angle: f64, direction: f64) -> Self {
        self.launch_rod_length = length;
        self.launch_rod_angle = angle;
        self.launch_rod_direction = direction;
        self
    }
    pub fn launch_altitude(mut self, v: f64) -> Self { self.launch_altitude = v; self }
    pub fn wind(mut self, v: WindModel) -> Self { self.wind = v; self }
    pub fn max_wall_time(mut self, v: f64) -> Self { self.max_wall_time = Some(v); self }
    pub fn parallel_branches(mut self, v: bool) -> Self { self.parallel_branches = v; self }
    pub fn cancel_token(mut self, v: CancellationToken) -> Self { self.cancel = v; self }

    /// Load options from a YAML file; missing fields keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimulationError::OptionsLoad(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let options: Self =
            serde_yaml::from_str(text).map_err(|e| SimulationError::OptionsLoad(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimulationError::InvalidOptions(msg));
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return invalid(format!("time_step {} must be > 0", self.time_step));
        }
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return invalid(format!("max_time {} must be > 0", self.max_time));
        }
        if !(self.event_tolerance > 0.0 && self.event_tolerance < self.time_step) {
            return invalid(format!(
                "event_tolerance {} must be > 0 and below time_step {}",
                self.event_tolerance, self.time_step
            ));
        }
        if !(self.launch_rod_length.is_finite() && self.launch_rod_length >= 0.0) {
            return invalid(format!("launch_rod_length {} must be >= 0", self.launch_rod_length));
        }
        if !(self.launch_rod_angle.abs() < std::f64::consts::FRAC_PI_2) {
            return invalid(format!("launch_rod_angle {} must be within ±90°", self.launch_rod_angle));
        }
        if !self.launch_rod_direction.is_finite() || !self.launch_altitude.is_finite() {
            return invalid("launch site direction and altitude must be finite".into());
        }
        if let Some(wall) = self.max_wall_time {
            if !(wall > 0.0) {
                return invalid(format!("max_wall_time {wall} must be > 0"));
            }
        }
        self.atmosphere.validate().map_err(SimulationError::InvalidOptions)?;
        self.wind.validate().map_err(SimulationError::InvalidOptions)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cooperative cancellation
// ---------------------------------------------------------------------------

/// Shared flag checked by every branch at each step.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
