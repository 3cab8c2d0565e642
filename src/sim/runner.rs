use std::sync::Arc;
use std::time::Instant;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{info, warn};

use super::branch::run_branches;
use super::data::{FlightData, Warning};
use super::ignition::{ignition_reachable, resolve_motors, IgnitionTrigger};
use super::options::SimulationOptions;
use super::status::SimulationStatus;
use super::stepper::BranchContext;
use crate::dynamics::state::State;
use crate::error::{Result, SimulationError};
use crate::physics::aerodynamics::{AerodynamicModel, BasicAerodynamics};
use crate::vehicle::assembly::Assembly;
use crate::vehicle::config::FlightConfigurationId;
use crate::vehicle::rocket::Rocket;

// ---------------------------------------------------------------------------
// Simulation entry point
// ---------------------------------------------------------------------------

/// One run of a rocket in one flight configuration.
///
/// The rocket and its configuration are snapshotted when [`run`] starts;
/// the run never writes back to either.
///
/// [`run`]: Simulation::run
pub struct Simulation<'a> {
    rocket: &'a Rocket,
    configuration: FlightConfigurationId,
    options: SimulationOptions,
    aero: Arc<dyn AerodynamicModel>,
}

impl<'a> Simulation<'a> {
    pub fn new(rocket: &'a Rocket, configuration: FlightConfigurationId) -> Self {
        Self {
            rocket,
            configuration,
            options: SimulationOptions::default(),
            aero: Arc::new(BasicAerodynamics),
        }
    }

    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_aerodynamics(mut self, aero: Arc<dyn AerodynamicModel>) -> Self {
        self.aero = aero;
        self
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Fly every branch to completion.
    ///
    /// Fails before any integration when the configuration is unknown, the
    /// rocket has no stage, a motor or trigger is malformed, or no motor can
    /// ever ignite (which includes every stage being inactive). Failures
    /// after launch stay inside their branch.
    pub fn run(&self) -> Result<FlightData> {
        let started = Instant::now();
        self.options.validate()?;
        let rocket = self.rocket.clone();
        let config = rocket
            .configuration(&self.configuration)
            .cloned()
            .ok_or_else(|| SimulationError::UnknownConfiguration(self.configuration.clone()))?;

        if rocket.stage_count() == 0 {
            return Err(SimulationError::EmptyTopology);
        }
        let stages = config.active_stages();
        let Some(&top) = stages.first() else {
            return Err(SimulationError::NoActiveMotor(config.id.clone()));
        };
        for device in rocket.recovery_devices() {
            let active = rocket.stage_index_of(device).is_some_and(|s| config.is_stage_active(s));
            if let Some(d) = rocket.component(device).and_then(|c| c.recovery_device()).filter(|_| active) {
                d.validate(rocket.name_of(device))?;
            }
        }

        let motors = resolve_motors(&rocket, &config)?;
        let mut warnings = Vec::new();
        for (m, lit) in motors.iter().zip(ignition_reachable(&motors)) {
            if !lit && m.trigger != IgnitionTrigger::Never {
                let warning = Warning::UnreachableIgnition { mount: rocket.name_of(m.mount).to_string() };
                warn!("{warning}");
                warnings.push(warning);
            }
        }

        let ctx = BranchContext::new(&rocket, &config, &self.options, self.aero.as_ref(), started);
        let assembly = Assembly::new(&rocket, &stages);
        let attitude = UnitQuaternion::rotation_between(&Vector3::z(), &ctx.rod.direction)
            .unwrap_or_else(UnitQuaternion::identity);
        let mass = assembly.mass_properties(&motors, 0.0).mass;
        let name = rocket.stage(top).map(|id| rocket.name_of(id).to_string()).unwrap_or_default();
        let root = SimulationStatus::new(name, State::at_rest(attitude, mass), assembly, motors);

        info!(
            rocket = %rocket.name,
            configuration = %config.id,
            stages = stages.len(),
            aerodynamics = self.aero.name(),
            "simulation started"
        );
        let branches = run_branches(&ctx, root);
        info!(branches = branches.len(), "simulation finished");

        Ok(FlightData::new(rocket.name.clone(), config.id.to_string(), branches, warnings))
    }
}

/// Run `configuration` of `rocket` with the default aerodynamic model.
pub fn simulate(rocket: &Rocket, configuration: &FlightConfigurationId, options: &SimulationOptions) -> Result<FlightData> {
    Simulation::new(rocket, configuration.clone())
        .with_options(options.clone())
        .run()
}
