use std::time::Instant;

use tracing::{debug, info, warn};

use super::branch;
use super::data::{BranchOutcome, Sample, Warning};
use super::deployment::{deploy_crossings, deployment_speed_exceeded, triggered_devices, DeployCause};
use super::event::{Action, Crossing, FlightEvent, FlightEventKind};
use super::ignition::IgnitionTrigger;
use super::integrator::{advance, bisect};
use super::options::SimulationOptions;
use super::status::{Phase, SimulationStatus};
use crate::dynamics::state::{Deriv, State};
use crate::dynamics::{AscentDynamics, DescentDynamics, Dynamics, Environment, LaunchRod, TumbleDynamics};
use crate::error::BranchError;
use crate::physics::aerodynamics::AerodynamicModel;
use crate::vehicle::component::ComponentId;
use crate::vehicle::config::{FlightConfiguration, SeparationEvent};
use crate::vehicle::rocket::Rocket;

/// Angle of attack above which a finned vehicle is considered tumbling.
const TUMBLE_AOA: f64 = 30.0 * std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// Phase dispatch
// ---------------------------------------------------------------------------

/// Force model for the branch's current phase.
pub(crate) enum PhaseDynamics<'a> {
    Ascent(AscentDynamics<'a>),
    Descent(DescentDynamics<'a>),
    Tumble(TumbleDynamics<'a>),
}

impl Dynamics for PhaseDynamics<'_> {
    fn derivatives(&self, state: &State) -> Deriv {
        match self {
            PhaseDynamics::Ascent(d) => d.derivatives(state),
            PhaseDynamics::Descent(d) => d.derivatives(state),
            PhaseDynamics::Tumble(d) => d.derivatives(state),
        }
    }

    fn mass_at(&self, time: f64) -> f64 {
        match self {
            PhaseDynamics::Ascent(d) => d.mass_at(time),
            PhaseDynamics::Descent(d) => d.mass_at(time),
            PhaseDynamics::Tumble(d) => d.mass_at(time),
        }
    }

    fn max_step(&self, state: &State) -> f64 {
        match self {
            PhaseDynamics::Ascent(d) => d.max_step(state),
            PhaseDynamics::Descent(d) => d.max_step(state),
            PhaseDynamics::Tumble(d) => d.max_step(state),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared, read-only run context
// ---------------------------------------------------------------------------

/// Everything branches of one run share. Immutable, so branches can run on
/// separate threads.
pub(crate) struct BranchContext<'a> {
    pub rocket: &'a Rocket,
    pub config: &'a FlightConfiguration,
    pub options: &'a SimulationOptions,
    pub env: Environment,
    pub aero: &'a dyn AerodynamicModel,
    pub rod: LaunchRod,
    /// Wall-clock start of the run; `max_wall_time` counts from here.
    pub started: Instant,
}

impl<'a> BranchContext<'a> {
    pub fn new(
        rocket: &'a Rocket,
        config: &'a FlightConfiguration,
        options: &'a SimulationOptions,
        aero: &'a dyn AerodynamicModel,
        started: Instant,
    ) -> Self {
        Self {
            rocket,
            config,
            options,
            env: Environment {
                atmosphere: options.atmosphere,
                wind: options.wind,
                launch_altitude: options.launch_altitude,
            },
            aero,
            rod: LaunchRod::new(options.launch_rod_length, options.launch_rod_angle, options.launch_rod_direction),
            started,
        }
    }

    pub fn dynamics<'s>(&'s self, status: &'s SimulationStatus) -> PhaseDynamics<'s> {
        match status.phase {
            Phase::Ascent => PhaseDynamics::Ascent(AscentDynamics {
                assembly: &status.assembly,
                motors: &status.motors,
                env: &self.env,
                aero: self.aero,
                rod: (!status.rod_cleared).then_some(self.rod),
            }),
            Phase::Descent => PhaseDynamics::Descent(DescentDynamics {
                assembly: &status.assembly,
                motors: &status.motors,
                env: &self.env,
                aero: self.aero,
                device_drag_area: status.deployed_drag_area(self.rocket),
            }),
            Phase::Tumble => PhaseDynamics::Tumble(TumbleDynamics {
                assembly: &status.assembly,
                motors: &status.motors,
                env: &self.env,
                aero: self.aero,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch loop
// ---------------------------------------------------------------------------

/// Runs one branch to completion, collecting the branches it forks.
pub(crate) struct BranchStepper<'c, 'a> {
    ctx: &'c BranchContext<'a>,
    forks: Vec<SimulationStatus>,
}

impl<'c, 'a> BranchStepper<'c, 'a> {
    pub fn new(ctx: &'c BranchContext<'a>) -> Self {
        Self { ctx, forks: Vec::new() }
    }

    /// Fire the launch event of the main branch.
    pub fn launch(&mut self, status: &mut SimulationStatus) {
        let ctx = self.ctx;
        let t = status.time();
        record(status, FlightEventKind::Launch, Some(ctx.rocket.root()));

        for i in 0..status.motors.len() {
            let m = &status.motors[i];
            if m.trigger == IgnitionTrigger::Launch && status.is_attached(m.stage) {
                let delay = m.delay;
                status.motors[i].ignition_scheduled = true;
                self.schedule(status, t + delay, Action::Ignition { motor: i });
            }
        }
        for stage in status.assembly.stages.clone() {
            let sep = ctx.config.separation(stage);
            if sep.event == SeparationEvent::Launch {
                self.schedule(status, t + sep.delay, Action::Separation { stage });
            }
        }
    }

    /// Step `status` until it ends; returns the forks created on the way.
    pub fn run(mut self, status: &mut SimulationStatus) -> Vec<SimulationStatus> {
        let options = self.ctx.options;
        info!(branch = %status.data.name, t = status.time(), "branch started");
        if status.data.samples().is_empty() {
            self.record_sample(status);
        }

        loop {
            if options.cancel.is_cancelled() {
                info!(branch = %status.data.name, t = status.time(), "branch cancelled");
                status.data.set_outcome(BranchOutcome::Cancelled);
                break;
            }

            while let Some(due) = status.queue.pop_due(status.time()) {
                self.fire(status, due.action);
                if status.ended {
                    break;
                }
            }
            if status.ended {
                break;
            }

            let wall_exceeded = options
                .max_wall_time
                .is_some_and(|limit| self.ctx.started.elapsed().as_secs_f64() > limit);
            if status.time() >= options.max_time || wall_exceeded {
                warn!(branch = %status.data.name, t = status.time(), "time limit reached");
                record(status, FlightEventKind::SimulationEnd, None);
                status.data.set_outcome(BranchOutcome::TimedOut);
                break;
            }

            if let Err(e) = self.step(status) {
                warn!(branch = %status.data.name, error = %e, "branch aborted");
                record(status, FlightEventKind::SimulationAbort, None);
                status.data.set_outcome(BranchOutcome::Failed(e));
                break;
            }
            if status.ended {
                break;
            }
        }

        info!(
            branch = %status.data.name,
            t = status.time(),
            samples = status.data.samples().len(),
            events = status.data.events().len(),
            "branch finished"
        );
        self.forks
    }

    /// One integration step up to the next scheduled event or crossing.
    fn step(&mut self, status: &mut SimulationStatus) -> Result<(), BranchError> {
        let ctx = self.ctx;
        let options = ctx.options;
        let now = status.time();
        let mut target = (now + options.time_step).min(options.max_time);
        if let Some(next) = status.queue.next_time() {
            target = target.min(next);
        }

        let watched = watched_crossings(ctx, status);
        let (next, hit) = {
            let dynamics = ctx.dynamics(status);
            let start = &status.state;
            let end = advance(start, &dynamics, target);
            if !end.is_finite() {
                return Err(BranchError::NumericalDivergence { time: target });
            }

            let mut earliest: Option<(State, Crossing)> = None;
            for crossing in watched {
                if !crossing_holds(ctx, &crossing, &end) {
                    continue;
                }
                let at = bisect(start, &end, &dynamics, options.event_tolerance, |s| crossing_holds(ctx, &crossing, s));
                // strict: ties go to the earlier entry in the list
                if earliest.as_ref().map_or(true, |(s, _)| at.time < s.time) {
                    earliest = Some((at, crossing));
                }
            }
            match earliest {
                Some((state, crossing)) => (state, Some(crossing)),
                None => (end, None),
            }
        };

        status.state = next;
        self.record_sample(status);
        if let Some(crossing) = hit {
            self.on_crossing(status, crossing);
        }
        self.check_tumble(status);
        Ok(())
    }

    fn record_sample(&self, status: &mut SimulationStatus) {
        let ctx = self.ctx;
        let sample = {
            let state = &status.state;
            let t = state.time;
            let d = ctx.dynamics(status).derivatives(state);
            let air_vel = ctx.env.air_velocity(state);
            let airspeed = air_vel.norm();
            let atm = ctx.env.air(state.pos.z);
            let thrust: f64 = status
                .motors
                .iter()
                .filter(|m| status.is_attached(m.stage))
                .map(|m| m.thrust_at(t))
                .sum();
            Sample {
                time: t,
                x: state.pos.x,
                y: state.pos.y,
                altitude: state.pos.z,
                vx: state.vel.x,
                vy: state.vel.y,
                vz: state.vel.z,
                airspeed,
                mach: if atm.sound_speed > 0.0 { airspeed / atm.sound_speed } else { 0.0 },
                acceleration: d.dvel.norm(),
                mass: state.mass,
                thrust,
                angle_of_attack: state.angle_of_attack(&air_vel),
            }
        };
        status.data.push_sample(sample);
    }

    // -----------------------------------------------------------------------
    // Discrete events
    // -----------------------------------------------------------------------

    /// Queue `action`, or fire it right away when it is due now.
    fn schedule(&mut self, status: &mut SimulationStatus, time: f64, action: Action) {
        if time <= status.time() {
            self.fire(status, action);
        } else {
            status.queue.push(time, action);
        }
    }

    fn fire(&mut self, status: &mut SimulationStatus, action: Action) {
        if status.ended {
            return;
        }
        match action {
            Action::Ignition { motor } => self.ignite(status, motor),
            Action::Burnout { motor } => self.burnout(status, motor),
            Action::Ejection { stage } => self.eject(status, stage),
            Action::Separation { stage } => self.separate(status, stage),
            Action::Deployment { device } => self.deploy(status, device),
        }
    }

    fn ignite(&mut self, status: &mut SimulationStatus, index: usize) {
        let ctx = self.ctx;
        let t = status.time();
        let Some(m) = status.motors.get(index) else { return };
        if !status.is_attached(m.stage) || m.ignited_at.is_some() {
            return;
        }
        let (mount, stage, burn_time) = (m.mount, m.stage, m.motor.burn_time());
        status.motors[index].ignited_at = Some(t);
        record(status, FlightEventKind::Ignition, Some(mount));
        self.schedule(status, t + burn_time, Action::Burnout { motor: index });

        let below: Vec<usize> = status
            .assembly
            .stages
            .iter()
            .copied()
            .filter(|&s| status.upper_stage(ctx.rocket, s) == Some(stage))
            .collect();
        for s in below {
            let sep = ctx.config.separation(s);
            if sep.event == SeparationEvent::UpperIgnition {
                self.schedule(status, t + sep.delay, Action::Separation { stage: s });
            }
        }
    }

    fn burnout(&mut self, status: &mut SimulationStatus, index: usize) {
        let ctx = self.ctx;
        let t = status.time();
        let Some(m) = status.motors.get(index) else { return };
        if !status.is_attached(m.stage) {
            return;
        }
        let (mount, stage, ejection) = (m.mount, m.stage, m.motor.ejection_delay);
        record(status, FlightEventKind::Burnout, Some(mount));

        if let Some(delay) = ejection {
            self.schedule(status, t + delay, Action::Ejection { stage });
        }
        self.ignite_waiting(status, IgnitionTrigger::Burnout(stage));
        let sep = ctx.config.separation(stage);
        if sep.event == SeparationEvent::Burnout {
            self.schedule(status, t + sep.delay, Action::Separation { stage });
        }
    }

    fn eject(&mut self, status: &mut SimulationStatus, stage: usize) {
        let ctx = self.ctx;
        let t = status.time();
        if !status.is_attached(stage) || !status.ejected.insert(stage) {
            return;
        }
        record(status, FlightEventKind::EjectionCharge, ctx.rocket.stage(stage));

        let sep = ctx.config.separation(stage);
        if sep.event == SeparationEvent::EjectionCharge {
            self.schedule(status, t + sep.delay, Action::Separation { stage });
        }
        self.ignite_waiting(status, IgnitionTrigger::Ejection(stage));
        self.arm_devices(status, DeployCause::Ejection(stage));
    }

    /// Schedule every attached, not yet scheduled motor waiting on `trigger`.
    fn ignite_waiting(&mut self, status: &mut SimulationStatus, trigger: IgnitionTrigger) {
        let t = status.time();
        for i in 0..status.motors.len() {
            let m = &status.motors[i];
            if m.trigger != trigger || m.ignition_scheduled || m.ignited_at.is_some() || !status.is_attached(m.stage) {
                continue;
            }
            let delay = m.delay;
            status.motors[i].ignition_scheduled = true;
            self.schedule(status, t + delay, Action::Ignition { motor: i });
        }
    }

    fn arm_devices(&mut self, status: &mut SimulationStatus, cause: DeployCause) {
        let t = status.time();
        for (device, delay) in triggered_devices(self.ctx.rocket, status, cause) {
            self.arm_device(status, device, t + delay);
        }
    }

    fn arm_device(&mut self, status: &mut SimulationStatus, device: ComponentId, time: f64) {
        if status.armed.insert(device) {
            self.schedule(status, time, Action::Deployment { device });
        }
    }

    fn separate(&mut self, status: &mut SimulationStatus, stage: usize) {
        let ctx = self.ctx;
        if !status.is_attached(stage) {
            return;
        }
        let upper = status.upper_stage(ctx.rocket, stage);
        let Some((leaving, staying)) = branch::partition(ctx.rocket, status, stage) else {
            debug!(branch = %status.data.name, stage, "separation ignored: nothing would remain");
            return;
        };
        record(status, FlightEventKind::StageSeparation, ctx.rocket.stage(stage));

        let name = ctx.rocket.stage(stage).map(|id| ctx.rocket.name_of(id).to_string()).unwrap_or_default();
        match branch::fork(ctx.rocket, status, stage, &leaving, &staying) {
            Some(child) => {
                info!(parent = %status.data.name, branch = %child.data.name, t = status.time(), "branch forked");
                self.forks.push(child);
            }
            None => {
                let warning = Warning::MasslessSeparation { stage: name, time: status.time() };
                warn!(branch = %status.data.name, "{warning}");
                status.data.push_warning(warning);
            }
        }

        if let Some(upper) = upper {
            self.arm_devices(status, DeployCause::LowerStageSeparation(upper));
        }
    }

    fn deploy(&mut self, status: &mut SimulationStatus, device: ComponentId) {
        let ctx = self.ctx;
        if !status.device_attached(ctx.rocket, device) || status.deployed.contains(&device) {
            return;
        }
        let Some(d) = ctx.rocket.component(device).and_then(|c| c.recovery_device()) else { return };
        status.deployed.push(device);
        record(status, FlightEventKind::RecoveryDeviceDeployment, Some(device));

        let airspeed = ctx.env.air_velocity(&status.state).norm();
        if deployment_speed_exceeded(d, airspeed) {
            let warning = Warning::HighDeploymentSpeed {
                device: ctx.rocket.name_of(device).to_string(),
                time: status.time(),
                speed: airspeed,
                limit: d.max_deploy_speed,
            };
            warn!(branch = %status.data.name, "{warning}");
            status.data.push_warning(warning);
        }
        status.phase = Phase::Descent;
    }

    // -----------------------------------------------------------------------
    // Continuous crossings
    // -----------------------------------------------------------------------

    fn on_crossing(&mut self, status: &mut SimulationStatus, crossing: Crossing) {
        let ctx = self.ctx;
        let t = status.time();
        match crossing {
            Crossing::Liftoff => {
                status.liftoff = true;
                record(status, FlightEventKind::Liftoff, None);
            }
            Crossing::LaunchRod => {
                status.rod_cleared = true;
                record(status, FlightEventKind::LaunchRod, None);
            }
            Crossing::DeployAltitude { device, .. } | Crossing::DeploySpeed { device, .. } => {
                let delay = ctx
                    .rocket
                    .component(device)
                    .and_then(|c| c.recovery_device())
                    .map_or(0.0, |d| d.deploy_delay);
                self.arm_device(status, device, t + delay);
            }
            Crossing::Apogee => {
                status.apogee = true;
                record(status, FlightEventKind::Apogee, Some(ctx.rocket.root()));
                self.arm_devices(status, DeployCause::Apogee);
            }
            Crossing::GroundHit => {
                record(status, FlightEventKind::GroundHit, None);
                record(status, FlightEventKind::SimulationEnd, None);
                status.data.set_outcome(BranchOutcome::Completed);
                status.ended = true;
            }
        }
    }

    /// An unpowered, unstable, undeployed vehicle falling back starts to
    /// tumble.
    fn check_tumble(&mut self, status: &mut SimulationStatus) {
        if status.ended || status.tumbling || !status.rod_cleared || status.phase != Phase::Ascent {
            return;
        }
        if status.state.vel.z >= 0.0 || !status.deployed.is_empty() || status.has_active_motor() {
            return;
        }
        let air_vel = self.ctx.env.air_velocity(&status.state);
        if status.assembly.geometry.has_fins() && status.state.angle_of_attack(&air_vel) <= TUMBLE_AOA {
            return;
        }
        status.tumbling = true;
        status.phase = Phase::Tumble;
        record(status, FlightEventKind::Tumble, None);
    }
}

fn record(status: &mut SimulationStatus, kind: FlightEventKind, source: Option<ComponentId>) {
    let t = status.time();
    debug!(branch = %status.data.name, t, event = %kind, "event");
    status.data.push_event(FlightEvent::new(kind, t, source));
}

/// Crossings that can still happen from the current state, in priority
/// order.
fn watched_crossings(ctx: &BranchContext<'_>, status: &SimulationStatus) -> Vec<Crossing> {
    let state = &status.state;
    let mut out = Vec::new();
    if !status.liftoff {
        out.push(Crossing::Liftoff);
    } else if !status.rod_cleared {
        out.push(Crossing::LaunchRod);
    }
    out.extend(deploy_crossings(ctx.rocket, status, &ctx.env));
    if status.liftoff && !status.apogee && state.vel.z > 0.0 {
        out.push(Crossing::Apogee);
    }
    if status.liftoff && state.pos.z > 0.0 {
        out.push(Crossing::GroundHit);
    }
    out
}

fn crossing_holds(ctx: &BranchContext<'_>, crossing: &Crossing, state: &State) -> bool {
    match *crossing {
        Crossing::Liftoff => state.vel.dot(&ctx.rod.direction) > 0.0,
        Crossing::LaunchRod => ctx.rod.travel(state) >= ctx.rod.length,
        Crossing::DeployAltitude { altitude, .. } => state.pos.z <= altitude,
        Crossing::DeploySpeed { speed, .. } => ctx.env.air_velocity(state).norm() <= speed,
        Crossing::Apogee => state.vel.z <= 0.0,
        Crossing::GroundHit => state.pos.z <= 0.0,
    }
}
