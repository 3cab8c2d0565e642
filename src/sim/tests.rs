//! Whole-flight scenarios over the preset vehicles.

use std::sync::Arc;

use approx::assert_relative_eq;

use super::data::{BranchOutcome, FlightData, FlightDataBranch, FlightSummary, Warning};
use super::event::FlightEventKind::{self, *};
use super::options::{CancellationToken, SimulationOptions};
use super::runner::{simulate, Simulation};
use crate::error::{BranchError, SimulationError};
use crate::physics::aerodynamics::{
    AeroCoefficients, AeroConditions, AeroGeometry, AerodynamicModel, BasicAerodynamics,
};
use crate::vehicle::component::Component;
use crate::vehicle::config::{FlightConfigurationId, MotorConfig, SeparationEvent, StageSeparation};
use crate::vehicle::motor::Motor;
use crate::vehicle::presets::{self, default_configuration};
use crate::vehicle::recovery::{DeployTrigger, RecoveryDevice};
use crate::vehicle::rocket::Rocket;

fn run(rocket: &Rocket) -> FlightData {
    simulate(rocket, &default_configuration(), &SimulationOptions::default()).unwrap()
}

fn source_names(rocket: &Rocket, branch: &FlightDataBranch, kind: FlightEventKind) -> Vec<String> {
    branch
        .events()
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.source.map(|s| rocket.name_of(s).to_string()).unwrap_or_default())
        .collect()
}

fn event_time(branch: &FlightDataBranch, kind: FlightEventKind) -> f64 {
    branch.first_event(kind).map(|e| e.time).unwrap()
}

/// Both flights agree to within 5% on every headline figure.
fn assert_summaries_match(a: &FlightSummary, b: &FlightSummary) {
    assert_relative_eq!(a.max_altitude, b.max_altitude, max_relative = 0.05);
    assert_relative_eq!(a.max_velocity, b.max_velocity, max_relative = 0.05);
    assert_relative_eq!(a.max_mach, b.max_mach, max_relative = 0.05);
    assert_relative_eq!(a.flight_time, b.flight_time, max_relative = 0.05);
    let optional = [
        (a.time_to_apogee, b.time_to_apogee),
        (a.launch_rod_velocity, b.launch_rod_velocity),
        (a.deployment_velocity, b.deployment_velocity),
    ];
    for pair in optional {
        match pair {
            (Some(x), Some(y)) => assert_relative_eq!(x, y, max_relative = 0.05),
            (x, y) => assert_eq!(x, y),
        }
    }
}

/// Alpha III airframe with custom recovery and motor.
fn single_stage(motor: Motor, recovery: Vec<Component>) -> Rocket {
    let mut r = Rocket::new("Custom");
    let s = r.add_stage("Sustainer");
    r.add(s, Component::nose_cone("Nose cone").length(0.07).radius(0.0123).mass(0.006)).unwrap();
    let body = r.add(s, Component::body_tube("Body tube").length(0.2).radius(0.0123).mass(0.010)).unwrap();
    let mount = r
        .add(body, Component::inner_tube("Motor mount").offset(0.13).length(0.07).radius(0.009).mass(0.003))
        .unwrap();
    r.add(body, Component::fin_set("Fins", 3, 0.05, 0.05).offset(0.15).mass(0.006)).unwrap();
    for device in recovery {
        r.add(body, device).unwrap();
    }
    r.create_configuration(default_configuration()).set_motor(mount, MotorConfig::new(motor));
    r
}

// ---------------------------------------------------------------------------
// Single stage
// ---------------------------------------------------------------------------

#[test]
fn single_stage_event_sequence() {
    let rocket = presets::alpha_iii().unwrap();
    let data = run(&rocket);
    assert_eq!(data.branch_count(), 1);

    let main = data.branch(0).unwrap();
    assert_eq!(main.name, "Sustainer");
    assert_eq!(*main.outcome(), BranchOutcome::Completed);
    assert_eq!(
        main.event_kinds(),
        vec![
            Launch,
            Ignition,
            Liftoff,
            LaunchRod,
            Burnout,
            EjectionCharge,
            RecoveryDeviceDeployment,
            Apogee,
            GroundHit,
            SimulationEnd,
        ]
    );

    assert_eq!(event_time(main, Launch), 0.0);
    assert_eq!(event_time(main, Ignition), 0.0);
    assert_eq!(event_time(main, Burnout), 2.0);
    assert_eq!(event_time(main, EjectionCharge), 2.0);
    assert_eq!(event_time(main, RecoveryDeviceDeployment), 2.0);
    assert!(event_time(main, Liftoff) > 0.0 && event_time(main, Liftoff) < 0.1);
    assert_eq!(event_time(main, GroundHit), event_time(main, SimulationEnd));

    assert_eq!(source_names(&rocket, main, Launch), vec!["Alpha III"]);
    assert_eq!(source_names(&rocket, main, Ignition), vec!["Motor mount"]);
    assert_eq!(source_names(&rocket, main, EjectionCharge), vec!["Sustainer"]);
    assert_eq!(source_names(&rocket, main, RecoveryDeviceDeployment), vec!["Parachute"]);
}

#[test]
fn events_and_samples_are_time_ordered() {
    let data = run(&presets::alpha_iii().unwrap());
    let main = data.branch(0).unwrap();
    assert!(main.events().windows(2).all(|w| w[0].time <= w[1].time));
    assert!(main.samples().windows(2).all(|w| w[0].time <= w[1].time));
    assert_eq!(main.samples()[0].time, 0.0);
}

#[test]
fn summary_reflects_flight() {
    let data = run(&presets::alpha_iii().unwrap());
    let s = data.summary().unwrap();
    assert!(s.max_altitude > 20.0);
    assert!(s.time_to_apogee.unwrap() > 2.0);
    assert!(s.flight_time > s.time_to_apogee.unwrap());
    assert!(s.launch_rod_velocity.unwrap() > 5.0);
    // under canopy at touchdown
    assert!(s.ground_hit_velocity.unwrap() < 10.0);
}

#[test]
fn apogee_deployment_follows_apogee() {
    let chute = Component::recovery("Parachute", RecoveryDevice::parachute(0.3, 0.8).trigger(DeployTrigger::Apogee))
        .offset(0.02)
        .mass(0.004);
    let rocket = single_stage(presets::c_motor(0.0).plugged(), vec![chute]);
    let data = run(&rocket);
    let main = data.branch(0).unwrap();
    assert_eq!(
        main.event_kinds(),
        vec![Launch, Ignition, Liftoff, LaunchRod, Burnout, Apogee, RecoveryDeviceDeployment, GroundHit, SimulationEnd]
    );
    assert_eq!(event_time(main, Apogee), event_time(main, RecoveryDeviceDeployment));
}

#[test]
fn dual_deploy_opens_main_at_altitude() {
    let drogue = Component::recovery("Drogue", RecoveryDevice::streamer(0.5, 0.05, 0.6).trigger(DeployTrigger::Apogee))
        .offset(0.02)
        .mass(0.002);
    let main_chute = Component::recovery(
        "Main",
        RecoveryDevice::parachute(0.3, 0.8).trigger(DeployTrigger::Altitude(30.0)),
    )
    .offset(0.04)
    .mass(0.004);
    let rocket = single_stage(presets::c_motor(0.0).plugged(), vec![drogue, main_chute]);
    let data = run(&rocket);
    let main = data.branch(0).unwrap();

    assert_eq!(source_names(&rocket, main, RecoveryDeviceDeployment), vec!["Drogue", "Main"]);
    let opened = main
        .events()
        .iter()
        .filter(|e| e.kind == RecoveryDeviceDeployment)
        .last()
        .unwrap();
    let sample = main.samples().iter().find(|s| s.time == opened.time).unwrap();
    assert!((sample.altitude - 30.0).abs() < 0.5, "main opened at {:.2} m", sample.altitude);
}

#[test]
fn fast_deployment_warns() {
    let chute = Component::recovery("Parachute", RecoveryDevice::parachute(0.3, 0.8).max_deploy_speed(10.0))
        .offset(0.02)
        .mass(0.004);
    let rocket = single_stage(presets::c_motor(0.0), vec![chute]);
    let data = run(&rocket);
    let warnings = data.branch(0).unwrap().warnings();
    assert!(matches!(warnings, [Warning::HighDeploymentSpeed { device, .. }] if device == "Parachute"));
}

#[test]
fn unrecovered_rocket_tumbles_or_falls() {
    let rocket = single_stage(presets::c_motor(0.0).plugged(), vec![]);
    let data = run(&rocket);
    let main = data.branch(0).unwrap();
    let kinds = main.event_kinds();
    assert!(!kinds.contains(&RecoveryDeviceDeployment));
    assert_eq!(&kinds[kinds.len() - 2..], &[GroundHit, SimulationEnd]);
}

// ---------------------------------------------------------------------------
// Multi-stage and boosters
// ---------------------------------------------------------------------------

#[test]
fn two_stage_lights_sustainer_from_booster_ejection() {
    let rocket = presets::beta().unwrap();
    let data = run(&rocket);
    assert_eq!(data.branch_count(), 2);

    let main = data.branch(0).unwrap();
    assert_eq!(source_names(&rocket, main, Ignition), vec!["Booster mount", "Sustainer mount"]);
    assert_eq!(source_names(&rocket, main, StageSeparation), vec!["Booster"]);
    // sustainer lights on the booster's ejection charge, same instant
    let ignitions: Vec<f64> = main.events().iter().filter(|e| e.kind == Ignition).map(|e| e.time).collect();
    assert_eq!(ignitions, vec![0.0, 0.9]);
    assert_eq!(event_time(main, StageSeparation), 0.9);

    let booster = data.branch(1).unwrap();
    assert_eq!(booster.name, "Booster");
    assert_eq!(&booster.event_kinds()[..4], &[Ignition, Burnout, EjectionCharge, StageSeparation]);
}

#[test]
fn heavy_forks_core_and_boosters() {
    let rocket = presets::heavy().unwrap();
    let data = run(&rocket);
    let names: Vec<&str> = data.branches().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Payload", "Core", "Boosters"]);

    let main = data.branch(0).unwrap();
    assert_eq!(
        &main.event_kinds()[..11],
        &[
            Launch,
            Ignition,
            Ignition,
            Liftoff,
            LaunchRod,
            Burnout,
            EjectionCharge,
            StageSeparation,
            Burnout,
            EjectionCharge,
            StageSeparation,
        ]
    );
    assert_eq!(source_names(&rocket, main, Ignition), vec!["Booster motor tube", "Core body"]);
    assert_eq!(source_names(&rocket, main, StageSeparation), vec!["Boosters", "Core"]);
    let kinds = main.event_kinds();
    assert_eq!(&kinds[kinds.len() - 2..], &[GroundHit, SimulationEnd]);

    for (branch, mount, stage) in [(1, "Core body", "Core"), (2, "Booster motor tube", "Boosters")] {
        let child = data.branch(branch).unwrap();
        let kinds = child.event_kinds();
        assert_eq!(&kinds[..4], &[Ignition, Burnout, EjectionCharge, StageSeparation]);
        assert!(!kinds.contains(&Launch) && !kinds.contains(&Liftoff));
        assert_eq!(&kinds[kinds.len() - 2..], &[GroundHit, SimulationEnd]);
        assert_eq!(source_names(&rocket, child, Ignition), vec![mount]);
        assert_eq!(source_names(&rocket, child, StageSeparation), vec![stage]);
        assert_eq!(child.samples()[0].time, 2.0);
    }
}

#[test]
fn separation_sheds_mass() {
    let data = run(&presets::heavy().unwrap());
    let main = data.branch(0).unwrap();
    let before = main.samples().iter().filter(|s| s.time < 2.0).last().unwrap();
    let after = main.samples().iter().find(|s| s.time > 2.0).unwrap();
    assert!(after.mass < 0.5 * before.mass);
}

// ---------------------------------------------------------------------------
// Stage activation
// ---------------------------------------------------------------------------

#[test]
fn disabled_stage_matches_removed_stage() {
    let mut disabled = presets::beta().unwrap();
    disabled
        .configuration_mut(&default_configuration())
        .unwrap()
        .set_stage_active(1, false)
        .unwrap();
    let mut removed = presets::beta().unwrap();
    removed.remove_stage(1).unwrap();

    let a = run(&disabled);
    let b = run(&removed);
    assert_eq!(a.branch_count(), 1);
    assert_eq!(b.branch_count(), 1);
    let (sa, sb) = (a.summary().unwrap(), b.summary().unwrap());
    assert!(sa.deployment_velocity.is_some());
    assert_summaries_match(&sa, &sb);
}

#[test]
fn disabled_boosters_match_removed_boosters() {
    let mut disabled = presets::heavy().unwrap();
    disabled
        .configuration_mut(&default_configuration())
        .unwrap()
        .set_stage_active(2, false)
        .unwrap();
    let mut removed = presets::heavy().unwrap();
    removed.remove_stage(2).unwrap();

    let a = run(&disabled);
    let b = run(&removed);
    assert_eq!(a.branch_count(), 2);
    assert_eq!(b.branch_count(), 2);
    assert_summaries_match(&a.summary().unwrap(), &b.summary().unwrap());
}

#[test]
fn disabling_every_stage_leaves_nothing_to_ignite() {
    let reference = run(&presets::alpha_iii().unwrap());

    let mut rocket = presets::alpha_iii().unwrap();
    rocket
        .configuration_mut(&default_configuration())
        .unwrap()
        .set_stage_active(0, false)
        .unwrap();
    let err = simulate(&rocket, &default_configuration(), &SimulationOptions::default()).unwrap_err();
    assert_eq!(err, SimulationError::NoActiveMotor(default_configuration()));

    rocket.configuration_mut(&default_configuration()).unwrap().set_all_stages();
    let data = run(&rocket);
    assert_eq!(data.branch_count(), reference.branch_count());
    for (a, b) in data.branches().iter().zip(reference.branches()) {
        assert_eq!(a.events(), b.events());
        assert_eq!(a.samples(), b.samples());
    }
}

#[test]
fn rocket_without_stages_is_empty() {
    let mut rocket = Rocket::new("Empty");
    rocket.create_configuration(default_configuration());
    let err = simulate(&rocket, &default_configuration(), &SimulationOptions::default()).unwrap_err();
    assert_eq!(err, SimulationError::EmptyTopology);
}

#[test]
fn removing_core_leaves_nothing_to_ignite() {
    let mut rocket = presets::heavy().unwrap();
    rocket.remove_stage(1).unwrap();
    let err = simulate(&rocket, &default_configuration(), &SimulationOptions::default()).unwrap_err();
    assert_eq!(err, SimulationError::NoActiveMotor(default_configuration()));
}

#[test]
fn boosters_fly_with_core_disabled() {
    let mut rocket = presets::heavy().unwrap();
    rocket
        .configuration_mut(&default_configuration())
        .unwrap()
        .set_stage_active(1, false)
        .unwrap();
    let data = run(&rocket);
    assert_eq!(data.branch_count(), 2);
    assert_eq!(source_names(&rocket, data.branch(0).unwrap(), Ignition), vec!["Booster motor tube"]);
}

#[test]
fn only_booster_stage() {
    let mut rocket = presets::heavy().unwrap();
    let config = rocket.configuration_mut(&default_configuration()).unwrap();
    config.set_only_stage(2).unwrap();
    assert_eq!(rocket.topmost_stage(rocket.configuration(&default_configuration()).unwrap()), Some(2));

    let data = run(&rocket);
    assert_eq!(data.branch_count(), 1);
    let main = data.branch(0).unwrap();
    assert_eq!(main.name, "Boosters");
    assert!(!main.event_kinds().contains(&StageSeparation));
}

#[test]
fn reactivation_is_idempotent() {
    let mut rocket = presets::heavy().unwrap();
    let first = run(&rocket);

    let config = rocket.configuration_mut(&default_configuration()).unwrap();
    config.set_stage_active(2, false).unwrap();
    config.set_stage_active(2, true).unwrap();
    let second = run(&rocket);

    assert_eq!(first.branch_count(), second.branch_count());
    for (a, b) in first.branches().iter().zip(second.branches()) {
        assert_eq!(a.events(), b.events());
    }
}

#[test]
fn no_motor_is_fatal() {
    let mut rocket = presets::alpha_iii().unwrap();
    let id = FlightConfigurationId::new("empty");
    rocket.create_configuration(id.clone());
    assert_eq!(
        simulate(&rocket, &id, &SimulationOptions::default()).unwrap_err(),
        SimulationError::NoActiveMotor(id)
    );
}

#[test]
fn unknown_configuration() {
    let rocket = presets::alpha_iii().unwrap();
    let id = FlightConfigurationId::new("missing");
    assert_eq!(
        simulate(&rocket, &id, &SimulationOptions::default()).unwrap_err(),
        SimulationError::UnknownConfiguration(id)
    );
}

#[test]
fn massless_separation_warns_without_branch() {
    let mut rocket = presets::alpha_iii().unwrap();
    let spacer = rocket.add_stage("Spacer");
    rocket.add(spacer, Component::body_tube("Spacer tube").length(0.05).radius(0.0123)).unwrap();
    rocket
        .configuration_mut(&default_configuration())
        .unwrap()
        .set_separation(1, StageSeparation { event: SeparationEvent::Launch, delay: 0.5 })
        .unwrap();

    let data = run(&rocket);
    assert_eq!(data.branch_count(), 1);
    let main = data.branch(0).unwrap();
    assert_eq!(event_time(main, StageSeparation), 0.5);
    assert!(matches!(main.warnings(), [Warning::MasslessSeparation { stage, .. }] if stage == "Spacer"));
}

// ---------------------------------------------------------------------------
// Run control
// ---------------------------------------------------------------------------

#[test]
fn runs_are_deterministic() {
    let rocket = presets::heavy().unwrap();
    let a = run(&rocket);
    let b = run(&rocket);
    for (x, y) in a.branches().iter().zip(b.branches()) {
        assert_eq!(x.events(), y.events());
        assert_eq!(x.samples(), y.samples());
    }
}

#[test]
fn parallel_branches_match_sequential() {
    let rocket = presets::heavy().unwrap();
    let sequential = run(&rocket);
    let options = SimulationOptions::default().parallel_branches(true);
    let parallel = simulate(&rocket, &default_configuration(), &options).unwrap();
    assert_eq!(sequential.branch_count(), parallel.branch_count());
    for (x, y) in sequential.branches().iter().zip(parallel.branches()) {
        assert_eq!(x.name, y.name);
        assert_eq!(x.events(), y.events());
    }
}

#[test]
fn cancelled_run_keeps_partial_data() {
    let rocket = presets::alpha_iii().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let options = SimulationOptions::default().cancel_token(token);
    let data = Simulation::new(&rocket, default_configuration()).with_options(options).run().unwrap();

    assert!(data.is_cancelled());
    let main = data.branch(0).unwrap();
    assert_eq!(*main.outcome(), BranchOutcome::Cancelled);
    assert_eq!(main.event_kinds(), vec![Launch, Ignition]);
}

#[test]
fn time_limit_ends_branch() {
    let rocket = presets::alpha_iii().unwrap();
    let options = SimulationOptions::default().max_time(0.5);
    let data = simulate(&rocket, &default_configuration(), &options).unwrap();
    let main = data.branch(0).unwrap();
    assert_eq!(*main.outcome(), BranchOutcome::TimedOut);
    let last = main.events().last().unwrap();
    assert_eq!(last.kind, SimulationEnd);
    assert_eq!(last.time, 0.5);
}

/// Basic coefficients, except that an assembly without a nose cone diverges.
struct NoselessDiverges;

impl AerodynamicModel for NoselessDiverges {
    fn coefficients(&self, geometry: &AeroGeometry, conditions: &AeroConditions) -> AeroCoefficients {
        let mut c = BasicAerodynamics.coefficients(geometry, conditions);
        if geometry.nose_length.is_none() {
            c.cd = f64::NAN;
        }
        c
    }
}

#[test]
fn divergence_fails_only_its_own_branch() {
    let rocket = presets::heavy().unwrap();
    let data = Simulation::new(&rocket, default_configuration())
        .with_aerodynamics(Arc::new(NoselessDiverges))
        .run()
        .unwrap();

    let names: Vec<&str> = data.branches().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["Payload", "Core", "Boosters"]);

    let core = data.branch(1).unwrap();
    assert!(matches!(core.outcome(), BranchOutcome::Failed(BranchError::NumericalDivergence { .. })));
    assert_eq!(core.events().last().unwrap().kind, SimulationAbort);
    assert!(!core.samples().is_empty());
    assert!(core.event_kinds().contains(&StageSeparation));

    for sibling in [data.branch(0).unwrap(), data.branch(2).unwrap()] {
        assert_eq!(*sibling.outcome(), BranchOutcome::Completed);
        assert_eq!(sibling.events().last().unwrap().kind, SimulationEnd);
    }
}

#[test]
fn invalid_options_rejected() {
    let rocket = presets::alpha_iii().unwrap();
    let options = SimulationOptions::default().event_tolerance(0.1);
    assert!(matches!(
        simulate(&rocket, &default_configuration(), &options),
        Err(SimulationError::InvalidOptions(_))
    ));
}
