use super::component::Component;
use super::config::{FlightConfigurationId, MotorConfig};
use super::motor::Motor;
use super::recovery::RecoveryDevice;
use super::rocket::Rocket;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Preset vehicles
// ---------------------------------------------------------------------------

/// Id of the configuration every preset creates.
pub const DEFAULT_CONFIGURATION: &str = "default";

pub fn default_configuration() -> FlightConfigurationId {
    FlightConfigurationId::new(DEFAULT_CONFIGURATION)
}

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 3] = ["alpha", "beta", "heavy"];

pub fn by_name(name: &str) -> Option<Result<Rocket>> {
    match name {
        "alpha" => Some(alpha_iii()),
        "beta" => Some(beta()),
        "heavy" => Some(heavy()),
        _ => None,
    }
}

// --- motors ---------------------------------------------------------------

/// Small C-class motor, 2 s burn.
pub fn c_motor(ejection_delay: f64) -> Motor {
    Motor::new(
        "C6",
        vec![(0.0, 0.0), (0.1, 5.0), (0.2, 12.0), (0.3, 6.0), (1.8, 4.5), (2.0, 0.0)],
        0.0108,
        0.0132,
    )
    .ejection_delay(ejection_delay)
}

/// Short, punchy booster motor.
pub fn b_booster_motor() -> Motor {
    Motor::new(
        "B6-0",
        vec![(0.0, 0.0), (0.1, 10.0), (0.25, 12.0), (0.35, 5.0), (0.8, 4.0), (0.9, 0.0)],
        0.0056,
        0.0144,
    )
    .ejection_delay(0.0)
}

fn core_motor() -> Motor {
    Motor::new("E30-0", vec![(0.0, 0.0), (0.05, 30.0), (0.2, 25.0), (1.8, 20.0), (2.0, 0.0)], 0.04, 0.05)
        .ejection_delay(0.0)
}

fn strap_on_motor() -> Motor {
    Motor::new("D20-0", vec![(0.0, 0.0), (0.05, 20.0), (0.2, 15.0), (1.8, 12.0), (2.0, 0.0)], 0.025, 0.03)
        .ejection_delay(0.0)
}

// --- vehicles -------------------------------------------------------------

/// Single-stage sport rocket with a parachute opened by the motor's
/// ejection charge.
pub fn alpha_iii() -> Result<Rocket> {
    let mut r = Rocket::new("Alpha III");
    let s = r.add_stage("Sustainer");
    r.add(s, Component::nose_cone("Nose cone").length(0.07).radius(0.0123).mass(0.006))?;
    let body = r.add(s, Component::body_tube("Body tube").length(0.2).radius(0.0123).mass(0.010))?;
    let mount = r.add(
        body,
        Component::inner_tube("Motor mount").offset(0.13).length(0.07).radius(0.009).mass(0.003),
    )?;
    r.add(body, Component::fin_set("Fins", 3, 0.05, 0.05).offset(0.15).mass(0.006))?;
    r.add(body, Component::recovery("Parachute", RecoveryDevice::parachute(0.3, 0.8)).offset(0.02).mass(0.004))?;

    let config = r.create_configuration(default_configuration());
    config.set_motor(mount, MotorConfig::new(c_motor(0.0)));
    Ok(r)
}

/// Two-stage rocket: a booster lights the sustainer through its ejection
/// charge.
pub fn beta() -> Result<Rocket> {
    let mut r = Rocket::new("Beta");
    let s0 = r.add_stage("Sustainer");
    r.add(s0, Component::nose_cone("Nose cone").length(0.08).radius(0.0123).mass(0.007))?;
    let body = r.add(s0, Component::body_tube("Sustainer body").length(0.25).radius(0.0123).mass(0.012))?;
    let upper_mount = r.add(
        body,
        Component::inner_tube("Sustainer mount").offset(0.18).length(0.07).radius(0.009).mass(0.003),
    )?;
    r.add(body, Component::fin_set("Sustainer fins", 3, 0.05, 0.05).offset(0.2).mass(0.006))?;
    r.add(body, Component::recovery("Parachute", RecoveryDevice::parachute(0.3, 0.8)).offset(0.02).mass(0.004))?;

    let s1 = r.add_stage("Booster");
    let booster = r.add(s1, Component::body_tube("Booster body").length(0.1).radius(0.0123).mass(0.006))?;
    let lower_mount = r.add(
        booster,
        Component::inner_tube("Booster mount").offset(0.03).length(0.07).radius(0.009).mass(0.003),
    )?;
    r.add(booster, Component::fin_set("Booster fins", 3, 0.055, 0.06).offset(0.04).mass(0.007))?;

    let config = r.create_configuration(default_configuration());
    config.set_motor(upper_mount, MotorConfig::new(c_motor(3.0)));
    config.set_motor(lower_mount, MotorConfig::new(b_booster_motor()));
    Ok(r)
}

/// Core stage with a payload section and two strap-on boosters.
pub fn heavy() -> Result<Rocket> {
    let mut r = Rocket::new("Heavy");
    let payload = r.add_stage("Payload");
    r.add(payload, Component::nose_cone("Payload fairing").length(0.15).radius(0.025).mass(0.03))?;
    r.add(payload, Component::body_tube("Payload body").length(0.25).radius(0.025).mass(0.04))?;

    let core = r.add_stage("Core");
    let core_body = r.add(core, Component::body_tube("Core body").length(0.5).radius(0.025).mass(0.08))?;
    r.add(core_body, Component::fin_set("Core fins", 4, 0.05, 0.08).offset(0.42).mass(0.02))?;

    let boosters = r.add_parallel_stage(core_body, "Boosters", 2, 0.045, 0.2)?;
    r.add(boosters, Component::nose_cone("Booster nose").length(0.06).radius(0.02).mass(0.008))?;
    let booster_body = r.add(boosters, Component::body_tube("Booster body").length(0.25).radius(0.02).mass(0.03))?;
    let booster_mount = r.add(
        booster_body,
        Component::inner_tube("Booster motor tube").offset(0.15).length(0.1).radius(0.012).mass(0.005),
    )?;

    let config = r.create_configuration(default_configuration());
    config.set_motor(core_body, MotorConfig::new(core_motor()));
    config.set_motor(booster_mount, MotorConfig::new(strap_on_motor()));
    Ok(r)
}
