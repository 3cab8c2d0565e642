use std::f64::consts::PI;

use super::component::{ComponentId, ComponentKind};
use super::rocket::Rocket;
use crate::physics::aerodynamics::{AeroGeometry, FinGeometry};
use crate::sim::ignition::MotorInstance;

// ---------------------------------------------------------------------------
// Assembly: the stages currently flying together
// ---------------------------------------------------------------------------

/// Structural mass properties and aerodynamic geometry of a set of stages.
/// Axial positions are absolute (m aft of the rocket's nose tip) unless a
/// field says otherwise.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub stages: Vec<usize>,
    pub top: f64,
    pub length: f64,
    pub structure_mass: f64,    // kg, motors excluded
    pub structure_cg: f64,      // m, absolute
    pub structure_inertia: (f64, f64), // (pitch/yaw about structure CG, roll), kg·m^2
    /// Geometry with positions relative to `top`.
    pub geometry: AeroGeometry,
    pub recovery_devices: Vec<ComponentId>,
}

/// Total mass properties at an instant, motors included.
#[derive(Debug, Clone, Copy)]
pub struct MassProperties {
    pub mass: f64,
    pub cg: f64, // m, absolute
    pub inertia_long: f64,
    pub inertia_roll: f64,
}

impl Assembly {
    /// Build from the given stage indices (order does not matter).
    pub fn new(rocket: &Rocket, stages: &[usize]) -> Self {
        let mut stages = stages.to_vec();
        stages.sort_unstable();
        stages.dedup();

        let parts: Vec<ComponentId> = stages
            .iter()
            .flat_map(|&s| rocket.stage_components(s))
            .collect();

        // --- extent ---
        let mut top = f64::INFINITY;
        let mut bottom = f64::NEG_INFINITY;
        for &id in &parts {
            let Some(c) = rocket.component(id) else { continue };
            if c.kind.is_body() {
                let p = rocket.absolute_position(id);
                top = top.min(p);
                bottom = bottom.max(p + c.length);
            }
        }
        if !top.is_finite() {
            top = parts.iter().map(|id| rocket.absolute_position(*id)).fold(f64::INFINITY, f64::min);
            bottom = top;
        }
        if !top.is_finite() {
            top = 0.0;
            bottom = 0.0;
        }
        let length = (bottom - top).max(0.0);

        // --- mass and CG ---
        let mut mass = 0.0;
        let mut moment = 0.0;
        for &id in &parts {
            let Some(c) = rocket.component(id) else { continue };
            let m = c.mass * rocket.multiplicity(id) as f64;
            mass += m;
            moment += m * (rocket.absolute_position(id) + 0.5 * c.length);
        }
        let cg = if mass > 0.0 { moment / mass } else { top + 0.5 * length };

        // --- inertia: each part as a solid cylinder, shifted to the CG ---
        let mut i_long = 0.0;
        let mut i_roll = 0.0;
        for &id in &parts {
            let Some(c) = rocket.component(id) else { continue };
            let m = c.mass * rocket.multiplicity(id) as f64;
            let r = c.radius;
            let d = rocket.absolute_position(id) + 0.5 * c.length - cg;
            let radial = rocket.radial_offset(id);
            i_long += m * (3.0 * r * r + c.length * c.length) / 12.0 + m * (d * d + radial * radial);
            i_roll += 0.5 * m * r * r + m * radial * radial;
        }

        let geometry = geometry(rocket, &stages, &parts, top, length);
        let recovery_devices = parts
            .iter()
            .copied()
            .filter(|id| rocket.component(*id).is_some_and(|c| c.recovery_device().is_some()))
            .collect();

        Self {
            stages,
            top,
            length,
            structure_mass: mass,
            structure_cg: cg,
            structure_inertia: (i_long, i_roll),
            geometry,
            recovery_devices,
        }
    }

    pub fn contains_stage(&self, stage: usize) -> bool {
        self.stages.binary_search(&stage).is_ok()
    }

    /// Combine structure and motors at time `t`; motors are point masses.
    pub fn mass_properties(&self, motors: &[MotorInstance], t: f64) -> MassProperties {
        let mut mass = self.structure_mass;
        let mut moment = self.structure_mass * self.structure_cg;
        for m in motors.iter().filter(|m| self.contains_stage(m.stage)) {
            let mm = m.mass_at(t);
            mass += mm;
            moment += mm * m.position;
        }
        let cg = if mass > 0.0 { moment / mass } else { self.structure_cg };

        let shift = self.structure_cg - cg;
        let (i_long0, i_roll0) = self.structure_inertia;
        let mut inertia_long = i_long0 + self.structure_mass * shift * shift;
        let mut inertia_roll = i_roll0;
        for m in motors.iter().filter(|m| self.contains_stage(m.stage)) {
            let mm = m.mass_at(t);
            let d = m.position - cg;
            inertia_long += mm * (d * d + m.radial * m.radial);
            inertia_roll += mm * m.radial * m.radial;
        }

        MassProperties {
            mass,
            cg,
            inertia_long: inertia_long.max(1e-9),
            inertia_roll: inertia_roll.max(1e-9),
        }
    }
}

fn geometry(rocket: &Rocket, stages: &[usize], parts: &[ComponentId], top: f64, length: f64) -> AeroGeometry {
    // Frontal area: the axial stack plus each booster's own cross-section.
    let mut axial_radius: f64 = 0.0;
    let mut booster_area = 0.0;
    let mut booster_radius: f64 = 0.0;
    for &stage in stages {
        let max_r = rocket
            .stage_components(stage)
            .iter()
            .filter_map(|id| rocket.component(*id))
            .filter(|c| c.kind.is_body())
            .map(|c| c.radius)
            .fold(0.0, f64::max);
        if rocket.is_parallel(stage) {
            let count = rocket.stage(stage).map(|id| rocket.multiplicity(id)).unwrap_or(1);
            booster_area += count as f64 * PI * max_r * max_r;
            booster_radius = booster_radius.max(max_r);
        } else {
            axial_radius = axial_radius.max(max_r);
        }
    }
    let reference_area = PI * axial_radius * axial_radius + booster_area;
    let reference_length = 2.0 * if axial_radius > 0.0 { axial_radius } else { booster_radius };

    let mut nose_length = None;
    let mut nose_top = f64::INFINITY;
    let mut side_area = 0.0;
    let mut fins = Vec::new();
    for &id in parts {
        let Some(c) = rocket.component(id) else { continue };
        let pos = rocket.absolute_position(id);
        let n = rocket.multiplicity(id);
        match c.kind {
            ComponentKind::NoseCone | ComponentKind::BodyTube => {
                side_area += n as f64 * 2.0 * c.radius * c.length;
                if pos < nose_top {
                    nose_top = pos;
                    nose_length = matches!(c.kind, ComponentKind::NoseCone).then_some(c.length);
                }
            }
            ComponentKind::FinSet { count, span, root_chord } => {
                let body_radius = c
                    .parent()
                    .and_then(|p| rocket.component(p))
                    .map(|p| p.radius)
                    .unwrap_or(0.0);
                fins.push(FinGeometry {
                    count: count * n,
                    span,
                    root_chord,
                    position: pos - top,
                    body_radius,
                });
            }
            _ => {}
        }
    }

    AeroGeometry {
        reference_area,
        reference_length,
        length,
        nose_length,
        side_area,
        fins,
    }
}
