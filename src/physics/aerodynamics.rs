use nalgebra::Vector3;

use crate::physics::atmosphere::Atmo;

// ---------------------------------------------------------------------------
// Force model seam
// ---------------------------------------------------------------------------

/// One fin set, positions measured from the top of the flying assembly.
#[derive(Debug, Clone, Copy)]
pub struct FinGeometry {
    pub count: u32,
    pub span: f64,       // m
    pub root_chord: f64, // m
    pub position: f64,   // m, leading edge of the root chord
    pub body_radius: f64,
}

impl FinGeometry {
    /// Planform area of the whole set, assuming a half-length tip chord.
    pub fn planform_area(&self) -> f64 {
        self.count as f64 * self.span * self.root_chord * 0.75
    }
}

/// Aerodynamic description of whatever is currently flying together.
#[derive(Debug, Clone, Default)]
pub struct AeroGeometry {
    pub reference_area: f64,   // m^2
    pub reference_length: f64, // m, body diameter
    pub length: f64,           // m, top to bottom
    pub nose_length: Option<f64>,
    pub side_area: f64,        // m^2, projected side profile of all bodies
    pub fins: Vec<FinGeometry>,
}

impl AeroGeometry {
    pub fn has_fins(&self) -> bool {
        self.fins.iter().any(|f| f.count > 0 && f.span > 0.0)
    }
}

/// Flight conditions handed to an aerodynamic model.
#[derive(Debug, Clone, Copy)]
pub struct AeroConditions {
    pub mach: f64,
    pub airspeed: f64,        // m/s
    pub angle_of_attack: f64, // rad
}

/// Coefficients returned by an aerodynamic model, all relative to
/// `AeroGeometry::reference_area`.
#[derive(Debug, Clone, Copy)]
pub struct AeroCoefficients {
    pub cd: f64,
    pub cn_alpha: f64, // per rad
    pub cp: f64,       // m from top of the assembly
}

/// Injectable aerodynamic model. The simulation never derives coefficients
/// itself; it asks this trait.
pub trait AerodynamicModel: Send + Sync {
    fn coefficients(&self, geometry: &AeroGeometry, conditions: &AeroConditions) -> AeroCoefficients;

    /// Drag area (Cd * A, m^2) of the assembly tumbling broadside.
    fn tumble_drag_area(&self, geometry: &AeroGeometry) -> f64 {
        let fins: f64 = geometry.fins.iter().map(|f| f.planform_area()).sum();
        0.56 * geometry.side_area + 1.28 * fins
    }

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Slender-body estimate: nose and fin normal-force slopes after Barrowman,
/// friction from fineness ratio, a flat transonic drag rise.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAerodynamics;

impl AerodynamicModel for BasicAerodynamics {
    fn coefficients(&self, geometry: &AeroGeometry, conditions: &AeroConditions) -> AeroCoefficients {
        let d = geometry.reference_length.max(1e-6);
        let a_ref = geometry.reference_area.max(1e-9);

        let pressure = if geometry.nose_length.is_some() { 0.10 } else { 0.50 };
        let friction = 0.012 * geometry.length / d;
        let base = 0.12;
        let fins: f64 = geometry.fins.iter().map(|f| f.planform_area()).sum();
        let fin_drag = 0.02 * fins / a_ref;
        let cd = (pressure + friction + base + fin_drag) * mach_factor(conditions.mach);

        let mut cn_total = 0.0;
        let mut moment = 0.0;
        if let Some(nose) = geometry.nose_length {
            cn_total += 2.0;
            moment += 2.0 * 0.466 * nose;
        }
        for fin in &geometry.fins {
            let s = fin.span;
            let n = fin.count as f64;
            let mid_chord = 0.75 * fin.root_chord;
            let interference = 1.0 + fin.body_radius / (s + fin.body_radius).max(1e-9);
            let cn = interference * 4.0 * n * (s / d).powi(2)
                / (1.0 + (1.0 + (2.0 * s / (2.0 * mid_chord).max(1e-9)).powi(2)).sqrt());
            cn_total += cn;
            moment += cn * (fin.position + 0.3 * fin.root_chord);
        }
        let cp = if cn_total > 0.0 {
            moment / cn_total
        } else {
            0.5 * geometry.length
        };

        AeroCoefficients { cd, cn_alpha: cn_total, cp }
    }

    fn name(&self) -> &str {
        "basic"
    }
}

/// Transonic drag rise multiplier.
pub fn mach_factor(mach: f64) -> f64 {
    if mach < 0.8 {
        1.0
    } else if mach < 1.2 {
        1.0 + 1.5 * (mach - 0.8) / 0.4
    } else {
        2.5 * (1.2 / mach).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Force and moment evaluation
// ---------------------------------------------------------------------------

/// Compute aerodynamic drag force (inertial frame, opposing air-relative velocity).
pub fn drag_force(vel: &Vector3<f64>, atm: &Atmo, cd: f64, area: f64) -> Vector3<f64> {
    let speed = vel.norm();
    if speed > 1e-6 {
        let q_dyn = 0.5 * atm.density * speed * speed;
        let drag_mag = q_dyn * cd * area;
        -vel.normalize() * drag_mag
    } else {
        Vector3::zeros()
    }
}

/// Compute aerodynamic restoring moment from CP-CG offset (body frame).
/// Positive `cp_offset` means CP behind CG (stable).
pub fn restoring_moment(
    vel_body: &Vector3<f64>,
    speed: f64,
    atm: &Atmo,
    area: f64,
    cn_alpha: f64,
    cp_offset: f64,
) -> Vector3<f64> {
    if speed <= 1.0 || cp_offset.abs() <= 1e-6 || cn_alpha <= 0.0 {
        return Vector3::zeros();
    }

    let q_dyn = 0.5 * atm.density * speed * speed;
    let alpha_y = vel_body.y.atan2(vel_body.z);
    let alpha_z = vel_body.x.atan2(vel_body.z);
    let normal_force = q_dyn * area * cn_alpha;

    Vector3::new(
        -normal_force * alpha_y * cp_offset,
        normal_force * alpha_z * cp_offset,
        0.0,
    )
}

/// Compute aerodynamic damping torque (body frame, proportional to angular rate).
pub fn damping_moment(omega: &Vector3<f64>, speed: f64, atm: &Atmo, area: f64, length: f64) -> Vector3<f64> {
    if speed <= 1.0 {
        return Vector3::zeros();
    }
    let q_dyn = 0.5 * atm.density * speed * speed;
    let l = length.max(1e-3);
    let damp = 0.5 * q_dyn * area * l * l / speed;
    -omega * damp
}
