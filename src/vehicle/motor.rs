use crate::error::{Result, SimulationError};

// ---------------------------------------------------------------------------
// Motor definition (thrust curve + mass)
// ---------------------------------------------------------------------------

/// A solid motor described by a piecewise-linear thrust curve.
///
/// Propellant is consumed in proportion to delivered impulse, so the
/// propellant mass reaches zero exactly at the last curve point (burnout).
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    pub designation: String,
    curve: Vec<(f64, f64)>,       // (s, N), first point at t = 0
    cumulative: Vec<f64>,         // N·s delivered up to each curve point
    pub propellant_mass: f64,     // kg
    pub casing_mass: f64,         // kg
    pub ejection_delay: Option<f64>, // s after burnout, None = plugged
}

impl Motor {
    pub fn new(
        designation: impl Into<String>,
        curve: Vec<(f64, f64)>,
        propellant_mass: f64,
        casing_mass: f64,
    ) -> Self {
        let mut cumulative = Vec::with_capacity(curve.len());
        let mut impulse = 0.0;
        for (i, point) in curve.iter().enumerate() {
            if i > 0 {
                let prev = curve[i - 1];
                impulse += 0.5 * (prev.1 + point.1) * (point.0 - prev.0);
            }
            cumulative.push(impulse);
        }
        Self {
            designation: designation.into(),
            curve,
            cumulative,
            propellant_mass,
            casing_mass,
            ejection_delay: None,
        }
    }

    pub fn ejection_delay(mut self, delay: f64) -> Self {
        self.ejection_delay = Some(delay);
        self
    }

    pub fn plugged(mut self) -> Self {
        self.ejection_delay = None;
        self
    }

    pub fn curve(&self) -> &[(f64, f64)] {
        &self.curve
    }

    /// Time from ignition to burnout, s.
    pub fn burn_time(&self) -> f64 {
        self.curve.last().map(|p| p.0).unwrap_or(0.0)
    }

    pub fn total_impulse(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn average_thrust(&self) -> f64 {
        let t = self.burn_time();
        if t > 0.0 { self.total_impulse() / t } else { 0.0 }
    }

    pub fn launch_mass(&self) -> f64 {
        self.propellant_mass + self.casing_mass
    }

    /// Thrust `t` seconds after ignition, N.
    pub fn thrust_at(&self, t: f64) -> f64 {
        if t < 0.0 || t > self.burn_time() {
            return 0.0;
        }
        match self.segment(t) {
            Some((i, frac)) => {
                let (a, b) = (self.curve[i], self.curve[i + 1]);
                a.1 + (b.1 - a.1) * frac
            }
            None => self.curve.last().map(|p| p.1).unwrap_or(0.0),
        }
    }

    /// Impulse delivered up to `t` seconds after ignition, N·s.
    pub fn impulse_at(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= self.burn_time() {
            return self.total_impulse();
        }
        match self.segment(t) {
            Some((i, frac)) => {
                let (a, b) = (self.curve[i], self.curve[i + 1]);
                let dt = (b.0 - a.0) * frac;
                let f_t = a.1 + (b.1 - a.1) * frac;
                self.cumulative[i] + 0.5 * (a.1 + f_t) * dt
            }
            None => self.total_impulse(),
        }
    }

    /// Motor mass `t` seconds after ignition (negative = not yet lit), kg.
    pub fn mass_at(&self, t: f64) -> f64 {
        let total = self.total_impulse();
        let burnt = if total > 0.0 { self.impulse_at(t) / total } else { 0.0 };
        self.casing_mass + self.propellant_mass * (1.0 - burnt).clamp(0.0, 1.0)
    }

    /// Curve segment containing `t`: index of its first point and fraction.
    fn segment(&self, t: f64) -> Option<(usize, f64)> {
        let i = self.curve.windows(2).position(|w| t >= w[0].0 && t <= w[1].0)?;
        let (a, b) = (self.curve[i], self.curve[i + 1]);
        let span = b.0 - a.0;
        let frac = if span > 0.0 { (t - a.0) / span } else { 1.0 };
        Some((i, frac))
    }

    pub fn validate(&self) -> Result<()> {
        let malformed = |reason: &str| SimulationError::MalformedMotor {
            designation: self.designation.clone(),
            reason: reason.to_string(),
        };
        if self.curve.len() < 2 {
            return Err(malformed("thrust curve needs at least two points"));
        }
        if self.curve[0].0 != 0.0 {
            return Err(malformed("thrust curve must start at t = 0"));
        }
        if self
            .curve
            .windows(2)
            .any(|w| !(w[1].0 > w[0].0) || !w[1].1.is_finite() || w[1].1 < 0.0)
        {
            return Err(malformed("thrust curve times must increase and thrust be >= 0"));
        }
        if !(self.propellant_mass >= 0.0 && self.casing_mass >= 0.0) {
            return Err(malformed("masses must be non-negative"));
        }
        if let Some(delay) = self.ejection_delay {
            if !(delay.is_finite() && delay >= 0.0) {
                return Err(malformed("ejection delay must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trapezoid() -> Motor {
        Motor::new("T10", vec![(0.0, 0.0), (0.5, 10.0), (1.5, 10.0), (2.0, 0.0)], 0.01, 0.02)
            .ejection_delay(3.0)
    }

    #[test]
    fn impulse_and_burn_time() {
        let m = trapezoid();
        assert!((m.burn_time() - 2.0).abs() < 1e-12);
        assert!((m.total_impulse() - 15.0).abs() < 1e-9);
        assert!((m.average_thrust() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn thrust_interpolates() {
        let m = trapezoid();
        assert!((m.thrust_at(0.25) - 5.0).abs() < 1e-9);
        assert!((m.thrust_at(1.0) - 10.0).abs() < 1e-9);
        assert_eq!(m.thrust_at(-0.1), 0.0);
        assert_eq!(m.thrust_at(2.5), 0.0);
    }

    #[test]
    fn mass_falls_from_launch_to_casing() {
        let m = trapezoid();
        assert!((m.mass_at(-1.0) - m.launch_mass()).abs() < 1e-12);
        assert!((m.mass_at(2.0) - m.casing_mass).abs() < 1e-12);
        // half the impulse is delivered at t = 1.0
        assert!((m.mass_at(1.0) - (0.02 + 0.005)).abs() < 1e-9);
    }

    #[test]
    fn impulse_is_monotone() {
        let m = trapezoid();
        let mut last = 0.0;
        for i in 0..=40 {
            let j = m.impulse_at(i as f64 * 0.05);
            assert!(j >= last - 1e-12);
            last = j;
        }
    }

    #[test]
    fn rejects_curve_not_starting_at_zero() {
        let m = Motor::new("Bad", vec![(0.1, 5.0), (1.0, 0.0)], 0.01, 0.01);
        assert!(matches!(m.validate(), Err(SimulationError::MalformedMotor { .. })));
    }
}
