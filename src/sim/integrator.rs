use nalgebra::UnitQuaternion;

use crate::dynamics::state::State;
use crate::dynamics::Dynamics;

// ---------------------------------------------------------------------------
// RK4 integrator over any force model
// ---------------------------------------------------------------------------

/// Single classical RK4 step. Mass is re-evaluated from the model at the
/// end of the step rather than integrated.
pub fn rk4_step(state: &State, dynamics: &dyn Dynamics, dt: f64) -> State {
    let k1 = dynamics.derivatives(state);
    let k2 = dynamics.derivatives(&state.apply(&k1, dt * 0.5));
    let k3 = dynamics.derivatives(&state.apply(&k2, dt * 0.5));
    let k4 = dynamics.derivatives(&state.apply(&k3, dt));

    let new_quat_raw = state.quat.quaternion()
        + (k1.dquat + k2.dquat * 2.0 + k3.dquat * 2.0 + k4.dquat) * (dt / 6.0);
    let time = state.time + dt;

    State {
        time,
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
        quat: UnitQuaternion::new_normalize(new_quat_raw),
        omega: state.omega
            + (k1.domega + 2.0 * k2.domega + 2.0 * k3.domega + k4.domega) * (dt / 6.0),
        mass: dynamics.mass_at(time),
    }
}

/// Advance to exactly `target`, splitting the interval into equal RK4
/// sub-steps no longer than the model's stability limit.
pub fn advance(state: &State, dynamics: &dyn Dynamics, target: f64) -> State {
    let span = target - state.time;
    if span <= 0.0 {
        return state.clone();
    }
    let limit = dynamics.max_step(state);
    let n = if limit.is_finite() && limit > 0.0 {
        ((span / limit).ceil() as usize).clamp(1, 10_000)
    } else {
        1
    };
    let h = span / n as f64;
    let mut s = state.clone();
    for _ in 0..n {
        s = rk4_step(&s, dynamics, h);
    }
    s.time = target;
    s
}

/// Locate the first instant in `(start.time, end.time]` where `crossed`
/// becomes true, to within `tolerance`. `crossed(end)` must hold.
///
/// Returns the state just after the crossing.
pub fn bisect(
    start: &State,
    end: &State,
    dynamics: &dyn Dynamics,
    tolerance: f64,
    crossed: impl Fn(&State) -> bool,
) -> State {
    let mut lo = start.clone();
    let mut hi = end.clone();
    while hi.time - lo.time > tolerance {
        let mid = 0.5 * (lo.time + hi.time);
        let s = advance(&lo, dynamics, mid);
        if crossed(&s) {
            hi = s;
        } else {
            lo = s;
        }
    }
    hi
}
