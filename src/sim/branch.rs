use rayon::prelude::*;
use tracing::debug;

use super::data::FlightDataBranch;
use super::status::{action_stage, Phase, SimulationStatus};
use super::stepper::{BranchContext, BranchStepper};
use crate::vehicle::assembly::Assembly;
use crate::vehicle::rocket::Rocket;

// ---------------------------------------------------------------------------
// Forking on separation
// ---------------------------------------------------------------------------

/// Split the attached stages into (leaving, staying) for a separation of
/// `stage`. `None` when either side would be empty.
pub(crate) fn partition(rocket: &Rocket, status: &SimulationStatus, stage: usize) -> Option<(Vec<usize>, Vec<usize>)> {
    let leaving: Vec<usize> = rocket
        .separating_assembly(stage)
        .into_iter()
        .filter(|&s| status.is_attached(s))
        .collect();
    let staying: Vec<usize> = status
        .assembly
        .stages
        .iter()
        .copied()
        .filter(|s| !leaving.contains(s))
        .collect();
    if leaving.is_empty() || staying.is_empty() {
        None
    } else {
        Some((leaving, staying))
    }
}

/// Detach `leaving` from `status` and build the branch that follows it.
///
/// The parent keeps its history and drops every pending event of the
/// departed stages. The child starts from the same state with the pending
/// events of its own stages and a copy of the recorded events whose source
/// lies in them. A massless detached part yields no child.
pub(crate) fn fork(
    rocket: &Rocket,
    status: &mut SimulationStatus,
    stage: usize,
    leaving: &[usize],
    staying: &[usize],
) -> Option<SimulationStatus> {
    let t = status.time();
    let assembly = Assembly::new(rocket, leaving);
    let mass = assembly.mass_properties(&status.motors, t).mass;
    let in_leaving = |s: Option<usize>| s.is_some_and(|s| leaving.contains(&s));

    let child = (mass > 0.0).then(|| {
        let motors = &status.motors;
        let mut queue = status.queue.clone();
        queue.retain(|a| in_leaving(action_stage(rocket, motors, a)));

        let events = status
            .data
            .events()
            .iter()
            .filter(|e| in_leaving(e.source.and_then(|c| rocket.stage_index_of(c))))
            .cloned()
            .collect();
        let name = rocket.stage(stage).map(|id| rocket.name_of(id).to_string()).unwrap_or_default();

        let deployed: Vec<_> = status
            .deployed
            .iter()
            .copied()
            .filter(|&d| in_leaving(rocket.stage_index_of(d)))
            .collect();
        let mut state = status.state.clone();
        state.mass = mass;

        SimulationStatus {
            state,
            assembly,
            motors: status.motors.clone(),
            queue,
            phase: if deployed.is_empty() { Phase::Ascent } else { Phase::Descent },
            deployed,
            armed: status.armed.clone(),
            ejected: status.ejected.clone(),
            liftoff: status.liftoff,
            rod_cleared: status.rod_cleared,
            apogee: status.apogee,
            tumbling: false,
            ended: false,
            data: FlightDataBranch::forked(name, events),
        }
    });

    let keep = |s: Option<usize>| s.is_some_and(|s| staying.contains(&s));
    let motors = &status.motors;
    status.queue.retain(|a| keep(action_stage(rocket, motors, a)));
    status.deployed.retain(|&d| keep(rocket.stage_index_of(d)));
    status.assembly = Assembly::new(rocket, staying);
    status.state.mass = status.assembly.mass_properties(&status.motors, t).mass;
    if status.phase == Phase::Descent && status.deployed.is_empty() {
        status.phase = Phase::Ascent;
    }
    child
}

// ---------------------------------------------------------------------------
// Running the branch tree
// ---------------------------------------------------------------------------

struct Pending {
    /// Sort key; depth-first order with later forks first
    key: Vec<u32>,
    status: SimulationStatus,
    launch: bool,
}

fn run_one(ctx: &BranchContext<'_>, pending: Pending) -> (Vec<u32>, FlightDataBranch, Vec<SimulationStatus>) {
    let Pending { key, mut status, launch } = pending;
    let mut stepper = BranchStepper::new(ctx);
    if launch {
        stepper.launch(&mut status);
    }
    let forks = stepper.run(&mut status);
    (key, status.data, forks)
}

/// Run the main branch and every branch it spawns, wave by wave. Siblings
/// of one wave are independent and run on the rayon pool when
/// `parallel_branches` is set.
///
/// Returned in depth-first order: the main branch, then each fork followed
/// by its own forks, the most recent fork of a parent first.
pub(crate) fn run_branches(ctx: &BranchContext<'_>, root: SimulationStatus) -> Vec<FlightDataBranch> {
    let mut finished: Vec<(Vec<u32>, FlightDataBranch)> = Vec::new();
    let mut wave = vec![Pending { key: Vec::new(), status: root, launch: true }];

    while !wave.is_empty() {
        debug!(branches = wave.len(), "running wave");
        let results: Vec<_> = if ctx.options.parallel_branches {
            wave.into_par_iter().map(|p| run_one(ctx, p)).collect()
        } else {
            wave.into_iter().map(|p| run_one(ctx, p)).collect()
        };

        wave = Vec::new();
        for (key, data, forks) in results {
            for (i, status) in forks.into_iter().enumerate() {
                let mut child_key = key.clone();
                child_key.push(u32::MAX - i as u32);
                wave.push(Pending { key: child_key, status, launch: false });
            }
            finished.push((key, data));
        }
    }

    finished.sort_by(|a, b| a.0.cmp(&b.0));
    finished.into_iter().map(|(_, data)| data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::state::State;
    use crate::physics::aerodynamics::BasicAerodynamics;
    use crate::sim::data::BranchOutcome;
    use crate::sim::event::{Action, FlightEvent, FlightEventKind};
    use crate::sim::options::SimulationOptions;
    use crate::vehicle::component::Component;
    use crate::vehicle::config::FlightConfigurationId;
    use nalgebra::UnitQuaternion;
    use std::time::{Duration, Instant};

    fn two_stage() -> Rocket {
        let mut r = Rocket::new("R");
        let s0 = r.add_stage("Upper");
        r.add(s0, Component::body_tube("Upper tube").length(0.3).radius(0.02).mass(0.05)).unwrap();
        let s1 = r.add_stage("Lower");
        r.add(s1, Component::body_tube("Lower tube").length(0.2).radius(0.02).mass(0.04)).unwrap();
        r
    }

    fn status(r: &Rocket) -> SimulationStatus {
        let state = State::at_rest(UnitQuaternion::identity(), 0.09);
        SimulationStatus::new("Upper", state, Assembly::new(r, &[0, 1]), vec![])
    }

    #[test]
    fn partition_needs_both_sides() {
        let r = two_stage();
        let s = status(&r);
        assert_eq!(partition(&r, &s, 1), Some((vec![1], vec![0])));
        assert_eq!(partition(&r, &s, 0), None);
    }

    #[test]
    fn fork_splits_queue_and_history() {
        let r = two_stage();
        let mut s = status(&r);
        s.queue.push(1.0, Action::Ejection { stage: 0 });
        s.queue.push(1.0, Action::Ejection { stage: 1 });
        s.data.push_event(FlightEvent::new(FlightEventKind::Launch, 0.0, Some(r.root())));
        s.data.push_event(FlightEvent::new(FlightEventKind::StageSeparation, 0.0, r.stage(1)));

        let child = fork(&r, &mut s, 1, &[1], &[0]).unwrap();
        assert_eq!(child.data.name, "Lower");
        assert_eq!(child.data.event_kinds(), vec![FlightEventKind::StageSeparation]);
        assert_eq!(child.queue.len(), 1);
        assert!((child.state.mass - 0.04).abs() < 1e-12);

        assert_eq!(s.assembly.stages, vec![0]);
        assert_eq!(s.queue.len(), 1);
        assert!((s.state.mass - 0.05).abs() < 1e-12);
        assert_eq!(s.data.events().len(), 2);
    }

    #[test]
    fn massless_part_yields_no_branch() {
        let mut r = Rocket::new("R");
        let s0 = r.add_stage("Upper");
        r.add(s0, Component::body_tube("Tube").length(0.3).radius(0.02).mass(0.05)).unwrap();
        r.add_stage("Empty");
        let mut s = status(&r);
        assert!(fork(&r, &mut s, 1, &[1], &[0]).is_none());
        assert_eq!(s.assembly.stages, vec![0]);
    }

    #[test]
    fn wall_clock_budget_counts_from_run_start() {
        let mut r = two_stage();
        let config = r.create_configuration(FlightConfigurationId::new("c")).clone();
        let options = SimulationOptions::default().max_wall_time(1.0);
        let started = Instant::now().checked_sub(Duration::from_secs(2)).unwrap();
        let ctx = BranchContext::new(&r, &config, &options, &BasicAerodynamics, started);

        let branches = run_branches(&ctx, status(&r));
        assert_eq!(branches.len(), 1);
        assert_eq!(*branches[0].outcome(), BranchOutcome::TimedOut);
        assert_eq!(
            branches[0].event_kinds(),
            vec![FlightEventKind::Launch, FlightEventKind::SimulationEnd]
        );
    }
}
