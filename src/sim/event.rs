use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use serde::Serialize;

use crate::vehicle::component::ComponentId;

// ---------------------------------------------------------------------------
// Flight events
// ---------------------------------------------------------------------------

/// Kinds of flight events, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightEventKind {
    Launch,
    Ignition,
    Liftoff,
    LaunchRod,
    Burnout,
    EjectionCharge,
    StageSeparation,
    RecoveryDeviceDeployment,
    Apogee,
    Tumble,
    GroundHit,
    SimulationEnd,
    SimulationAbort,
}

impl fmt::Display for FlightEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlightEventKind::Launch => "LAUNCH",
            FlightEventKind::Ignition => "IGNITION",
            FlightEventKind::Liftoff => "LIFTOFF",
            FlightEventKind::LaunchRod => "LAUNCHROD",
            FlightEventKind::Burnout => "BURNOUT",
            FlightEventKind::EjectionCharge => "EJECTION_CHARGE",
            FlightEventKind::StageSeparation => "STAGE_SEPARATION",
            FlightEventKind::RecoveryDeviceDeployment => "RECOVERY_DEVICE_DEPLOYMENT",
            FlightEventKind::Apogee => "APOGEE",
            FlightEventKind::Tumble => "TUMBLE",
            FlightEventKind::GroundHit => "GROUND_HIT",
            FlightEventKind::SimulationEnd => "SIMULATION_END",
            FlightEventKind::SimulationAbort => "SIMULATION_ABORT",
        };
        f.write_str(s)
    }
}

/// A recorded event. `source` is the component that caused it: the rocket
/// root for launch/apogee, a motor mount for ignition/burnout, a stage for
/// ejection/separation, a device for deployment, nothing for crossings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightEvent {
    pub kind: FlightEventKind,
    pub time: f64,
    pub source: Option<ComponentId>,
}

impl FlightEvent {
    pub fn new(kind: FlightEventKind, time: f64, source: Option<ComponentId>) -> Self {
        Self { kind, time, source }
    }
}

// ---------------------------------------------------------------------------
// Scheduled events (not yet fired)
// ---------------------------------------------------------------------------

/// What a pending event does when it fires. Indices point into the branch's
/// motor list; stages are topology stage indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Ignition { motor: usize },
    Burnout { motor: usize },
    Ejection { stage: usize },
    Separation { stage: usize },
    Deployment { device: ComponentId },
}

impl Action {
    pub fn kind(&self) -> FlightEventKind {
        match self {
            Action::Ignition { .. } => FlightEventKind::Ignition,
            Action::Burnout { .. } => FlightEventKind::Burnout,
            Action::Ejection { .. } => FlightEventKind::EjectionCharge,
            Action::Separation { .. } => FlightEventKind::StageSeparation,
            Action::Deployment { .. } => FlightEventKind::RecoveryDeviceDeployment,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduled {
    pub time: f64,
    pub action: Action,
    seq: u64,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed: BinaryHeap is a max-heap, the earliest event must pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.action.kind().cmp(&self.action.kind()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Future events of one branch, ordered by (time, kind priority, insertion).
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { time, action, seq });
    }

    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|s| s.time)
    }

    /// Pop the next event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Scheduled> {
        if self.heap.peek().is_some_and(|s| s.time <= now) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scheduled> {
        self.heap.iter()
    }

    /// Keep only entries matching `keep`; insertion order is preserved.
    pub fn retain(&mut self, keep: impl Fn(&Action) -> bool) {
        let kept: Vec<Scheduled> = self.heap.drain().filter(|s| keep(&s.action)).collect();
        self.heap = kept.into_iter().collect();
    }
}

// ---------------------------------------------------------------------------
// Continuous crossings (located by bisection)
// ---------------------------------------------------------------------------

/// Conditions evaluated on the continuous state after every step, in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    Liftoff,
    LaunchRod,
    DeployAltitude { device: ComponentId, altitude: f64 },
    DeploySpeed { device: ComponentId, speed: f64 },
    Apogee,
    GroundHit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_time_pops_first() {
        let mut q = EventQueue::new();
        q.push(2.0, Action::Burnout { motor: 0 });
        q.push(1.0, Action::Ignition { motor: 1 });
        assert_eq!(q.next_time(), Some(1.0));
        assert!(q.pop_due(0.5).is_none());
        let first = q.pop_due(5.0).unwrap();
        assert_eq!(first.action, Action::Ignition { motor: 1 });
    }

    #[test]
    fn same_time_uses_kind_priority_then_insertion() {
        let mut q = EventQueue::new();
        q.push(1.0, Action::Separation { stage: 1 });
        q.push(1.0, Action::Burnout { motor: 3 });
        q.push(1.0, Action::Burnout { motor: 2 });
        let order: Vec<Action> = std::iter::from_fn(|| q.pop_due(1.0)).map(|s| s.action).collect();
        assert_eq!(
            order,
            vec![
                Action::Burnout { motor: 3 },
                Action::Burnout { motor: 2 },
                Action::Separation { stage: 1 },
            ]
        );
    }

    #[test]
    fn retain_drops_filtered_entries() {
        let mut q = EventQueue::new();
        q.push(1.0, Action::Burnout { motor: 0 });
        q.push(1.5, Action::Burnout { motor: 1 });
        q.retain(|a| !matches!(a, Action::Burnout { motor: 0 }));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_time(), Some(1.5));
    }

    #[test]
    fn event_names_match_log_format() {
        assert_eq!(FlightEventKind::RecoveryDeviceDeployment.to_string(), "RECOVERY_DEVICE_DEPLOYMENT");
        assert!(FlightEventKind::Burnout < FlightEventKind::EjectionCharge);
    }
}
