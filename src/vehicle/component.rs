use std::fmt;

use serde::{Deserialize, Serialize};

use super::recovery::RecoveryDevice;

// ---------------------------------------------------------------------------
// Component tree nodes
// ---------------------------------------------------------------------------

/// Handle into a rocket's component arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of component kinds the simulation understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Rocket,
    AxialStage,
    /// Boosters strapped alongside a component of their parent stage.
    ParallelStage { count: u32, radial_offset: f64 },
    NoseCone,
    BodyTube,
    /// Motor mount tube
    InnerTube,
    CenteringRing,
    FinSet { count: u32, span: f64, root_chord: f64 },
    RecoveryDevice(RecoveryDevice),
    MassComponent,
}

impl ComponentKind {
    pub fn is_stage(&self) -> bool {
        matches!(self, ComponentKind::AxialStage | ComponentKind::ParallelStage { .. })
    }

    /// External body components stack one after another inside a stage.
    pub fn is_body(&self) -> bool {
        matches!(self, ComponentKind::NoseCone | ComponentKind::BodyTube)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Rocket => "rocket",
            ComponentKind::AxialStage => "stage",
            ComponentKind::ParallelStage { .. } => "parallel stage",
            ComponentKind::NoseCone => "nose cone",
            ComponentKind::BodyTube => "body tube",
            ComponentKind::InnerTube => "inner tube",
            ComponentKind::CenteringRing => "centering ring",
            ComponentKind::FinSet { .. } => "fin set",
            ComponentKind::RecoveryDevice(_) => "recovery device",
            ComponentKind::MassComponent => "mass component",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    /// Offset from the top of the parent (ignored for stacked bodies and axial stages).
    pub axial_offset: f64, // m
    pub length: f64,       // m
    pub radius: f64,       // m, outer radius
    pub mass: f64,         // kg, structural mass of this part alone
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            axial_offset: 0.0,
            length: 0.0,
            radius: 0.0,
            mass: 0.0,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn nose_cone(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::NoseCone)
    }

    pub fn body_tube(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::BodyTube)
    }

    pub fn inner_tube(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::InnerTube)
    }

    pub fn centering_ring(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::CenteringRing)
    }

    pub fn fin_set(name: impl Into<String>, count: u32, span: f64, root_chord: f64) -> Self {
        Self::new(name, ComponentKind::FinSet { count, span, root_chord }).length(root_chord)
    }

    pub fn recovery(name: impl Into<String>, device: RecoveryDevice) -> Self {
        Self::new(name, ComponentKind::RecoveryDevice(device))
    }

    pub fn mass_component(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::MassComponent)
    }

    pub fn offset(mut self, v: f64) -> Self { self.axial_offset = v; self }
    pub fn length(mut self, v: f64) -> Self { self.length = v; self }
    pub fn radius(mut self, v: f64) -> Self { self.radius = v; self }
    pub fn mass(mut self, v: f64) -> Self { self.mass = v; self }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    pub fn recovery_device(&self) -> Option<&RecoveryDevice> {
        match &self.kind {
            ComponentKind::RecoveryDevice(device) => Some(device),
            _ => None,
        }
    }
}
