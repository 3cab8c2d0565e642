use std::collections::BTreeMap;

use super::component::{Component, ComponentId, ComponentKind};
use super::config::{FlightConfiguration, FlightConfigurationId};
use crate::error::{Result, SimulationError};

// ---------------------------------------------------------------------------
// Rocket: component tree + flight configurations
// ---------------------------------------------------------------------------

/// Vehicle topology. Components live in an arena; stages are numbered in
/// depth-first order (sustainer first, boosters after the stage carrying
/// them). The simulation only ever reads this.
#[derive(Debug, Clone)]
pub struct Rocket {
    pub name: String,
    components: Vec<Component>,
    removed: Vec<bool>,
    positions: Vec<f64>, // absolute top of each component, m aft of the nose tip
    stages: Vec<ComponentId>,
    configurations: BTreeMap<FlightConfigurationId, FlightConfiguration>,
    default_configuration: Option<FlightConfigurationId>,
}

impl Rocket {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            components: vec![Component::new(name.clone(), ComponentKind::Rocket)],
            name,
            removed: vec![false],
            positions: vec![0.0],
            stages: Vec::new(),
            configurations: BTreeMap::new(),
            default_configuration: None,
        }
    }

    pub fn root(&self) -> ComponentId {
        ComponentId(0)
    }

    // --- structure --------------------------------------------------------

    /// Append an axial stage below the existing ones.
    pub fn add_stage(&mut self, name: impl Into<String>) -> ComponentId {
        self.insert(self.root(), Component::new(name, ComponentKind::AxialStage))
    }

    /// Strap `count` boosters onto `parent` (any component inside a stage).
    pub fn add_parallel_stage(
        &mut self,
        parent: ComponentId,
        name: impl Into<String>,
        count: u32,
        radial_offset: f64,
        axial_offset: f64,
    ) -> Result<ComponentId> {
        let booster = Component::new(name, ComponentKind::ParallelStage { count, radial_offset })
            .offset(axial_offset);
        self.add(parent, booster)
    }

    /// Attach a component, enforcing where each kind may live.
    pub fn add(&mut self, parent: ComponentId, component: Component) -> Result<ComponentId> {
        let parent_kind = &self.get(parent)?.kind;
        let allowed = match (&component.kind, parent_kind) {
            (ComponentKind::Rocket, _) => false,
            (ComponentKind::AxialStage, ComponentKind::Rocket) => true,
            (ComponentKind::AxialStage, _) => false,
            (_, ComponentKind::Rocket) => false,
            _ => true,
        };
        if !allowed {
            return Err(SimulationError::InvalidTopology(format!(
                "a {} cannot be attached to a {}",
                component.kind.label(),
                parent_kind.label()
            )));
        }
        if let ComponentKind::ParallelStage { count, .. } = component.kind {
            if count == 0 {
                return Err(SimulationError::InvalidTopology(format!(
                    "parallel stage {} needs at least one booster",
                    component.name
                )));
            }
        }
        Ok(self.insert(parent, component))
    }

    fn insert(&mut self, parent: ComponentId, mut component: Component) -> ComponentId {
        let id = ComponentId(self.components.len());
        component.parent = Some(parent);
        component.children.clear();
        self.components.push(component);
        self.removed.push(false);
        self.components[parent.0].children.push(id);
        self.reindex();
        id
    }

    /// Structurally remove a component and everything below it.
    pub fn remove(&mut self, id: ComponentId) -> Result<()> {
        if id == self.root() {
            return Err(SimulationError::InvalidTopology("the rocket root cannot be removed".into()));
        }
        let parent = self.get(id)?.parent.ok_or(SimulationError::UnknownComponent(id))?;
        self.components[parent.0].children.retain(|c| *c != id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.removed[next.0] = true;
            stack.extend(self.components[next.0].children.iter().copied());
        }
        self.reindex();
        Ok(())
    }

    /// Remove a stage (and anything strapped onto it) by index.
    pub fn remove_stage(&mut self, index: usize) -> Result<()> {
        let id = self.stage(index).ok_or(SimulationError::UnknownStage {
            index,
            count: self.stage_count(),
        })?;
        self.remove(id)
    }

    /// Recompute absolute positions, stage numbering and configuration stage lists.
    fn reindex(&mut self) {
        let mut positions = vec![0.0; self.components.len()];
        let mut stages = Vec::new();
        let mut stack = vec![(self.root(), 0.0)];
        while let Some((id, top)) = stack.pop() {
            positions[id.0] = top;
            let component = &self.components[id.0];
            if component.kind.is_stage() {
                stages.push(id);
            }
            let mut cursor = top;
            let mut placed = Vec::with_capacity(component.children.len());
            for &child in &component.children {
                let kind = &self.components[child.0].kind;
                let stacked = match component.kind {
                    ComponentKind::Rocket => matches!(kind, ComponentKind::AxialStage),
                    ComponentKind::AxialStage | ComponentKind::ParallelStage { .. } => kind.is_body(),
                    _ => false,
                };
                if stacked {
                    placed.push((child, cursor));
                    cursor += self.stacked_length(child);
                } else {
                    placed.push((child, top + self.components[child.0].axial_offset));
                }
            }
            stack.extend(placed.into_iter().rev());
        }
        self.positions = positions;
        self.stages = stages;

        let removed = &self.removed;
        for config in self.configurations.values_mut() {
            config.sync_stages(self.stages.clone(), |id| !removed.get(id.0).copied().unwrap_or(true));
        }
    }

    fn stacked_length(&self, id: ComponentId) -> f64 {
        let component = &self.components[id.0];
        if component.kind.is_stage() {
            let body: f64 = component
                .children
                .iter()
                .map(|c| &self.components[c.0])
                .filter(|c| c.kind.is_body())
                .map(|c| c.length)
                .sum();
            if body > 0.0 { body } else { component.length }
        } else {
            component.length
        }
    }

    // --- lookups ----------------------------------------------------------

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        if self.removed.get(id.0).copied().unwrap_or(true) {
            None
        } else {
            self.components.get(id.0)
        }
    }

    pub fn get(&self, id: ComponentId) -> Result<&Component> {
        self.component(id).ok_or(SimulationError::UnknownComponent(id))
    }

    pub fn name_of(&self, id: ComponentId) -> &str {
        self.component(id).map(|c| c.name.as_str()).unwrap_or("?")
    }

    /// Absolute axial position of a component's top, m aft of the nose tip.
    pub fn absolute_position(&self, id: ComponentId) -> f64 {
        self.positions.get(id.0).copied().unwrap_or(0.0)
    }

    /// Number of physical copies (boosters multiply everything they carry).
    pub fn multiplicity(&self, id: ComponentId) -> u32 {
        let mut count = 1;
        let mut cursor = Some(id);
        while let Some(c) = cursor.and_then(|c| self.component(c)) {
            if let ComponentKind::ParallelStage { count: n, .. } = c.kind {
                count *= n;
            }
            cursor = c.parent;
        }
        count
    }

    /// Distance from the vehicle axis (boosters sit off-axis).
    pub fn radial_offset(&self, id: ComponentId) -> f64 {
        let mut radial = 0.0;
        let mut cursor = Some(id);
        while let Some(c) = cursor.and_then(|c| self.component(c)) {
            if let ComponentKind::ParallelStage { radial_offset, .. } = c.kind {
                radial += radial_offset;
            }
            cursor = c.parent;
        }
        radial
    }

    /// Depth-first walk below `id` (inclusive).
    pub fn subtree(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(c) = self.component(next) {
                out.push(next);
                stack.extend(c.children.iter().rev().copied());
            }
        }
        out
    }

    // --- stages -----------------------------------------------------------

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[ComponentId] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<ComponentId> {
        self.stages.get(index).copied()
    }

    pub fn is_parallel(&self, index: usize) -> bool {
        self.stage(index)
            .and_then(|id| self.component(id))
            .is_some_and(|c| matches!(c.kind, ComponentKind::ParallelStage { .. }))
    }

    /// Stage a component belongs to (a stage belongs to itself).
    pub fn stage_index_of(&self, id: ComponentId) -> Option<usize> {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let component = self.component(c)?;
            if component.kind.is_stage() {
                return self.stages.iter().position(|s| *s == c);
            }
            cursor = component.parent;
        }
        None
    }

    /// Stage carrying a parallel stage; `None` for axial stages.
    pub fn parent_stage(&self, index: usize) -> Option<usize> {
        if !self.is_parallel(index) {
            return None;
        }
        let parent = self.component(self.stage(index)?)?.parent?;
        self.stage_index_of(parent)
    }

    /// Axial stages in flight order, top first.
    pub fn axial_stages(&self) -> Vec<usize> {
        (0..self.stages.len()).filter(|&i| !self.is_parallel(i)).collect()
    }

    /// Components owned by a stage, excluding nested stages and their parts.
    pub fn stage_components(&self, index: usize) -> Vec<ComponentId> {
        let Some(stage) = self.stage(index) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![stage];
        while let Some(next) = stack.pop() {
            let Some(c) = self.component(next) else { continue };
            if next != stage && c.kind.is_stage() {
                continue;
            }
            out.push(next);
            stack.extend(c.children.iter().rev().copied());
        }
        out
    }

    /// Stages that leave the vehicle together when `index` separates: for an
    /// axial stage everything from it downwards, for a booster the booster
    /// itself. Nested boosters always follow their carrier.
    pub fn separating_assembly(&self, index: usize) -> Vec<usize> {
        let roots: Vec<usize> = if self.is_parallel(index) {
            vec![index]
        } else {
            self.axial_stages().into_iter().filter(|&i| i >= index).collect()
        };
        let mut out: Vec<usize> = roots
            .iter()
            .filter_map(|&i| self.stage(i))
            .flat_map(|id| self.subtree(id))
            .filter_map(|id| {
                self.component(id)
                    .filter(|c| c.kind.is_stage())
                    .and_then(|_| self.stage_index_of(id))
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// First active stage in stage order.
    pub fn topmost_stage(&self, config: &FlightConfiguration) -> Option<usize> {
        (0..self.stages.len()).find(|&i| config.is_stage_active(i))
    }

    /// Lowest active axial stage.
    pub fn bottom_active_axial_stage(&self, config: &FlightConfiguration) -> Option<usize> {
        self.axial_stages().into_iter().rev().find(|&i| config.is_stage_active(i))
    }

    // --- parts ------------------------------------------------------------

    pub fn is_motor_mount(&self, id: ComponentId) -> bool {
        self.component(id)
            .is_some_and(|c| matches!(c.kind, ComponentKind::InnerTube | ComponentKind::BodyTube))
    }

    pub fn motor_mounts(&self) -> Vec<ComponentId> {
        self.subtree(self.root())
            .into_iter()
            .filter(|id| self.is_motor_mount(*id))
            .collect()
    }

    pub fn recovery_devices(&self) -> Vec<ComponentId> {
        self.subtree(self.root())
            .into_iter()
            .filter(|id| self.component(*id).is_some_and(|c| c.recovery_device().is_some()))
            .collect()
    }

    /// Inner tubes next to a centering ring that physically pass through it.
    pub fn supported_motor_mounts(&self, ring: ComponentId) -> Vec<ComponentId> {
        let Some(ring_component) = self.component(ring) else {
            return Vec::new();
        };
        if !matches!(ring_component.kind, ComponentKind::CenteringRing) {
            return Vec::new();
        }
        let Some(parent) = ring_component.parent.and_then(|p| self.component(p)) else {
            return Vec::new();
        };
        let ring_top = self.absolute_position(ring);
        let ring_bottom = ring_top + ring_component.length;
        parent
            .children
            .iter()
            .copied()
            .filter(|&sibling| sibling != ring)
            .filter(|&sibling| match self.component(sibling) {
                Some(c) if matches!(c.kind, ComponentKind::InnerTube) => {
                    let top = self.absolute_position(sibling);
                    let bottom = top + c.length;
                    (ring_top >= top && ring_top <= bottom) || (ring_bottom >= top && ring_bottom <= bottom)
                }
                _ => false,
            })
            .collect()
    }

    // --- configurations ---------------------------------------------------

    /// Create (or fetch) a configuration; the first one becomes the default.
    pub fn create_configuration(&mut self, id: FlightConfigurationId) -> &mut FlightConfiguration {
        if self.default_configuration.is_none() {
            self.default_configuration = Some(id.clone());
        }
        let stages = self.stages.clone();
        self.configurations
            .entry(id.clone())
            .or_insert_with(|| FlightConfiguration::new(id, stages))
    }

    pub fn configuration(&self, id: &FlightConfigurationId) -> Option<&FlightConfiguration> {
        self.configurations.get(id)
    }

    pub fn configuration_mut(&mut self, id: &FlightConfigurationId) -> Option<&mut FlightConfiguration> {
        self.configurations.get_mut(id)
    }

    pub fn default_configuration_id(&self) -> Option<&FlightConfigurationId> {
        self.default_configuration.as_ref()
    }

    pub fn configuration_ids(&self) -> impl Iterator<Item = &FlightConfigurationId> {
        self.configurations.keys()
    }
}
