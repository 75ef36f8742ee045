//! B-rep model context
//!
//! Every node, curve, surface and topological entity lives in a [`Context`]
//! arena and is addressed by an [`EntityId`]. Parents hold references on their
//! children and geometry; an entity is freed once its own handle has been
//! released and nothing references it any more, and freeing cascades down the
//! graph.

mod geometry;
mod scope;

pub use geometry::{Evaluation, GeometryType, evaluate, evaluate_dot, position_dual};
pub use scope::TempScope;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::kernel::{KernelError, KernelResult};

/// Unique identifier for an entity within a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// ID of the context that owns this entity
    pub context: Uuid,
    /// Slot index within the context
    pub index: u32,
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Object class of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    Node,
    Curve,
    Surface,
    Edge,
    Loop,
    Face,
    Shell,
    Body,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectClass::Node => "node",
            ObjectClass::Curve => "curve",
            ObjectClass::Surface => "surface",
            ObjectClass::Edge => "edge",
            ObjectClass::Loop => "loop",
            ObjectClass::Face => "face",
            ObjectClass::Shell => "shell",
            ObjectClass::Body => "body",
        };
        f.write_str(name)
    }
}

/// Topology class of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyClass {
    NodeBody,
    WireBody,
    SheetBody,
    SolidBody,
}

/// Orientation of a child relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sense {
    #[default]
    Forward,
    Reverse,
}

/// Number of bounding nodes of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// Open edge with distinct start and end nodes
    TwoNode,
    /// Closed edge whose start and end coincide
    OneNode,
}

/// Topological type, including the per-class flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopoType {
    Node,
    Edge(EdgeType),
    Loop { closed: bool },
    Face(Sense),
    Shell { closed: bool },
    Body(BodyClass),
}

impl TopoType {
    pub fn class(self) -> ObjectClass {
        match self {
            TopoType::Node => ObjectClass::Node,
            TopoType::Edge(_) => ObjectClass::Edge,
            TopoType::Loop { .. } => ObjectClass::Loop,
            TopoType::Face(_) => ObjectClass::Face,
            TopoType::Shell { .. } => ObjectClass::Shell,
            TopoType::Body(_) => ObjectClass::Body,
        }
    }

    /// Length of the numeric data carried by the entity itself
    pub fn data_len(self) -> usize {
        match self {
            TopoType::Node => 3,
            TopoType::Edge(_) => 2,
            TopoType::Face(_) => 4,
            _ => 0,
        }
    }
}

/// Decomposed form of a topological entity
///
/// `data` is the node position, the edge `[t0, t1]` range or the face
/// `[u0, u1, v0, v1]` box. `senses` is parallel to `children` for loops
/// and faces and empty otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyParts {
    pub mtype: TopoType,
    pub geometry: Option<EntityId>,
    pub data: Vec<f64>,
    pub children: Vec<EntityId>,
    pub senses: Vec<Sense>,
}

impl TopologyParts {
    /// Bitwise equivalence, so NaN payloads and signed zeros count
    pub fn same_as(&self, other: &TopologyParts) -> bool {
        self.mtype == other.mtype
            && self.geometry == other.geometry
            && self.children == other.children
            && self.senses == other.senses
            && same_bits(&self.data, &other.data)
    }
}

/// Decomposed form of a curve or surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryParts {
    pub gtype: GeometryType,
    pub data: Vec<f64>,
}

impl GeometryParts {
    pub fn same_as(&self, other: &GeometryParts) -> bool {
        self.gtype == other.gtype && same_bits(&self.data, &other.data)
    }
}

pub(crate) fn same_bits(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

#[derive(Debug, Clone)]
pub(crate) enum Entity {
    Geometry(GeometryParts),
    Topology(TopologyParts),
}

impl Entity {
    pub(crate) fn class(&self) -> ObjectClass {
        match self {
            Entity::Geometry(g) => g.gtype.class(),
            Entity::Topology(t) => t.mtype.class(),
        }
    }

    /// Entities this one holds a reference on
    fn references(&self) -> Vec<EntityId> {
        match self {
            Entity::Geometry(_) => Vec::new(),
            Entity::Topology(t) => t.geometry.iter().chain(&t.children).copied().collect(),
        }
    }
}

/// Stored defining data and its velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub data: Vec<f64>,
    pub data_dot: Vec<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub(crate) entity: Entity,
    pub(crate) velocity: Option<Velocity>,
    refs: u32,
    released: bool,
}

/// Arena owning every entity of one model
#[derive(Debug)]
pub struct Context {
    id: Uuid,
    slots: Vec<Option<Slot>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            slots: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of entities currently alive
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether the id refers to a live entity of this context
    pub fn contains(&self, id: EntityId) -> bool {
        self.slot(id).is_ok()
    }

    /// Free every entity at once
    ///
    /// Slot indices are never reused, so stale ids keep failing to resolve.
    pub fn clear(&mut self) {
        tracing::debug!("Closing context {} with {} entities", self.id, self.live_count());
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub(crate) fn slot(&self, id: EntityId) -> KernelResult<&Slot> {
        if id.context != self.id {
            return Err(KernelError::ForeignEntity(id));
        }
        self.slots
            .get(id.index as usize)
            .and_then(Option::as_ref)
            .ok_or(KernelError::EntityNotFound(id))
    }

    pub(crate) fn slot_mut(&mut self, id: EntityId) -> KernelResult<&mut Slot> {
        if id.context != self.id {
            return Err(KernelError::ForeignEntity(id));
        }
        self.slots
            .get_mut(id.index as usize)
            .and_then(Option::as_mut)
            .ok_or(KernelError::EntityNotFound(id))
    }

    /// Ids of every live entity, in creation order
    pub(crate) fn live_ids(&self) -> Vec<EntityId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| EntityId {
                context: self.id,
                index: i as u32,
            })
            .collect()
    }

    fn insert(&mut self, entity: Entity) -> KernelResult<EntityId> {
        for child in entity.references() {
            self.slot_mut(child)?.refs += 1;
        }
        let index = u32::try_from(self.slots.len())
            .map_err(|_| KernelError::InvalidTopology("context is full".into()))?;
        self.slots.push(Some(Slot {
            entity,
            velocity: None,
            refs: 0,
            released: false,
        }));
        Ok(EntityId {
            context: self.id,
            index,
        })
    }

    /// Class of an entity
    pub fn class_of(&self, id: EntityId) -> KernelResult<ObjectClass> {
        Ok(self.slot(id)?.entity.class())
    }

    fn expect_class(&self, id: EntityId, expected: ObjectClass) -> KernelResult<()> {
        let actual = self.class_of(id)?;
        if actual != expected {
            return Err(KernelError::InvalidClass {
                id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Create a curve or surface from its defining data
    pub fn make_geometry(&mut self, gtype: GeometryType, data: Vec<f64>) -> KernelResult<EntityId> {
        if data.len() != gtype.data_len() {
            return Err(KernelError::InvalidData {
                what: format!("{gtype:?} data"),
                expected: gtype.data_len(),
                actual: data.len(),
            });
        }
        if data.iter().any(|d| !d.is_finite()) {
            return Err(KernelError::InvalidParameters(format!(
                "{gtype:?} data is not finite"
            )));
        }
        self.insert(Entity::Geometry(GeometryParts { gtype, data }))
    }

    /// Decompose a curve or surface
    pub fn get_geometry(&self, id: EntityId) -> KernelResult<&GeometryParts> {
        match &self.slot(id)?.entity {
            Entity::Geometry(g) => Ok(g),
            Entity::Topology(t) => Err(KernelError::InvalidClass {
                id,
                expected: ObjectClass::Curve,
                actual: t.mtype.class(),
            }),
        }
    }

    /// Create a topological entity from its parts
    pub fn make_topology(&mut self, parts: &TopologyParts) -> KernelResult<EntityId> {
        self.validate_topology(parts)?;
        self.insert(Entity::Topology(parts.clone()))
    }

    /// Decompose a topological entity
    pub fn get_topology(&self, id: EntityId) -> KernelResult<&TopologyParts> {
        match &self.slot(id)?.entity {
            Entity::Topology(t) => Ok(t),
            Entity::Geometry(g) => Err(KernelError::InvalidClass {
                id,
                expected: ObjectClass::Node,
                actual: g.gtype.class(),
            }),
        }
    }

    fn validate_topology(&self, parts: &TopologyParts) -> KernelResult<()> {
        let mtype = parts.mtype;
        let class = mtype.class();
        let invalid = |msg: &str| Err(KernelError::InvalidTopology(format!("{class}: {msg}")));

        if parts.data.len() != mtype.data_len() {
            return Err(KernelError::InvalidData {
                what: format!("{class} data"),
                expected: mtype.data_len(),
                actual: parts.data.len(),
            });
        }
        if parts.data.iter().any(|d| !d.is_finite()) {
            return invalid("data is not finite");
        }

        let wants_senses = matches!(mtype, TopoType::Loop { .. } | TopoType::Face(_));
        let senses_ok = if wants_senses {
            parts.senses.len() == parts.children.len()
        } else {
            parts.senses.is_empty()
        };
        if !senses_ok {
            return invalid("senses do not match children");
        }

        let (geometry_class, child_class) = match mtype {
            TopoType::Node => (None, None),
            TopoType::Edge(_) => (Some(ObjectClass::Curve), Some(ObjectClass::Node)),
            TopoType::Loop { .. } => (None, Some(ObjectClass::Edge)),
            TopoType::Face(_) => (Some(ObjectClass::Surface), Some(ObjectClass::Loop)),
            TopoType::Shell { .. } => (None, Some(ObjectClass::Face)),
            TopoType::Body(BodyClass::NodeBody) => (None, Some(ObjectClass::Node)),
            TopoType::Body(BodyClass::WireBody) => (None, Some(ObjectClass::Loop)),
            TopoType::Body(_) => (None, Some(ObjectClass::Shell)),
        };

        match (geometry_class, parts.geometry) {
            (None, None) => {}
            (Some(expected), Some(geometry)) => self.expect_class(geometry, expected)?,
            (Some(_), None) => return invalid("missing geometry"),
            (None, Some(_)) => return invalid("unexpected geometry"),
        }

        match child_class {
            None if !parts.children.is_empty() => return invalid("unexpected children"),
            None => {}
            Some(expected) => {
                for &child in &parts.children {
                    self.expect_class(child, expected)?;
                }
            }
        }

        let count_ok = match mtype {
            TopoType::Node => true,
            TopoType::Edge(EdgeType::TwoNode) => parts.children.len() == 2,
            TopoType::Edge(EdgeType::OneNode) => parts.children.len() == 1,
            TopoType::Body(BodyClass::NodeBody) | TopoType::Body(BodyClass::WireBody) => {
                parts.children.len() == 1
            }
            _ => !parts.children.is_empty(),
        };
        if !count_ok {
            return invalid("wrong number of children");
        }
        Ok(())
    }

    /// Create a node at a position
    pub fn make_node(&mut self, position: DVec3) -> KernelResult<EntityId> {
        self.make_topology(&TopologyParts {
            mtype: TopoType::Node,
            geometry: None,
            data: position.to_array().to_vec(),
            children: Vec::new(),
            senses: Vec::new(),
        })
    }

    /// Create an edge over `range` of a curve, bounded by one or two nodes
    pub fn make_edge(
        &mut self,
        curve: EntityId,
        nodes: &[EntityId],
        range: [f64; 2],
    ) -> KernelResult<EntityId> {
        let etype = if nodes.len() == 1 {
            EdgeType::OneNode
        } else {
            EdgeType::TwoNode
        };
        self.make_topology(&TopologyParts {
            mtype: TopoType::Edge(etype),
            geometry: Some(curve),
            data: range.to_vec(),
            children: nodes.to_vec(),
            senses: Vec::new(),
        })
    }

    /// Create a loop from oriented edges
    pub fn make_loop(
        &mut self,
        edges: &[EntityId],
        senses: &[Sense],
        closed: bool,
    ) -> KernelResult<EntityId> {
        self.make_topology(&TopologyParts {
            mtype: TopoType::Loop { closed },
            geometry: None,
            data: Vec::new(),
            children: edges.to_vec(),
            senses: senses.to_vec(),
        })
    }

    /// Create a face on a surface bounded by loops
    ///
    /// The first loop with a forward sense is the outer boundary.
    pub fn make_face(
        &mut self,
        surface: EntityId,
        sense: Sense,
        loops: &[EntityId],
        loop_senses: &[Sense],
        uv: [f64; 4],
    ) -> KernelResult<EntityId> {
        self.make_topology(&TopologyParts {
            mtype: TopoType::Face(sense),
            geometry: Some(surface),
            data: uv.to_vec(),
            children: loops.to_vec(),
            senses: loop_senses.to_vec(),
        })
    }

    pub fn make_shell(&mut self, faces: &[EntityId], closed: bool) -> KernelResult<EntityId> {
        self.make_topology(&TopologyParts {
            mtype: TopoType::Shell { closed },
            geometry: None,
            data: Vec::new(),
            children: faces.to_vec(),
            senses: Vec::new(),
        })
    }

    pub fn make_body(&mut self, class: BodyClass, children: &[EntityId]) -> KernelResult<EntityId> {
        self.make_topology(&TopologyParts {
            mtype: TopoType::Body(class),
            geometry: None,
            data: Vec::new(),
            children: children.to_vec(),
            senses: Vec::new(),
        })
    }

    /// Position of a node
    pub fn node_position(&self, node: EntityId) -> KernelResult<DVec3> {
        self.expect_class(node, ObjectClass::Node)?;
        let parts = self.get_topology(node)?;
        Ok(DVec3::new(parts.data[0], parts.data[1], parts.data[2]))
    }

    /// Curve or surface referenced by an edge or face
    pub fn geometry_of(&self, id: EntityId) -> KernelResult<EntityId> {
        let parts = self.get_topology(id)?;
        parts.geometry.ok_or_else(|| {
            KernelError::InvalidTopology(format!("{} {id} has no geometry", parts.mtype.class()))
        })
    }

    /// Numeric data that the velocity store attaches a derivative to
    pub fn defining_data(&self, id: EntityId) -> KernelResult<Vec<f64>> {
        match &self.slot(id)?.entity {
            Entity::Geometry(g) => Ok(g.data.clone()),
            Entity::Topology(t) => Ok(t.data.clone()),
        }
    }

    /// Children of a body of the given class, in first-visit order
    ///
    /// The walk goes body, shells, faces, loops, edges, nodes, depth first,
    /// so two bodies assembled the same way list their children identically.
    pub fn body_children(&self, body: EntityId, class: ObjectClass) -> KernelResult<Vec<EntityId>> {
        self.expect_class(body, ObjectClass::Body)?;
        if matches!(
            class,
            ObjectClass::Curve | ObjectClass::Surface | ObjectClass::Body
        ) {
            return Err(KernelError::InvalidTopology(format!(
                "bodies do not list {class} children"
            )));
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut stack: Vec<EntityId> = self.get_topology(body)?.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let parts = self.get_topology(id)?;
            if parts.mtype.class() == class {
                found.push(id);
            }
            stack.extend(parts.children.iter().rev().copied());
        }
        Ok(found)
    }

    /// Start node of every edge in a loop, following the edge senses
    pub fn loop_vertices(&self, lp: EntityId) -> KernelResult<Vec<EntityId>> {
        self.expect_class(lp, ObjectClass::Loop)?;
        let parts = self.get_topology(lp)?;
        parts
            .children
            .iter()
            .zip(&parts.senses)
            .map(|(&edge, &sense)| {
                let nodes = &self.get_topology(edge)?.children;
                let node = match sense {
                    Sense::Forward => nodes.first(),
                    Sense::Reverse => nodes.last(),
                };
                node.copied()
                    .ok_or_else(|| KernelError::InvalidTopology(format!("edge {edge} has no nodes")))
            })
            .collect()
    }

    /// Parametric range of an edge `[t0, t1]` or face `[u0, u1, v0, v1]`
    pub fn get_range(&self, id: EntityId) -> KernelResult<Vec<f64>> {
        let parts = self.get_topology(id)?;
        match parts.mtype {
            TopoType::Edge(_) | TopoType::Face(_) => Ok(parts.data.clone()),
            other => Err(KernelError::InvalidClass {
                id,
                expected: ObjectClass::Edge,
                actual: other.class(),
            }),
        }
    }

    /// Evaluate position and partials of a node, curve, surface, edge or face
    pub fn evaluate(&self, id: EntityId, params: &[f64]) -> KernelResult<Evaluation> {
        match &self.slot(id)?.entity {
            Entity::Geometry(g) => evaluate(g.gtype, &g.data, params),
            Entity::Topology(t) => match t.mtype {
                TopoType::Node => Ok(Evaluation::at(self.node_position(id)?)),
                TopoType::Edge(_) | TopoType::Face(_) => {
                    let g = self.get_geometry(self.geometry_of(id)?)?;
                    evaluate(g.gtype, &g.data, params)
                }
                other => Err(KernelError::Evaluation(format!(
                    "cannot evaluate a {}",
                    other.class()
                ))),
            },
        }
    }

    /// Release the caller's handle on an entity
    ///
    /// The entity is freed at once when nothing references it; otherwise it
    /// is freed when its last parent goes away.
    pub fn delete(&mut self, id: EntityId) -> KernelResult<()> {
        let slot = self.slot_mut(id)?;
        if slot.released {
            return Err(KernelError::InvalidTopology(format!(
                "{} {id} was already released",
                slot.entity.class()
            )));
        }
        slot.released = true;
        if slot.refs == 0 {
            self.free(id);
        }
        Ok(())
    }

    fn free(&mut self, id: EntityId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slots.get_mut(id.index as usize).and_then(Option::take) else {
                continue;
            };
            for child in slot.entity.references() {
                if let Ok(child_slot) = self.slot_mut(child) {
                    child_slot.refs = child_slot.refs.saturating_sub(1);
                    if child_slot.refs == 0 && child_slot.released {
                        pending.push(child);
                    }
                }
            }
        }
    }
}
