//! Sensitivity propagation
//!
//! Each constructive operation comes as a pair: a builder that creates the
//! entity and a `*_dot` routine that sets its velocity from the velocities of
//! the entities it was built from. The caller runs the `*_dot` routines in
//! dependency order (nodes, then curves and edges, then loops and faces);
//! a routine whose inputs lack velocity fails with `VelocityNotSet`.

mod face;
mod remake;
mod solid;

pub use face::{face_from_loop_dot, make_face_from_loop, make_sheet_body};
pub use remake::remake_topology;
pub use solid::solid_primitive_dot;

use glam::DVec3;

use crate::error::{SensError, SensResult};
use crate::kernel::KernelError;
use crate::model::{Context, EntityId, GeometryType, Sense, TempScope, TopoType};

/// Defining data of a line through two points, its range, and their velocities
#[derive(Debug, Clone, PartialEq)]
pub struct LineVelocity {
    pub data: [f64; 6],
    pub data_dot: [f64; 6],
    pub range: [f64; 2],
    pub range_dot: [f64; 2],
}

fn line_data(p1: DVec3, p2: DVec3) -> [f64; 6] {
    let d = p2 - p1;
    [p1.x, p1.y, p1.z, d.x, d.y, d.z]
}

/// Chain rule for a line from `p1` to `p2`
///
/// The line is `(origin = p1, direction = p2 - p1)` over `[0, |direction|]`,
/// so its velocity is `(p1_dot, p2_dot - p1_dot)` and the upper range bound
/// moves at `direction . direction_dot / |direction|`.
pub fn line_velocity(p1: DVec3, p2: DVec3, p1_dot: DVec3, p2_dot: DVec3) -> SensResult<LineVelocity> {
    let d = p2 - p1;
    let length = d.length();
    if length == 0.0 {
        return Err(SensError::UnsupportedConstruction(
            "line between coincident points".into(),
        ));
    }
    let d_dot = p2_dot - p1_dot;
    Ok(LineVelocity {
        data: line_data(p1, p2),
        data_dot: line_data(p1_dot, p2_dot),
        range: [0.0, length],
        range_dot: [0.0, d.dot(d_dot) / length],
    })
}

/// Build a straight edge between two nodes
///
/// The line geometry is tracked as a temporary of `scope`; the edge is not.
pub fn make_line_edge(scope: &mut TempScope<'_>, n1: EntityId, n2: EntityId) -> SensResult<EntityId> {
    let (p1, p2) = (scope.node_position(n1)?, scope.node_position(n2)?);
    let length = (p2 - p1).length();
    if length == 0.0 {
        return Err(KernelError::InvalidParameters(format!("nodes {n1} and {n2} coincide")).into());
    }
    let data = line_data(p1, p2).to_vec();
    let curve = scope.temp(|ctx| ctx.make_geometry(GeometryType::Line, data))?;
    Ok(scope.make_edge(curve, &[n1, n2], [0.0, length])?)
}

/// Set the velocity of a straight edge and its line from its nodes
pub fn line_edge_dot(ctx: &mut Context, edge: EntityId) -> SensResult<()> {
    let parts = ctx.get_topology(edge)?;
    let (TopoType::Edge(_), Some(curve), [n1, n2]) =
        (parts.mtype, parts.geometry, parts.children.as_slice())
    else {
        return Err(SensError::UnsupportedConstruction(format!(
            "{edge} is not a two-node edge"
        )));
    };
    let (n1, n2) = (*n1, *n2);

    let gtype = ctx.get_geometry(curve)?.gtype;
    if gtype != GeometryType::Line {
        return Err(SensError::UnsupportedConstruction(format!(
            "no derivative rule for edges on a {gtype:?}"
        )));
    }

    let (v1, v2) = (ctx.velocity(n1)?, ctx.velocity(n2)?);
    let line = line_velocity(
        DVec3::from_slice(&v1.data),
        DVec3::from_slice(&v2.data),
        DVec3::from_slice(&v1.data_dot),
        DVec3::from_slice(&v2.data_dot),
    )?;
    ctx.set_velocity(curve, &line.data, &line.data_dot)?;
    ctx.set_velocity(edge, &line.range, &line.range_dot)?;
    Ok(())
}

/// Build a closed loop of straight edges through `points`
///
/// Nodes, lines and edges are tracked as temporaries of `scope`; they stay
/// alive through the returned loop.
pub fn make_planar_loop(scope: &mut TempScope<'_>, points: &[DVec3]) -> SensResult<EntityId> {
    if points.len() < 3 {
        return Err(SensError::UnsupportedConstruction(format!(
            "a planar loop needs at least 3 points, got {}",
            points.len()
        )));
    }
    let mut nodes = Vec::with_capacity(points.len());
    for &p in points {
        nodes.push(scope.temp(|ctx| ctx.make_node(p))?);
    }
    let mut edges = Vec::with_capacity(points.len());
    for (i, &n1) in nodes.iter().enumerate() {
        let n2 = nodes[(i + 1) % nodes.len()];
        let edge = make_line_edge(scope, n1, n2)?;
        edges.push(scope.push(edge));
    }
    let senses = vec![Sense::Forward; edges.len()];
    Ok(scope.make_loop(&edges, &senses, true)?)
}

/// Set the velocity of every straight edge of a loop from its nodes
pub fn loop_dot(ctx: &mut Context, lp: EntityId) -> SensResult<()> {
    let edges = ctx.get_topology(lp)?.children.clone();
    for edge in edges {
        line_edge_dot(ctx, edge)?;
    }
    Ok(())
}

/// Set node velocities of a planar loop, then propagate to its edges
///
/// `point_dots` is parallel to [`Context::loop_vertices`].
pub fn planar_loop_dot(ctx: &mut Context, lp: EntityId, point_dots: &[DVec3]) -> SensResult<()> {
    let vertices = ctx.loop_vertices(lp)?;
    if vertices.len() != point_dots.len() {
        return Err(SensError::ShapeMismatch {
            what: format!("loop {lp} point velocities"),
            expected: vertices.len(),
            actual: point_dots.len(),
        });
    }
    for (&node, dot) in vertices.iter().zip(point_dots) {
        ctx.set_velocity_dot(node, &dot.to_array())?;
    }
    loop_dot(ctx, lp)
}
