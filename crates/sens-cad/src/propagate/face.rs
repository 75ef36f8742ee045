//! Planar face spanned by a closed loop of straight edges

use glam::DVec3;

use crate::dual::{Dual, Dual3, split};
use crate::error::{SensError, SensResult};
use crate::model::{
    BodyClass, Context, EntityId, GeometryType, Sense, TempScope, TopoType,
};

/// Relative out-of-plane distance tolerated for loop vertices
const PLANAR_TOL: f64 = 1e-9;

/// Relative spread under which uv extremes count as tied
const TIE_TOL: f64 = 1e-12;

/// Plane data and uv box spanned by a polygon
///
/// Origin is the first vertex, the u axis runs along the first side, the
/// normal is the normalised Newell normal and the v axis completes a right
/// handed frame. The uv box bounds the projected vertices.
fn plane_recipe(vertices: &[Dual3]) -> SensResult<(Vec<Dual>, [Dual; 4])> {
    let origin = vertices[0];
    let side = vertices[1] - origin;
    if side.length().re == 0.0 {
        return Err(SensError::UnsupportedConstruction(
            "loop starts with a zero-length side".into(),
        ));
    }
    let x = side.normalize();

    let mut normal = Dual3::ZERO;
    for (i, &a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        normal = normal + (a - origin).cross(b - origin);
    }
    if normal.length().re == 0.0 {
        return Err(SensError::UnsupportedConstruction(
            "loop encloses no area".into(),
        ));
    }
    let normal = normal.normalize();
    let y = normal.cross(x).normalize();

    let (us, vs): (Vec<Dual>, Vec<Dual>) = vertices
        .iter()
        .map(|&p| {
            let r = p - origin;
            (r.dot(x), r.dot(y))
        })
        .unzip();
    let uv = [
        extreme(&us, f64::lt),
        extreme(&us, f64::gt),
        extreme(&vs, f64::lt),
        extreme(&vs, f64::gt),
    ];

    let mut data = Vec::with_capacity(GeometryType::Plane.data_len());
    origin.extend_into(&mut data);
    x.extend_into(&mut data);
    y.extend_into(&mut data);
    Ok((data, uv))
}

/// Minimum or maximum of a set of duals with its one-sided derivative
///
/// When several values tie for the extreme, a forward step keeps the one
/// that moves furthest in the winning direction, so the derivative is the
/// extreme velocity among the tied values.
fn extreme(values: &[Dual], better: fn(&f64, &f64) -> bool) -> Dual {
    let mut best = values[0].re;
    for v in values {
        if better(&v.re, &best) {
            best = v.re;
        }
    }
    let spread = values.iter().fold(0.0_f64, |m, v| m.max(v.re.abs()));
    let tol = TIE_TOL * (1.0 + spread);
    let mut eps: Option<f64> = None;
    for v in values.iter().filter(|v| (v.re - best).abs() <= tol) {
        eps = Some(match eps {
            Some(e) if !better(&v.eps, &e) => e,
            _ => v.eps,
        });
    }
    Dual::new(best, eps.unwrap_or(0.0))
}

/// Closed loop of straight edges, checked and with its vertex handles
fn line_loop_vertices(ctx: &Context, lp: EntityId) -> SensResult<Vec<EntityId>> {
    let parts = ctx.get_topology(lp)?;
    if parts.mtype != (TopoType::Loop { closed: true }) {
        return Err(SensError::UnsupportedConstruction(format!(
            "face from loop needs a closed loop, {lp} is {:?}",
            parts.mtype
        )));
    }
    for &edge in &parts.children {
        let curve = ctx.geometry_of(edge)?;
        let gtype = ctx.get_geometry(curve)?.gtype;
        if gtype != GeometryType::Line {
            return Err(SensError::UnsupportedConstruction(format!(
                "face from loop supports line edges only, edge {edge} is a {gtype:?}"
            )));
        }
    }
    let vertices = ctx.loop_vertices(lp)?;
    if vertices.len() < 3 {
        return Err(SensError::UnsupportedConstruction(format!(
            "loop {lp} has {} vertices, need at least 3",
            vertices.len()
        )));
    }
    Ok(vertices)
}

/// Build a planar face bounded by a closed loop of straight edges
///
/// The plane is tracked as a temporary of `scope`; the face is not.
pub fn make_face_from_loop(scope: &mut TempScope<'_>, lp: EntityId) -> SensResult<EntityId> {
    let vertices = line_loop_vertices(&**scope, lp)?;
    let points = vertices
        .iter()
        .map(|&n| Ok(scope.node_position(n)?))
        .collect::<SensResult<Vec<DVec3>>>()?;
    let duals: Vec<Dual3> = points.iter().map(|&p| Dual3::constant(p)).collect();
    let (data, uv) = plane_recipe(&duals)?;

    let normal = Dual3::from_slice(&data, 3)
        .cross(Dual3::from_slice(&data, 6))
        .value();
    let origin = points[0];
    let extent = points
        .iter()
        .fold(0.0_f64, |m, p| m.max((*p - origin).length()));
    for (&node, p) in vertices.iter().zip(&points) {
        let offset = (*p - origin).dot(normal).abs();
        if offset > PLANAR_TOL * (1.0 + extent) {
            return Err(SensError::UnsupportedConstruction(format!(
                "loop {lp} is not planar: node {node} is {offset:e} off its plane"
            )));
        }
    }

    let (values, _) = split(&data);
    let plane = scope.temp(|ctx| ctx.make_geometry(GeometryType::Plane, values))?;
    let face = scope.make_face(
        plane,
        Sense::Forward,
        &[lp],
        &[Sense::Forward],
        uv.map(|d| d.re),
    )?;
    tracing::debug!("Built face {} from loop {} with {} vertices", face, lp, vertices.len());
    Ok(face)
}

/// Set plane and uv box velocities of a face built by [`make_face_from_loop`]
///
/// Every node and edge of the loop must already carry velocity.
pub fn face_from_loop_dot(ctx: &mut Context, face: EntityId) -> SensResult<()> {
    let parts = ctx.get_topology(face)?;
    let (TopoType::Face(_), Some(surface), [lp]) =
        (parts.mtype, parts.geometry, parts.children.as_slice())
    else {
        return Err(SensError::UnsupportedConstruction(format!(
            "{face} is not a single-loop face"
        )));
    };
    let lp = *lp;
    let gtype = ctx.get_geometry(surface)?.gtype;
    if gtype != GeometryType::Plane {
        return Err(SensError::UnsupportedConstruction(format!(
            "no face-from-loop derivative for a {gtype:?} surface"
        )));
    }

    let vertices = line_loop_vertices(ctx, lp)?;
    ctx.require_velocity(lp)?;
    let points = vertices
        .iter()
        .map(|&n| {
            let v = ctx.velocity(n)?;
            Ok(Dual3::from_parts(
                DVec3::from_slice(&v.data),
                DVec3::from_slice(&v.data_dot),
            ))
        })
        .collect::<SensResult<Vec<Dual3>>>()?;
    let (data, uv) = plane_recipe(&points)?;

    let (values, dots) = split(&data);
    ctx.set_velocity(surface, &values, &dots)?;
    let (uv, uv_dot) = split(&uv);
    ctx.set_velocity(face, &uv, &uv_dot)?;
    Ok(())
}

/// Wrap a face into a sheet body through an open shell
///
/// The shell is tracked as a temporary of `scope`; the body is not.
pub fn make_sheet_body(scope: &mut TempScope<'_>, face: EntityId) -> SensResult<EntityId> {
    let shell = scope.temp(|ctx| ctx.make_shell(&[face], false))?;
    Ok(scope.make_body(BodyClass::SheetBody, &[shell])?)
}
