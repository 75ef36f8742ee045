//! Analytic reference kernel
//!
//! Builds box, sphere, cone, cylinder and torus solids from closed-form
//! recipes. Each recipe is evaluated on dual numbers, so the same code that
//! lays out a primitive's nodes, curves and surfaces also yields their exact
//! derivative with respect to the primitive's parameters.

use glam::DVec3;
use std::f64::consts::{FRAC_PI_2, TAU};

use super::tessellate;
use super::traits::{
    BodyVelocity, CadKernel, EdgeVelocity, FaceVelocity, KernelError, KernelResult, Primitive,
    PrimitiveDerivative, PrimitiveKind, TessQuality, Tessellation,
};
use crate::dual::{Dual, Dual3, join, split};
use crate::model::{BodyClass, Context, EntityId, GeometryType, Sense, TempScope};

#[derive(Debug, Clone)]
struct EdgeRecipe {
    curve: GeometryType,
    data: Vec<Dual>,
    nodes: Vec<usize>,
    range: [Dual; 2],
}

#[derive(Debug, Clone)]
struct FaceRecipe {
    surface: GeometryType,
    data: Vec<Dual>,
    loops: Vec<Vec<(usize, Sense)>>,
    uv: [Dual; 4],
}

/// Nodes, edges and faces of one primitive solid
#[derive(Debug, Clone, Default)]
struct Recipe {
    nodes: Vec<Dual3>,
    edges: Vec<EdgeRecipe>,
    faces: Vec<FaceRecipe>,
}

fn pack(vectors: &[Dual3], scalars: &[Dual]) -> Vec<Dual> {
    let mut data = Vec::with_capacity(vectors.len() * 3 + scalars.len());
    for v in vectors {
        v.extend_into(&mut data);
    }
    data.extend_from_slice(scalars);
    data
}

fn full_turn() -> [Dual; 2] {
    [Dual::ZERO, Dual::constant(TAU)]
}

fn disk(radius: Dual) -> [Dual; 4] {
    [-radius, radius, -radius, radius]
}

impl Recipe {
    fn node(&mut self, position: Dual3) -> usize {
        self.nodes.push(position);
        self.nodes.len() - 1
    }

    fn edge(&mut self, curve: GeometryType, data: Vec<Dual>, nodes: &[usize], range: [Dual; 2]) -> usize {
        self.edges.push(EdgeRecipe {
            curve,
            data,
            nodes: nodes.to_vec(),
            range,
        });
        self.edges.len() - 1
    }

    /// Straight edge between two nodes, parameterised by arc length
    fn line(&mut self, from: usize, to: usize) -> usize {
        let origin = self.nodes[from];
        let direction = self.nodes[to] - origin;
        let length = direction.length();
        self.edge(
            GeometryType::Line,
            pack(&[origin, direction], &[]),
            &[from, to],
            [Dual::ZERO, length],
        )
    }

    fn face(&mut self, surface: GeometryType, data: Vec<Dual>, boundary: Vec<(usize, Sense)>, uv: [Dual; 4]) {
        self.faces.push(FaceRecipe {
            surface,
            data,
            loops: vec![boundary],
            uv,
        });
    }

    /// Edge joining two nodes, with the sense that walks from `a` to `b`
    fn find_edge(&self, a: usize, b: usize) -> KernelResult<(usize, Sense)> {
        self.edges
            .iter()
            .enumerate()
            .find_map(|(i, e)| match e.nodes.as_slice() {
                [s, t] if (*s, *t) == (a, b) => Some((i, Sense::Forward)),
                [s, t] if (*s, *t) == (b, a) => Some((i, Sense::Reverse)),
                _ => None,
            })
            .ok_or_else(|| KernelError::InvalidTopology(format!("no edge joins nodes {a} and {b}")))
    }

    /// Renumber nodes and edges into the depth-first order of the body walk
    fn canonical(self) -> Recipe {
        let mut edge_order = Vec::with_capacity(self.edges.len());
        let mut node_order = Vec::with_capacity(self.nodes.len());
        let mut edge_seen = vec![false; self.edges.len()];
        let mut node_seen = vec![false; self.nodes.len()];

        for face in &self.faces {
            for &(e, _) in face.loops.iter().flatten() {
                if std::mem::replace(&mut edge_seen[e], true) {
                    continue;
                }
                edge_order.push(e);
                for &n in &self.edges[e].nodes {
                    if !std::mem::replace(&mut node_seen[n], true) {
                        node_order.push(n);
                    }
                }
            }
        }

        let mut node_map = vec![0; self.nodes.len()];
        for (new, &old) in node_order.iter().enumerate() {
            node_map[old] = new;
        }
        let mut edge_map = vec![0; self.edges.len()];
        for (new, &old) in edge_order.iter().enumerate() {
            edge_map[old] = new;
        }

        Recipe {
            nodes: node_order.iter().map(|&i| self.nodes[i]).collect(),
            edges: edge_order
                .iter()
                .map(|&i| {
                    let e = &self.edges[i];
                    EdgeRecipe {
                        nodes: e.nodes.iter().map(|&n| node_map[n]).collect(),
                        ..e.clone()
                    }
                })
                .collect(),
            faces: self
                .faces
                .iter()
                .map(|f| FaceRecipe {
                    loops: f
                        .loops
                        .iter()
                        .map(|lp| lp.iter().map(|&(e, s)| (edge_map[e], s)).collect())
                        .collect(),
                    ..f.clone()
                })
                .collect(),
        }
    }
}

/// Right- or left-handed frame around an axis
///
/// The reference axis switches at `|z.x| = 0.9`, so the derivative of the
/// frame only holds for axes away from that switch.
fn frame(axis: Dual3, sign: f64) -> (Dual3, Dual3, Dual3) {
    let z = axis.normalize();
    let reference = if z.x.re.abs() < 0.9 { DVec3::X } else { DVec3::Y };
    let reference = Dual3::constant(reference);
    let x = (reference - z * z.dot(reference)).normalize();
    let y = z.cross(x) * sign;
    (x, y, z)
}

fn point(p: &[Dual], offset: usize) -> Dual3 {
    Dual3::from_slice(p, offset)
}

fn require(ok: bool, msg: &str) -> KernelResult<()> {
    if ok {
        Ok(())
    } else {
        Err(KernelError::InvalidParameters(msg.into()))
    }
}

// (origin node, u axis, v axis, boundary cycle)
const BOX_FACES: [(usize, usize, usize, [usize; 4]); 6] = [
    (0, 2, 1, [0, 4, 6, 2]),
    (1, 1, 2, [1, 3, 7, 5]),
    (0, 0, 2, [0, 1, 5, 4]),
    (2, 2, 0, [2, 6, 7, 3]),
    (0, 1, 0, [0, 2, 3, 1]),
    (4, 0, 1, [4, 5, 7, 6]),
];

fn box_recipe(p: &[Dual], sign: f64) -> KernelResult<Recipe> {
    let base = point(p, 0);
    let extents = [p[3], p[4], p[5]];
    require(extents.iter().all(|e| e.re > 0.0), "box extents must be positive")?;
    let axes = [DVec3::X, DVec3::Y, DVec3::Z].map(Dual3::constant);

    let mut recipe = Recipe::default();
    // node i + 2j + 4k sits at base + i*dx + j*dy + k*dz
    for index in 0..8usize {
        let offset = (0..3).fold(Dual3::ZERO, |acc, a| {
            let bit = ((index >> a) & 1) as f64;
            acc + axes[a] * (extents[a] * bit)
        });
        recipe.node(base + offset);
    }
    for a in 0..3 {
        for index in (0..8usize).filter(|i| i & (1 << a) == 0) {
            recipe.line(index, index | (1 << a));
        }
    }

    for (origin, u, v, cycle) in BOX_FACES {
        let (u, v, cycle) = if sign > 0.0 {
            (u, v, cycle)
        } else {
            let [a, b, c, d] = cycle;
            (v, u, [a, d, c, b])
        };
        let boundary = (0..4)
            .map(|i| recipe.find_edge(cycle[i], cycle[(i + 1) % 4]))
            .collect::<KernelResult<Vec<_>>>()?;
        let data = pack(&[recipe.nodes[origin], axes[u], axes[v]], &[]);
        let uv = [Dual::ZERO, extents[u], Dual::ZERO, extents[v]];
        recipe.face(GeometryType::Plane, data, boundary, uv);
    }
    Ok(recipe)
}

fn sphere_recipe(p: &[Dual], sign: f64) -> KernelResult<Recipe> {
    let centre = point(p, 0);
    let radius = p[3];
    require(radius.re > 0.0, "sphere radius must be positive")?;
    let x = Dual3::constant(DVec3::X);
    let y = Dual3::constant(DVec3::Y * sign);
    let z = Dual3::constant(DVec3::Z);

    let mut recipe = Recipe::default();
    let south = recipe.node(centre - z * radius);
    let north = recipe.node(centre + z * radius);
    let meridian = recipe.edge(
        GeometryType::Circle,
        pack(&[centre, x, z], &[radius]),
        &[south, north],
        [Dual::constant(-FRAC_PI_2), Dual::constant(FRAC_PI_2)],
    );
    recipe.face(
        GeometryType::Sphere,
        pack(&[centre, x, y, z], &[radius]),
        vec![(meridian, Sense::Forward), (meridian, Sense::Reverse)],
        [
            Dual::ZERO,
            Dual::constant(TAU),
            Dual::constant(-FRAC_PI_2),
            Dual::constant(FRAC_PI_2),
        ],
    );
    Ok(recipe)
}

fn cylinder_recipe(p: &[Dual], sign: f64) -> KernelResult<Recipe> {
    let (bottom_centre, top_centre, radius) = (point(p, 0), point(p, 3), p[6]);
    let axis = top_centre - bottom_centre;
    let height = axis.length();
    require(height.re > 0.0, "cylinder axis must have length")?;
    require(radius.re > 0.0, "cylinder radius must be positive")?;
    let (x, y, z) = frame(axis, sign);

    let mut recipe = Recipe::default();
    let n0 = recipe.node(bottom_centre + x * radius);
    let n1 = recipe.node(top_centre + x * radius);
    let bottom = recipe.edge(
        GeometryType::Circle,
        pack(&[bottom_centre, x, y], &[radius]),
        &[n0],
        full_turn(),
    );
    let seam = recipe.line(n0, n1);
    let top = recipe.edge(
        GeometryType::Circle,
        pack(&[top_centre, x, y], &[radius]),
        &[n1],
        full_turn(),
    );

    recipe.face(
        GeometryType::Cylinder,
        pack(&[bottom_centre, x, y, z], &[radius]),
        vec![
            (bottom, Sense::Forward),
            (seam, Sense::Forward),
            (top, Sense::Reverse),
            (seam, Sense::Reverse),
        ],
        [Dual::ZERO, Dual::constant(TAU), Dual::ZERO, height],
    );
    recipe.face(
        GeometryType::Plane,
        pack(&[bottom_centre, x, -y], &[]),
        vec![(bottom, Sense::Reverse)],
        disk(radius),
    );
    recipe.face(
        GeometryType::Plane,
        pack(&[top_centre, x, y], &[]),
        vec![(top, Sense::Forward)],
        disk(radius),
    );
    Ok(recipe)
}

fn cone_recipe(p: &[Dual], sign: f64) -> KernelResult<Recipe> {
    let (apex, base_centre, radius) = (point(p, 0), point(p, 3), p[6]);
    let axis = base_centre - apex;
    let height = axis.length();
    require(height.re > 0.0, "cone axis must have length")?;
    require(radius.re > 0.0, "cone radius must be positive")?;
    let (x, y, z) = frame(axis, sign);
    let slope = radius / height;

    let mut recipe = Recipe::default();
    let tip = recipe.node(apex);
    let rim = recipe.node(base_centre + x * radius);
    let seam = recipe.line(tip, rim);
    let circle = recipe.edge(
        GeometryType::Circle,
        pack(&[base_centre, x, y], &[radius]),
        &[rim],
        full_turn(),
    );

    recipe.face(
        GeometryType::Cone,
        pack(&[apex, x, y, z], &[slope]),
        vec![
            (seam, Sense::Forward),
            (circle, Sense::Reverse),
            (seam, Sense::Reverse),
        ],
        [Dual::ZERO, Dual::constant(TAU), Dual::ZERO, height],
    );
    recipe.face(
        GeometryType::Plane,
        pack(&[base_centre, x, y], &[]),
        vec![(circle, Sense::Forward)],
        disk(radius),
    );
    Ok(recipe)
}

fn torus_recipe(p: &[Dual], sign: f64) -> KernelResult<Recipe> {
    let (centre, axis, major, minor) = (point(p, 0), point(p, 3), p[6], p[7]);
    require(axis.length().re > 0.0, "torus axis must have length")?;
    require(minor.re > 0.0, "torus minor radius must be positive")?;
    require(minor.re < major.re, "torus minor radius must be below the major radius")?;
    let (x, y, z) = frame(axis, sign);

    let mut recipe = Recipe::default();
    let node = recipe.node(centre + x * (major + minor));
    let outer = recipe.edge(
        GeometryType::Circle,
        pack(&[centre, x, y], &[major + minor]),
        &[node],
        full_turn(),
    );
    let section = recipe.edge(
        GeometryType::Circle,
        pack(&[centre + x * major, x, z], &[minor]),
        &[node],
        full_turn(),
    );

    recipe.face(
        GeometryType::Torus,
        pack(&[centre, x, y, z], &[major, minor]),
        vec![
            (outer, Sense::Forward),
            (section, Sense::Forward),
            (outer, Sense::Reverse),
            (section, Sense::Reverse),
        ],
        [Dual::ZERO, Dual::constant(TAU), Dual::ZERO, Dual::constant(TAU)],
    );
    Ok(recipe)
}

fn recipe(primitive: &Primitive, params_dot: &[f64]) -> KernelResult<Recipe> {
    let expected = primitive.kind.param_count();
    for (what, len) in [("parameters", primitive.params.len()), ("parameter velocity", params_dot.len())] {
        if len != expected {
            return Err(KernelError::InvalidData {
                what: format!("{:?} {what}", primitive.kind),
                expected,
                actual: len,
            });
        }
    }
    require(
        primitive.params.iter().chain(params_dot).all(|v| v.is_finite()),
        "primitive parameters must be finite",
    )?;

    let p = join(&primitive.params, params_dot);
    let sign = primitive.orientation.sign();
    let recipe = match primitive.kind {
        PrimitiveKind::Box => box_recipe(&p, sign)?,
        PrimitiveKind::Sphere => sphere_recipe(&p, sign)?,
        PrimitiveKind::Cone => cone_recipe(&p, sign)?,
        PrimitiveKind::Cylinder => cylinder_recipe(&p, sign)?,
        PrimitiveKind::Torus => torus_recipe(&p, sign)?,
    };
    Ok(recipe.canonical())
}

/// Pure-Rust kernel for the analytic primitives
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticKernel;

impl AnalyticKernel {
    pub fn new() -> Self {
        Self
    }
}

impl PrimitiveDerivative for AnalyticKernel {
    fn solid_velocity(&self, primitive: &Primitive, params_dot: &[f64]) -> KernelResult<BodyVelocity> {
        let recipe = recipe(primitive, params_dot)?;
        Ok(BodyVelocity {
            nodes: recipe.nodes.iter().map(|n| n.velocity()).collect(),
            edges: recipe
                .edges
                .iter()
                .map(|e| EdgeVelocity {
                    curve_dot: split(&e.data).1,
                    range_dot: e.range.map(|r| r.eps),
                })
                .collect(),
            faces: recipe
                .faces
                .iter()
                .map(|f| FaceVelocity {
                    surface_dot: split(&f.data).1,
                    uv_dot: f.uv.map(|r| r.eps),
                })
                .collect(),
        })
    }
}

impl CadKernel for AnalyticKernel {
    fn name(&self) -> &str {
        "analytic"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn make_solid(&self, ctx: &mut Context, primitive: &Primitive) -> KernelResult<EntityId> {
        let recipe = recipe(primitive, &vec![0.0; primitive.params.len()])?;
        let mut scope = TempScope::new(ctx);

        let mut nodes = Vec::with_capacity(recipe.nodes.len());
        for n in &recipe.nodes {
            nodes.push(scope.temp(|ctx| ctx.make_node(n.value()))?);
        }

        let mut edges = Vec::with_capacity(recipe.edges.len());
        for e in &recipe.edges {
            let curve = scope.temp(|ctx| ctx.make_geometry(e.curve, split(&e.data).0))?;
            let bounds: Vec<EntityId> = e.nodes.iter().map(|&n| nodes[n]).collect();
            let range = e.range.map(|r| r.re);
            edges.push(scope.temp(|ctx| ctx.make_edge(curve, &bounds, range))?);
        }

        let mut faces = Vec::with_capacity(recipe.faces.len());
        for f in &recipe.faces {
            let mut loops = Vec::with_capacity(f.loops.len());
            for lp in &f.loops {
                let ids: Vec<EntityId> = lp.iter().map(|&(e, _)| edges[e]).collect();
                let senses: Vec<Sense> = lp.iter().map(|&(_, s)| s).collect();
                loops.push(scope.temp(|ctx| ctx.make_loop(&ids, &senses, true))?);
            }
            let surface = scope.temp(|ctx| ctx.make_geometry(f.surface, split(&f.data).0))?;
            let loop_senses = vec![Sense::Forward; loops.len()];
            let uv = f.uv.map(|r| r.re);
            faces.push(scope.temp(|ctx| ctx.make_face(surface, Sense::Forward, &loops, &loop_senses, uv))?);
        }

        let shell = scope.temp(|ctx| ctx.make_shell(&faces, true))?;
        let body = scope.make_body(BodyClass::SolidBody, &[shell])?;
        tracing::debug!(
            "Built {:?} solid {} ({} nodes, {} edges, {} faces)",
            primitive.kind,
            body,
            nodes.len(),
            edges.len(),
            faces.len()
        );
        Ok(body)
    }

    fn tessellate(&self, ctx: &Context, body: EntityId, quality: &TessQuality) -> KernelResult<Tessellation> {
        tessellate::tessellate_body(ctx, body, quality)
    }

    fn map_tessellation(&self, ctx: &Context, base: &Tessellation, body: EntityId) -> KernelResult<Tessellation> {
        tessellate::map_tessellation(ctx, base, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Orientation;
    use crate::model::ObjectClass;
    use approx::assert_abs_diff_eq;

    fn primitives() -> Vec<Primitive> {
        let o = Orientation::Outward;
        vec![
            Primitive::new(PrimitiveKind::Box, o, vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0]).unwrap(),
            Primitive::new(PrimitiveKind::Sphere, o, vec![1.0, 0.5, -0.5, 1.5]).unwrap(),
            Primitive::new(PrimitiveKind::Cone, o, vec![0.5, 0.25, 2.5, 0.5, 0.25, 0.5, 1.0]).unwrap(),
            Primitive::new(PrimitiveKind::Cylinder, o, vec![0.5, 0.25, 0.0, 0.5, 0.25, 2.0, 0.75])
                .unwrap(),
            Primitive::new(PrimitiveKind::Torus, o, vec![0.5, 0.25, 0.0, 0.0, 0.0, 1.0, 2.0, 0.5])
                .unwrap(),
        ]
    }

    fn values(prim: &Primitive) -> (Vec<DVec3>, Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let r = recipe(prim, &vec![0.0; prim.params.len()]).unwrap();
        let nodes = r.nodes.iter().map(|n| n.value()).collect();
        let edges = r
            .edges
            .iter()
            .map(|e| {
                let mut v = split(&e.data).0;
                v.extend(e.range.map(|d| d.re));
                v
            })
            .collect();
        let faces = r
            .faces
            .iter()
            .map(|f| {
                let mut v = split(&f.data).0;
                v.extend(f.uv.map(|d| d.re));
                v
            })
            .collect();
        (nodes, edges, faces)
    }

    #[test]
    fn test_topology_counts() {
        let expected = [(8, 12, 6), (2, 1, 1), (2, 2, 2), (2, 3, 3), (1, 2, 1)];
        let kernel = AnalyticKernel::new();
        for (prim, (n, e, f)) in primitives().iter().zip(expected) {
            let mut ctx = Context::new();
            let body = kernel.make_solid(&mut ctx, prim).unwrap();
            assert_eq!(ctx.body_children(body, ObjectClass::Node).unwrap().len(), n, "{:?}", prim.kind);
            assert_eq!(ctx.body_children(body, ObjectClass::Edge).unwrap().len(), e, "{:?}", prim.kind);
            assert_eq!(ctx.body_children(body, ObjectClass::Face).unwrap().len(), f, "{:?}", prim.kind);
        }
    }

    #[test]
    fn test_only_the_body_handle_is_held() {
        let kernel = AnalyticKernel::new();
        let mut ctx = Context::new();
        let body = kernel.make_solid(&mut ctx, &primitives()[0]).unwrap();
        assert!(ctx.live_count() > 1);
        ctx.delete(body).unwrap();
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn test_recipe_order_matches_body_children() {
        let kernel = AnalyticKernel::new();
        for prim in primitives() {
            let mut ctx = Context::new();
            let body = kernel.make_solid(&mut ctx, &prim).unwrap();
            let (nodes, _, _) = values(&prim);
            let ids = ctx.body_children(body, ObjectClass::Node).unwrap();
            for (id, expected) in ids.iter().zip(&nodes) {
                assert_eq!(ctx.node_position(*id).unwrap(), *expected, "{:?}", prim.kind);
            }

            let velocity = kernel.solid_velocity(&prim, &vec![0.0; prim.params.len()]).unwrap();
            let edges = ctx.body_children(body, ObjectClass::Edge).unwrap();
            for (edge, ev) in edges.iter().zip(&velocity.edges) {
                let curve = ctx.geometry_of(*edge).unwrap();
                assert_eq!(ctx.get_geometry(curve).unwrap().data.len(), ev.curve_dot.len());
            }
        }
    }

    #[test]
    fn test_solid_velocity_matches_central_differences() {
        let kernel = AnalyticKernel::new();
        let h = 1e-6;
        for prim in primitives() {
            for i in 0..prim.params.len() {
                let mut dot = vec![0.0; prim.params.len()];
                dot[i] = 1.0;
                let velocity = kernel.solid_velocity(&prim, &dot).unwrap();

                let shifted = |delta: f64| {
                    let mut params = prim.params.clone();
                    params[i] += delta;
                    values(&prim.with_params(params).unwrap())
                };
                let (plus, minus) = (shifted(h), shifted(-h));

                for (k, vel) in velocity.nodes.iter().enumerate() {
                    let fd = (plus.0[k] - minus.0[k]) / (2.0 * h);
                    assert!((fd - *vel).length() < 1e-6, "{:?} node {k} param {i}", prim.kind);
                }
                for (k, vel) in velocity.edges.iter().enumerate() {
                    let analytic: Vec<f64> = vel.curve_dot.iter().chain(&vel.range_dot).copied().collect();
                    for (c, a) in analytic.iter().enumerate() {
                        let fd = (plus.1[k][c] - minus.1[k][c]) / (2.0 * h);
                        assert_abs_diff_eq!(*a, fd, epsilon = 1e-6);
                    }
                }
                for (k, vel) in velocity.faces.iter().enumerate() {
                    let analytic: Vec<f64> = vel.surface_dot.iter().chain(&vel.uv_dot).copied().collect();
                    for (c, a) in analytic.iter().enumerate() {
                        let fd = (plus.2[k][c] - minus.2[k][c]) / (2.0 * h);
                        assert_abs_diff_eq!(*a, fd, epsilon = 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn test_inward_orientation_flips_normals() {
        let kernel = AnalyticKernel::new();
        for kind in [PrimitiveKind::Sphere, PrimitiveKind::Cylinder, PrimitiveKind::Cone] {
            let outward = primitives().into_iter().find(|p| p.kind == kind).unwrap();
            for orientation in [Orientation::Outward, Orientation::Inward] {
                let prim = Primitive::new(kind, orientation, outward.params.clone()).unwrap();
                let mut ctx = Context::new();
                let body = kernel.make_solid(&mut ctx, &prim).unwrap();
                let face = ctx.body_children(body, ObjectClass::Face).unwrap()[0];
                let eval = ctx.evaluate(face, &[0.7, 0.4]).unwrap();
                let normal = eval.du.cross(eval.dv);

                // radial direction away from the axis at the sample
                let surface = ctx.geometry_of(face).unwrap();
                let data = &ctx.get_geometry(surface).unwrap().data;
                let origin = DVec3::new(data[0], data[1], data[2]);
                let axis = DVec3::new(data[9], data[10], data[11]);
                let rel = eval.point - origin;
                let radial = rel - axis * rel.dot(axis);

                let facing = normal.dot(radial) * orientation.sign();
                assert!(facing > 0.0, "{kind:?} {orientation:?}");
            }
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let kernel = AnalyticKernel::new();
        let mut ctx = Context::new();
        let torus = Primitive::new(
            PrimitiveKind::Torus,
            Orientation::Outward,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0],
        )
        .unwrap();
        assert!(matches!(
            kernel.make_solid(&mut ctx, &torus),
            Err(KernelError::InvalidParameters(_))
        ));
        assert_eq!(ctx.live_count(), 0);

        let sphere = primitives()[1].clone();
        assert!(kernel.solid_velocity(&sphere, &[1.0]).is_err());
    }
}
