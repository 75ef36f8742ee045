//! Body tessellation and index-preserving mapping
//!
//! Edges are sampled uniformly in their parameter. Planar faces bounded by
//! straight edges get a centroid fan, each fan triangle filled with a
//! barycentric lattice; planar faces bounded by a single circle get a polar
//! grid; every other face gets a structured grid over its uv box.

use glam::DVec3;
use std::f64::consts::TAU;

use super::traits::{EdgeSamples, FaceSamples, KernelError, KernelResult, TessQuality, Tessellation};
use crate::model::{Context, EntityId, GeometryType, ObjectClass};

const MAX_SEGMENTS: usize = 64;
const PROBES: usize = 16;

fn lerp(a: f64, b: f64, s: f64) -> f64 {
    a + (b - a) * s
}

/// Segments needed for a polyline of `length` that turns through `turning` radians
pub fn segment_count(length: f64, turning: f64, quality: &TessQuality) -> usize {
    let mut n: f64 = 1.0;
    if quality.max_edge_length > 0.0 {
        n = n.max((length / quality.max_edge_length).ceil());
    }
    if quality.max_angle_deg > 0.0 {
        n = n.max((turning.to_degrees() / quality.max_angle_deg).ceil());
    }
    if quality.max_sag > 0.0 && turning > 0.0 {
        let radius = length / turning;
        if quality.max_sag < radius {
            let step = 2.0 * (1.0 - quality.max_sag / radius).acos();
            n = n.max((turning / step).ceil());
        }
    }
    (n as usize).clamp(1, MAX_SEGMENTS)
}

/// Length and total turning angle of a polyline
fn measure(points: &[DVec3]) -> (f64, f64) {
    let chords: Vec<DVec3> = points
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|c| c.length() > 0.0)
        .collect();
    let length = chords.iter().map(|c| c.length()).sum();
    let turning = chords.windows(2).map(|w| w[0].angle_between(w[1])).sum();
    (length, turning)
}

fn check_quality(quality: &TessQuality) -> KernelResult<()> {
    let values = [quality.max_edge_length, quality.max_sag, quality.max_angle_deg];
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(KernelError::TessellationFailed(format!(
            "quality parameters must be positive: {quality:?}"
        )));
    }
    Ok(())
}

fn points_at(ctx: &Context, id: EntityId, params: &[[f64; 2]], dims: usize) -> KernelResult<Vec<DVec3>> {
    params
        .iter()
        .map(|p| ctx.evaluate(id, &p[..dims]).map(|e| e.point))
        .collect()
}

/// Tessellate every edge and face of a body
pub fn tessellate_body(ctx: &Context, body: EntityId, quality: &TessQuality) -> KernelResult<Tessellation> {
    check_quality(quality)?;

    let edges = ctx
        .body_children(body, ObjectClass::Edge)?
        .into_iter()
        .map(|edge| tessellate_edge(ctx, edge, quality))
        .collect::<KernelResult<Vec<_>>>()?;
    let faces = ctx
        .body_children(body, ObjectClass::Face)?
        .into_iter()
        .map(|face| tessellate_face(ctx, face, quality))
        .collect::<KernelResult<Vec<_>>>()?;

    let tess = Tessellation {
        body,
        quality: *quality,
        edges,
        faces,
    };
    tracing::debug!(
        "Tessellated body {}: {} edges, {} faces, {} points",
        body,
        tess.edges.len(),
        tess.faces.len(),
        tess.point_count()
    );
    Ok(tess)
}

fn tessellate_edge(ctx: &Context, edge: EntityId, quality: &TessQuality) -> KernelResult<EdgeSamples> {
    let range = ctx.get_range(edge)?;
    let (t0, t1) = (range[0], range[1]);

    let probe: Vec<[f64; 2]> = (0..=PROBES)
        .map(|i| [lerp(t0, t1, i as f64 / PROBES as f64), 0.0])
        .collect();
    let (length, turning) = measure(&points_at(ctx, edge, &probe, 1)?);
    let n = segment_count(length, turning, quality);

    let t: Vec<f64> = (0..=n).map(|i| lerp(t0, t1, i as f64 / n as f64)).collect();
    let params: Vec<[f64; 2]> = t.iter().map(|&t| [t, 0.0]).collect();
    Ok(EdgeSamples {
        points: points_at(ctx, edge, &params, 1)?,
        t,
        range: [t0, t1],
    })
}

fn tessellate_face(ctx: &Context, face: EntityId, quality: &TessQuality) -> KernelResult<FaceSamples> {
    let range = ctx.get_range(face)?;
    let uv_box = [range[0], range[1], range[2], range[3]];
    let surface = ctx.get_geometry(ctx.geometry_of(face)?)?;

    let (uv, triangles) = if surface.gtype == GeometryType::Plane {
        match planar_boundary(ctx, face)? {
            PlanarBoundary::Polygon(corners) => polygon_lattice(ctx, &corners, &surface.data, quality)?,
            PlanarBoundary::Circle(curve) => polar_grid(ctx, curve, &surface.data, quality)?,
            PlanarBoundary::Other => uv_grid(ctx, face, uv_box, quality)?,
        }
    } else {
        uv_grid(ctx, face, uv_box, quality)?
    };

    Ok(FaceSamples {
        points: points_at(ctx, face, &uv, 2)?,
        uv,
        triangles,
        uv_box,
    })
}

enum PlanarBoundary {
    /// Corner nodes of a loop of straight edges
    Polygon(Vec<EntityId>),
    /// Curve of a single closed circular edge
    Circle(EntityId),
    Other,
}

fn planar_boundary(ctx: &Context, face: EntityId) -> KernelResult<PlanarBoundary> {
    let loops = &ctx.get_topology(face)?.children;
    let [lp] = loops.as_slice() else {
        return Ok(PlanarBoundary::Other);
    };
    let edges = &ctx.get_topology(*lp)?.children;
    let mut curves = Vec::with_capacity(edges.len());
    for &edge in edges {
        let curve = ctx.geometry_of(edge)?;
        curves.push((curve, ctx.get_geometry(curve)?.gtype));
    }

    if edges.len() >= 3 && curves.iter().all(|(_, g)| *g == GeometryType::Line) {
        return Ok(PlanarBoundary::Polygon(ctx.loop_vertices(*lp)?));
    }
    if let [(curve, GeometryType::Circle)] = curves.as_slice() {
        return Ok(PlanarBoundary::Circle(*curve));
    }
    Ok(PlanarBoundary::Other)
}

/// Plane coordinates of a point, for possibly non-orthonormal axes
fn project(plane: &[f64], p: DVec3) -> [f64; 2] {
    let o = DVec3::new(plane[0], plane[1], plane[2]);
    let x = DVec3::new(plane[3], plane[4], plane[5]);
    let y = DVec3::new(plane[6], plane[7], plane[8]);
    let r = p - o;
    let (xx, xy, yy) = (x.dot(x), x.dot(y), y.dot(y));
    let (rx, ry) = (r.dot(x), r.dot(y));
    let det = xx * yy - xy * xy;
    [(rx * yy - ry * xy) / det, (ry * xx - rx * xy) / det]
}

type Mesh = (Vec<[f64; 2]>, Vec<[u32; 3]>);

fn index(i: usize) -> KernelResult<u32> {
    u32::try_from(i).map_err(|_| KernelError::TessellationFailed("too many samples".into()))
}

fn polygon_lattice(
    ctx: &Context,
    corners: &[EntityId],
    plane: &[f64],
    quality: &TessQuality,
) -> KernelResult<Mesh> {
    let corners: Vec<[f64; 2]> = corners
        .iter()
        .map(|&n| ctx.node_position(n).map(|p| project(plane, p)))
        .collect::<KernelResult<_>>()?;
    let count = corners.len() as f64;
    let centre = corners
        .iter()
        .fold([0.0, 0.0], |acc, c| [acc[0] + c[0] / count, acc[1] + c[1] / count]);

    let dist = |a: [f64; 2], b: [f64; 2]| ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
    let mut uv = Vec::new();
    let mut triangles = Vec::new();

    for (k, &a) in corners.iter().enumerate() {
        let b = corners[(k + 1) % corners.len()];
        let longest = dist(a, b).max(dist(centre, a)).max(dist(centre, b));
        let n = segment_count(longest, 0.0, quality);

        // lattice point (i, j) = centre + i/n (a - centre) + j/n (b - centre), i + j <= n
        let base = uv.len();
        let mut row_start = Vec::with_capacity(n + 1);
        for i in 0..=n {
            row_start.push(uv.len() - base);
            for j in 0..=(n - i) {
                let (s, t) = (i as f64 / n as f64, j as f64 / n as f64);
                uv.push([
                    centre[0] + s * (a[0] - centre[0]) + t * (b[0] - centre[0]),
                    centre[1] + s * (a[1] - centre[1]) + t * (b[1] - centre[1]),
                ]);
            }
        }
        for i in 0..n {
            for j in 0..(n - i) {
                let p = base + row_start[i] + j;
                let q = base + row_start[i + 1] + j;
                triangles.push([index(p)?, index(q)?, index(p + 1)?]);
                if j + 1 < n - i {
                    triangles.push([index(p + 1)?, index(q)?, index(q + 1)?]);
                }
            }
        }
    }
    Ok((uv, triangles))
}

fn polar_grid(ctx: &Context, curve: EntityId, plane: &[f64], quality: &TessQuality) -> KernelResult<Mesh> {
    let circle = &ctx.get_geometry(curve)?.data;
    let centre = DVec3::new(circle[0], circle[1], circle[2]);
    let x = DVec3::new(circle[3], circle[4], circle[5]);
    let y = DVec3::new(circle[6], circle[7], circle[8]);
    let radius = circle[9];

    let around = segment_count(TAU * radius, TAU, quality).max(3);
    let rings = segment_count(radius, 0.0, quality);

    let mut uv = vec![project(plane, centre)];
    for ring in 1..=rings {
        let rho = radius * ring as f64 / rings as f64;
        for m in 0..around {
            let (s, c) = (TAU * m as f64 / around as f64).sin_cos();
            uv.push(project(plane, centre + rho * (c * x + s * y)));
        }
    }

    let at = |ring: usize, m: usize| 1 + (ring - 1) * around + m % around;
    let mut triangles = Vec::new();
    for m in 0..around {
        triangles.push([0, index(at(1, m))?, index(at(1, m + 1))?]);
    }
    for ring in 1..rings {
        for m in 0..around {
            let (a, b) = (at(ring, m), at(ring, m + 1));
            let (c, d) = (at(ring + 1, m), at(ring + 1, m + 1));
            triangles.push([index(a)?, index(c)?, index(d)?]);
            triangles.push([index(a)?, index(d)?, index(b)?]);
        }
    }
    Ok((uv, triangles))
}

fn uv_grid(ctx: &Context, face: EntityId, uv_box: [f64; 4], quality: &TessQuality) -> KernelResult<Mesh> {
    let [u0, u1, v0, v1] = uv_box;
    let fractions = [0.0, 0.5, 1.0];

    let mut nu = 1;
    let mut nv = 1;
    for f in fractions {
        let (v, u) = (lerp(v0, v1, f), lerp(u0, u1, f));
        let along_u: Vec<[f64; 2]> = (0..=PROBES)
            .map(|i| [lerp(u0, u1, i as f64 / PROBES as f64), v])
            .collect();
        let along_v: Vec<[f64; 2]> = (0..=PROBES)
            .map(|i| [u, lerp(v0, v1, i as f64 / PROBES as f64)])
            .collect();
        let (len, turn) = measure(&points_at(ctx, face, &along_u, 2)?);
        nu = nu.max(segment_count(len, turn, quality));
        let (len, turn) = measure(&points_at(ctx, face, &along_v, 2)?);
        nv = nv.max(segment_count(len, turn, quality));
    }

    let mut uv = Vec::with_capacity((nu + 1) * (nv + 1));
    for j in 0..=nv {
        for i in 0..=nu {
            uv.push([
                lerp(u0, u1, i as f64 / nu as f64),
                lerp(v0, v1, j as f64 / nv as f64),
            ]);
        }
    }
    let mut triangles = Vec::with_capacity(2 * nu * nv);
    for j in 0..nv {
        for i in 0..nu {
            let a = j * (nu + 1) + i;
            let (b, c) = (a + 1, a + nu + 1);
            let d = c + 1;
            triangles.push([index(a)?, index(b)?, index(d)?]);
            triangles.push([index(a)?, index(d)?, index(c)?]);
        }
    }
    Ok((uv, triangles))
}

/// Move `x` proportionally from one interval to another
pub(crate) fn remap(x: f64, from: [f64; 2], to: [f64; 2]) -> f64 {
    if from == to {
        return x;
    }
    let span = from[1] - from[0];
    if span == 0.0 {
        return to[0];
    }
    to[0] + (x - from[0]) * (to[1] - to[0]) / span
}

/// Re-sample `body` at the parametric locations of `base`
///
/// Sample `i` of edge or face `k` in the result corresponds to sample `i` of
/// edge or face `k` in `base`, with parameters rescaled to the new ranges.
pub fn map_tessellation(ctx: &Context, base: &Tessellation, body: EntityId) -> KernelResult<Tessellation> {
    let edges = ctx.body_children(body, ObjectClass::Edge)?;
    let faces = ctx.body_children(body, ObjectClass::Face)?;
    if edges.len() != base.edges.len() || faces.len() != base.faces.len() {
        return Err(KernelError::TessellationFailed(format!(
            "body {} has {} edges and {} faces, base tessellation has {} and {}",
            body,
            edges.len(),
            faces.len(),
            base.edges.len(),
            base.faces.len()
        )));
    }

    let mut mapped_edges = Vec::with_capacity(edges.len());
    for (&edge, samples) in edges.iter().zip(&base.edges) {
        let range = ctx.get_range(edge)?;
        let to = [range[0], range[1]];
        let t: Vec<f64> = samples.t.iter().map(|&t| remap(t, samples.range, to)).collect();
        let params: Vec<[f64; 2]> = t.iter().map(|&t| [t, 0.0]).collect();
        mapped_edges.push(EdgeSamples {
            points: points_at(ctx, edge, &params, 1)?,
            t,
            range: to,
        });
    }

    let mut mapped_faces = Vec::with_capacity(faces.len());
    for (&face, samples) in faces.iter().zip(&base.faces) {
        let range = ctx.get_range(face)?;
        let to = [range[0], range[1], range[2], range[3]];
        let (fu, fv) = ([samples.uv_box[0], samples.uv_box[1]], [samples.uv_box[2], samples.uv_box[3]]);
        let uv: Vec<[f64; 2]> = samples
            .uv
            .iter()
            .map(|p| [remap(p[0], fu, [to[0], to[1]]), remap(p[1], fv, [to[2], to[3]])])
            .collect();
        mapped_faces.push(FaceSamples {
            points: points_at(ctx, face, &uv, 2)?,
            uv,
            triangles: samples.triangles.clone(),
            uv_box: to,
        });
    }

    Ok(Tessellation {
        body,
        quality: base.quality,
        edges: mapped_edges,
        faces: mapped_faces,
    })
}
