//! Finite-difference oracle
//!
//! Compares the analytic velocities stored on a base body against the
//! numerical derivative obtained from a base tessellation and a perturbed
//! tessellation mapped onto it sample by sample. Disagreements are collected,
//! not raised: every sample is visited and the report lists each component
//! that missed its tolerance.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PingConfig;
use crate::error::{SensError, SensResult};
use crate::kernel::{Tessellation, remap};
use crate::model::{Context, EntityId, ObjectClass};

/// What a finding was measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    /// Face sample position
    Face,
    /// Edge sample position
    Edge,
    /// Edge parametric range
    EdgeRange,
    /// Node position
    Node,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::Face => "face",
            FindingKind::Edge => "edge",
            FindingKind::EdgeRange => "edge range",
            FindingKind::Node => "node",
        };
        f.write_str(name)
    }
}

/// One component where analytic and finite-difference derivatives disagree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Entity index in body-children order
    pub index: usize,
    /// Sample index within the entity, 0 for nodes and ranges
    pub sample: usize,
    pub param_index: usize,
    pub component: usize,
    pub analytic: f64,
    pub finite_difference: f64,
    pub difference: f64,
    pub tolerance: f64,
}

/// Result of one ping along one design direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    pub label: String,
    pub param_index: usize,
    /// Number of sample points compared, nodes included
    pub samples_checked: usize,
    pub findings: Vec<Finding>,
}

impl PingReport {
    /// Number of failing components, 0 when the ping passes
    pub fn failure_count(&self) -> usize {
        self.findings.len()
    }

    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

struct Collector<'a> {
    label: &'a str,
    param_index: usize,
    report: PingReport,
}

impl Collector<'_> {
    fn compare(
        &mut self,
        kind: FindingKind,
        index: usize,
        sample: usize,
        analytic: &[f64],
        fd: &[f64],
        tolerance: f64,
    ) {
        for (component, (&a, &f)) in analytic.iter().zip(fd).enumerate() {
            let difference = (a - f).abs();
            // NaN differences fail too
            if difference <= tolerance {
                continue;
            }
            tracing::warn!(
                "{}: {} {} sample {} parameter {} component {}: analytic {:e} vs finite difference {:e} (|diff| {:e} > {:e})",
                self.label,
                kind,
                index,
                sample,
                self.param_index,
                component,
                a,
                f,
                difference,
                tolerance
            );
            self.report.findings.push(Finding {
                kind,
                index,
                sample,
                param_index: self.param_index,
                component,
                analytic: a,
                finite_difference: f,
                difference,
                tolerance,
            });
        }
    }
}

fn check_count(kind: ObjectClass, expected: usize, actual: usize) -> SensResult<()> {
    if expected != actual {
        return Err(SensError::TopologyCountMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_samples(kind: ObjectClass, index: usize, expected: usize, actual: usize) -> SensResult<()> {
    if expected != actual {
        return Err(SensError::SampleCountMismatch {
            kind,
            index,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Relative slack allowed between a mapped parameter and its proportional remap
const CORRESPONDENCE_TOL: f64 = 1e-9;

fn corresponds(x1: f64, x2: f64, from: [f64; 2], to: [f64; 2]) -> bool {
    let scale = 1.0_f64.max(from[0].abs()).max(from[1].abs()).max(to[0].abs()).max(to[1].abs());
    (remap(x1, from, to) - x2).abs() <= CORRESPONDENCE_TOL * scale
}

/// First sample whose mapped parameters are not the remap of the base ones
fn check_correspondence(
    kind: ObjectClass,
    index: usize,
    mut matches: impl Iterator<Item = bool>,
) -> SensResult<()> {
    match matches.position(|ok| !ok) {
        Some(sample) => Err(SensError::SampleCorrespondence { kind, index, sample }),
        None => Ok(()),
    }
}

/// Children of both bodies of one class, counts checked against each other
/// and against the tessellation entries when given
fn paired_children(
    ctx: &Context,
    b1: EntityId,
    b2: EntityId,
    class: ObjectClass,
    tess_counts: Option<(usize, usize)>,
) -> SensResult<(Vec<EntityId>, Vec<EntityId>)> {
    let c1 = ctx.body_children(b1, class)?;
    let c2 = ctx.body_children(b2, class)?;
    check_count(class, c1.len(), c2.len())?;
    if let Some((n1, n2)) = tess_counts {
        check_count(class, c1.len(), n1)?;
        check_count(class, c1.len(), n2)?;
    }
    Ok((c1, c2))
}

/// Verify the analytic velocities of `tess1.body` against finite differences
///
/// `tess2` must be the mapping of `tess1` onto the body rebuilt with design
/// parameter `param_index` stepped by `config.step`. Count mismatches between
/// the two bodies or tessellations, and mapped samples whose parameters are not
/// the proportional remap of the base ones, are structural errors; per-component
/// disagreements are returned as findings.
pub fn ping_bodies(
    ctx: &Context,
    tess1: &Tessellation,
    tess2: &Tessellation,
    param_index: usize,
    label: &str,
    config: &PingConfig,
) -> SensResult<PingReport> {
    config.validate()?;
    let h = config.step;
    let (b1, b2) = (tess1.body, tess2.body);

    let (nodes1, nodes2) = paired_children(ctx, b1, b2, ObjectClass::Node, None)?;
    let (edges1, _) = paired_children(
        ctx,
        b1,
        b2,
        ObjectClass::Edge,
        Some((tess1.edges.len(), tess2.edges.len())),
    )?;
    let (faces1, _) = paired_children(
        ctx,
        b1,
        b2,
        ObjectClass::Face,
        Some((tess1.faces.len(), tess2.faces.len())),
    )?;

    for (index, (s1, s2)) in tess1.edges.iter().zip(&tess2.edges).enumerate() {
        check_samples(ObjectClass::Edge, index, s1.points.len(), s1.t.len())?;
        check_samples(ObjectClass::Edge, index, s1.points.len(), s2.points.len())?;
        check_samples(ObjectClass::Edge, index, s1.points.len(), s2.t.len())?;
        check_correspondence(
            ObjectClass::Edge,
            index,
            s1.t.iter().zip(&s2.t).map(|(&t1, &t2)| corresponds(t1, t2, s1.range, s2.range)),
        )?;
    }
    for (index, (s1, s2)) in tess1.faces.iter().zip(&tess2.faces).enumerate() {
        check_samples(ObjectClass::Face, index, s1.points.len(), s1.uv.len())?;
        check_samples(ObjectClass::Face, index, s1.points.len(), s2.points.len())?;
        check_samples(ObjectClass::Face, index, s1.points.len(), s2.uv.len())?;
        let (u1, v1) = ([s1.uv_box[0], s1.uv_box[1]], [s1.uv_box[2], s1.uv_box[3]]);
        let (u2, v2) = ([s2.uv_box[0], s2.uv_box[1]], [s2.uv_box[2], s2.uv_box[3]]);
        check_correspondence(
            ObjectClass::Face,
            index,
            s1.uv.iter().zip(&s2.uv).map(|(a, b)| {
                corresponds(a[0], b[0], u1, u2) && corresponds(a[1], b[1], v1, v2)
            }),
        )?;
    }

    let mut out = Collector {
        label,
        param_index,
        report: PingReport {
            label: label.to_string(),
            param_index,
            ..Default::default()
        },
    };

    for (index, ((&face, s1), s2)) in faces1.iter().zip(&tess1.faces).zip(&tess2.faces).enumerate() {
        for (sample, (p1, p2)) in s1.points.iter().zip(&s2.points).enumerate() {
            let (uv1, uv2) = (s1.uv[sample], s2.uv[sample]);
            let (_, analytic) = ctx.evaluate_dot(face, &uv1, &[0.0, 0.0])?;
            // strip the motion caused by the sample sliding in uv
            let partials = ctx.evaluate(face, &uv1)?;
            let fd = (*p2 - *p1) / h
                - partials.du * ((uv2[0] - uv1[0]) / h)
                - partials.dv * ((uv2[1] - uv1[1]) / h);
            out.compare(
                FindingKind::Face,
                index,
                sample,
                &analytic.to_array(),
                &fd.to_array(),
                config.face_tol,
            );
        }
        out.report.samples_checked += s1.points.len();
    }

    for (index, ((&edge, s1), s2)) in edges1.iter().zip(&tess1.edges).zip(&tess2.edges).enumerate() {
        for (sample, (p1, p2)) in s1.points.iter().zip(&s2.points).enumerate() {
            let (t1, t2) = (s1.t[sample], s2.t[sample]);
            let (_, analytic) = ctx.evaluate_dot(edge, &[t1], &[0.0])?;
            let partials = ctx.evaluate(edge, &[t1])?;
            let fd = (*p2 - *p1) / h - partials.du * ((t2 - t1) / h);
            out.compare(
                FindingKind::Edge,
                index,
                sample,
                &analytic.to_array(),
                &fd.to_array(),
                config.edge_tol,
            );
        }

        let (_, range_dot) = ctx.range_dot(edge)?;
        let fd = [(s2.range[0] - s1.range[0]) / h, (s2.range[1] - s1.range[1]) / h];
        out.compare(FindingKind::EdgeRange, index, 0, &range_dot, &fd, config.edge_tol);
        out.report.samples_checked += s1.points.len();
    }

    for (index, (&n1, &n2)) in nodes1.iter().zip(&nodes2).enumerate() {
        let analytic = &ctx.velocity(n1)?.data_dot;
        let fd: DVec3 = (ctx.node_position(n2)? - ctx.node_position(n1)?) / h;
        out.compare(FindingKind::Node, index, 0, analytic, &fd.to_array(), config.node_tol);
        out.report.samples_checked += 1;
    }

    let report = out.report;
    tracing::debug!(
        "{}: parameter {} checked {} samples, {} findings",
        label,
        param_index,
        report.samples_checked,
        report.failure_count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{AnalyticKernel, CadKernel, Orientation, Primitive, PrimitiveKind};
    use crate::propagate::solid_primitive_dot;

    struct Fixture {
        ctx: Context,
        tess1: Tessellation,
        tess2: Tessellation,
    }

    /// Sphere with velocity along `dot` and a body perturbed by `step` along `dot`
    fn sphere_ping(dot: &[f64], step: f64) -> Fixture {
        let kernel = AnalyticKernel::new();
        let mut ctx = Context::new();
        let nominal = vec![1.0, 0.5, -0.5, 1.5];
        let primitive = Primitive::new(PrimitiveKind::Sphere, Orientation::Outward, nominal.clone()).unwrap();
        let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
        solid_primitive_dot(&mut ctx, &kernel, body, &primitive, dot).unwrap();

        let moved: Vec<f64> = nominal.iter().zip(dot).map(|(v, d)| v + step * d).collect();
        let body2 = kernel
            .make_solid(&mut ctx, &primitive.with_params(moved).unwrap())
            .unwrap();
        let tess1 = kernel.tessellate(&ctx, body, &Default::default()).unwrap();
        let tess2 = kernel.map_tessellation(&ctx, &tess1, body2).unwrap();
        Fixture { ctx, tess1, tess2 }
    }

    #[test]
    fn test_radius_direction_passes() {
        let f = sphere_ping(&[0.0, 0.0, 0.0, 1.0], 1e-7);
        let report = ping_bodies(&f.ctx, &f.tess1, &f.tess2, 3, "sphere", &PingConfig::default()).unwrap();
        assert!(report.passed(), "{:?}", report.findings.first());
        assert_eq!(report.samples_checked, f.tess1.point_count() + 2);
    }

    #[test]
    fn test_identical_bodies_at_zero_tolerance() {
        let f = sphere_ping(&[0.0; 4], 0.0);
        let config = PingConfig::default().with_tolerance(0.0);
        let report = ping_bodies(&f.ctx, &f.tess1, &f.tess1, 0, "zero", &config).unwrap();
        assert_eq!(report.failure_count(), 0);
    }

    #[test]
    fn test_wrong_velocity_is_reported_not_raised() {
        // analytic says the sphere grows, the perturbed body moved instead
        let mut f = sphere_ping(&[0.0, 0.0, 0.0, 1.0], 1e-7);
        let kernel = AnalyticKernel::new();
        let primitive = Primitive::new(
            PrimitiveKind::Sphere,
            Orientation::Outward,
            vec![1.0 + 1e-7, 0.5, -0.5, 1.5],
        )
        .unwrap();
        let moved = kernel.make_solid(&mut f.ctx, &primitive).unwrap();
        let tess2 = kernel.map_tessellation(&f.ctx, &f.tess1, moved).unwrap();

        let report = ping_bodies(&f.ctx, &f.tess1, &tess2, 0, "sphere", &PingConfig::default()).unwrap();
        assert!(report.failure_count() > 0);
        let node = report.findings.iter().find(|x| x.kind == FindingKind::Node).unwrap();
        assert!(node.difference > node.tolerance);
        assert_eq!(node.param_index, 0);
    }

    #[test]
    fn test_broken_index_correspondence_is_structural() {
        let f = sphere_ping(&[0.0, 0.0, 0.0, 1.0], 1e-7);
        let mut tess2 = f.tess2.clone();
        tess2.faces[0].points.pop();
        tess2.faces[0].uv.pop();
        let err = ping_bodies(&f.ctx, &f.tess1, &tess2, 3, "sphere", &PingConfig::default()).unwrap_err();
        assert!(matches!(err, SensError::SampleCountMismatch { kind: ObjectClass::Face, index: 0, .. }));

        let mut tess2 = f.tess2.clone();
        tess2.edges.pop();
        let err = ping_bodies(&f.ctx, &f.tess1, &tess2, 3, "sphere", &PingConfig::default()).unwrap_err();
        assert!(matches!(err, SensError::TopologyCountMismatch { kind: ObjectClass::Edge, .. }));
    }

    #[test]
    fn test_permuted_samples_are_structural() {
        let f = sphere_ping(&[0.0, 0.0, 0.0, 1.0], 1e-7);
        let mut tess2 = f.tess2.clone();
        let last = tess2.faces[0].points.len() - 1;
        tess2.faces[0].points.swap(0, last);
        tess2.faces[0].uv.swap(0, last);
        let err = ping_bodies(&f.ctx, &f.tess1, &tess2, 3, "sphere", &PingConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SensError::SampleCorrespondence { kind: ObjectClass::Face, index: 0, sample: 0 }
        ));

        let mut tess2 = f.tess2.clone();
        let last = tess2.edges[0].points.len() - 1;
        tess2.edges[0].points.swap(0, last);
        tess2.edges[0].t.swap(0, last);
        let err = ping_bodies(&f.ctx, &f.tess1, &tess2, 3, "sphere", &PingConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            SensError::SampleCorrespondence { kind: ObjectClass::Edge, index: 0, sample: 0 }
        ));
    }

    #[test]
    fn test_missing_velocity_is_structural() {
        let mut f = sphere_ping(&[0.0, 0.0, 0.0, 1.0], 1e-7);
        f.ctx.clear_all_velocities();
        let err = ping_bodies(&f.ctx, &f.tess1, &f.tess2, 3, "sphere", &PingConfig::default()).unwrap_err();
        assert!(matches!(err, SensError::VelocityNotSet { .. }));
    }

    #[test]
    fn test_invalid_config() {
        let f = sphere_ping(&[0.0; 4], 0.0);
        let config = PingConfig::default().with_step(-1.0);
        assert!(matches!(
            ping_bodies(&f.ctx, &f.tess1, &f.tess1, 0, "bad", &config),
            Err(SensError::InvalidConfig(_))
        ));
    }
}
