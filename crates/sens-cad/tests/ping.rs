//! End-to-end sensitivity checks over the analytic kernel

use glam::DVec3;
use sens_cad::propagate::{
    face_from_loop_dot, make_face_from_loop, make_planar_loop, make_sheet_body, planar_loop_dot,
    remake_topology, solid_primitive_dot,
};
use sens_cad::{
    AnalyticKernel, CadKernel, Context, Family, ObjectClass, Orientation, PingConfig, Primitive,
    Scenario, ScenarioDriver, SensError, TempScope, ping_bodies, run_suite,
};

fn primitive(family: Family, orientation: Orientation) -> Primitive {
    let scenario = Scenario::standard(family);
    let kind = family.primitive_kind().unwrap();
    Primitive::new(kind, orientation, scenario.nominal).unwrap()
}

#[test]
fn test_box_end_to_end() {
    let scenario = Scenario::standard(Family::Box);
    assert_eq!(scenario.config.step, 1e-7);
    assert_eq!(scenario.config.face_tol, 1e-7);

    let kernel = AnalyticKernel::new();
    let mut driver = ScenarioDriver::new(&kernel, &scenario, Orientation::Outward);
    driver.run().unwrap();
    let reports = driver.reports();
    assert_eq!(reports.len(), 6);
    let failures: usize = reports.iter().map(|r| r.failure_count()).sum();
    assert_eq!(failures, 0, "{:?}", reports.iter().flat_map(|r| &r.findings).next());
}

#[test]
fn test_both_orientations_pass() {
    let kernel = AnalyticKernel::new();
    for family in [Family::Sphere, Family::Cone, Family::Cylinder] {
        let scenario = Scenario::standard(family);
        assert_eq!(scenario.orientations.len(), 2);
        assert_eq!(scenario.config.face_tol, 1e-7);
        assert_eq!(scenario.config.edge_tol, 1e-7);
        assert_eq!(scenario.config.node_tol, 1e-7);
        let report = run_suite(&kernel, &[scenario]);
        for outcome in &report.outcomes {
            assert!(
                outcome.passed(),
                "{} {:?}: {:?} {:?}",
                outcome.family,
                outcome.orientation,
                outcome.structural,
                outcome.reports.iter().flat_map(|r| &r.findings).next()
            );
        }
    }
}

#[test]
fn test_standard_suite_passes() {
    let scenarios: Vec<_> = [Family::Torus, Family::Face]
        .into_iter()
        .map(Scenario::standard)
        .collect();
    assert!(scenarios.iter().all(|s| s.config.face_tol == 1e-7));
    assert_eq!(scenarios[0].config.step, 1e-8);
    let report = run_suite(&AnalyticKernel::new(), &scenarios);
    assert_eq!(report.structural_count(), 0);
    assert_eq!(report.finding_count(), 0);
}

#[test]
fn test_zero_direction_gives_zero_velocity() {
    let kernel = AnalyticKernel::new();
    for family in [Family::Box, Family::Cone, Family::Torus] {
        let mut ctx = Context::new();
        let primitive = primitive(family, Orientation::Outward);
        let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
        let zeros = vec![0.0; primitive.params.len()];
        solid_primitive_dot(&mut ctx, &kernel, body, &primitive, &zeros).unwrap();

        for face in ctx.body_children(body, ObjectClass::Face).unwrap() {
            let (_, velocity) = ctx.evaluate_dot(face, &[0.25, 0.5], &[0.0, 0.0]).unwrap();
            assert_eq!(velocity, DVec3::ZERO);
        }
        for edge in ctx.body_children(body, ObjectClass::Edge).unwrap() {
            assert!(ctx.range_dot(edge).unwrap().1.iter().all(|&d| d == 0.0));
        }
    }
}

#[test]
fn test_zero_direction_gives_zero_face_velocity() {
    let mut ctx = Context::new();
    let points = [DVec3::new(1.0, 0.0, 0.0), DVec3::new(3.0, 1.0, 0.0), DVec3::new(0.5, 2.0, 0.5)];
    let (face, lp) = {
        let mut scope = TempScope::new(&mut ctx);
        let lp = make_planar_loop(&mut scope, &points).unwrap();
        scope.push(lp);
        let face = make_face_from_loop(&mut scope, lp).unwrap();
        scope.push(face);
        make_sheet_body(&mut scope, face).unwrap();
        (face, lp)
    };
    planar_loop_dot(&mut ctx, lp, &[DVec3::ZERO; 3]).unwrap();
    face_from_loop_dot(&mut ctx, face).unwrap();

    let plane = ctx.get_topology(face).unwrap().geometry.unwrap();
    assert!(ctx.velocity(plane).unwrap().data_dot.iter().all(|&d| d == 0.0));
    assert!(ctx.range_dot(face).unwrap().1.iter().all(|&d| d == 0.0));
    let (_, dot) = ctx.evaluate_dot(face, &[0.25, 0.5], &[0.0, 0.0]).unwrap();
    assert_eq!(dot, DVec3::ZERO);
}

#[test]
fn test_repeated_propagation_is_identical() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let primitive = primitive(Family::Torus, Orientation::Outward);
    let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
    let mut dot = vec![0.0; 8];
    dot[4] = 1.0;

    let faces = ctx.body_children(body, ObjectClass::Face).unwrap();
    solid_primitive_dot(&mut ctx, &kernel, body, &primitive, &dot).unwrap();
    let first = ctx.evaluate_dot(faces[0], &[1.0, 2.0], &[0.0, 0.0]).unwrap();
    solid_primitive_dot(&mut ctx, &kernel, body, &primitive, &dot).unwrap();
    let second = ctx.evaluate_dot(faces[0], &[1.0, 2.0], &[0.0, 0.0]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_remake_every_family() {
    let kernel = AnalyticKernel::new();
    for family in [Family::Box, Family::Sphere, Family::Cone, Family::Cylinder, Family::Torus] {
        for orientation in [Orientation::Outward, Orientation::Inward] {
            let mut ctx = Context::new();
            let body = kernel.make_solid(&mut ctx, &primitive(family, orientation)).unwrap();
            let before = ctx.live_count();
            remake_topology(&mut ctx, body).unwrap();
            assert_eq!(ctx.live_count(), before, "{family} {orientation:?}");
        }
    }

    let mut ctx = Context::new();
    let body = {
        let mut scope = TempScope::new(&mut ctx);
        let points = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let lp = make_planar_loop(&mut scope, &points).unwrap();
        scope.push(lp);
        let face = make_face_from_loop(&mut scope, lp).unwrap();
        scope.push(face);
        make_sheet_body(&mut scope, face).unwrap()
    };
    let before = ctx.live_count();
    remake_topology(&mut ctx, body).unwrap();
    assert_eq!(ctx.live_count(), before);
}

#[test]
fn test_identical_tessellations_at_zero_tolerance() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let primitive = primitive(Family::Cylinder, Orientation::Inward);
    let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
    solid_primitive_dot(&mut ctx, &kernel, body, &primitive, &[0.0; 7]).unwrap();
    let tess = kernel.tessellate(&ctx, body, &Default::default()).unwrap();

    let config = PingConfig::default().with_tolerance(0.0);
    let report = ping_bodies(&ctx, &tess, &tess, 0, "identical", &config).unwrap();
    assert_eq!(report.failure_count(), 0);
    assert!(report.samples_checked > 0);
}

#[test]
fn test_mismatched_topology_is_structural() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let cube = primitive(Family::Box, Orientation::Outward);
    let body = kernel.make_solid(&mut ctx, &cube).unwrap();
    solid_primitive_dot(&mut ctx, &kernel, body, &cube, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
    let sphere = kernel
        .make_solid(&mut ctx, &primitive(Family::Sphere, Orientation::Outward))
        .unwrap();

    let tess1 = kernel.tessellate(&ctx, body, &Default::default()).unwrap();
    let tess2 = kernel.tessellate(&ctx, sphere, &Default::default()).unwrap();
    let err = ping_bodies(&ctx, &tess1, &tess2, 0, "box vs sphere", &PingConfig::default()).unwrap_err();
    assert!(matches!(err, SensError::TopologyCountMismatch { .. }));
    assert!(kernel.map_tessellation(&ctx, &tess1, sphere).is_err());
}

#[test]
fn test_dropped_sample_is_structural() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let cube = primitive(Family::Box, Orientation::Outward);
    let body = kernel.make_solid(&mut ctx, &cube).unwrap();
    solid_primitive_dot(&mut ctx, &kernel, body, &cube, &[0.0; 6]).unwrap();
    let tess1 = kernel.tessellate(&ctx, body, &Default::default()).unwrap();
    let mut tess2 = tess1.clone();
    tess2.edges[3].points.pop();
    tess2.edges[3].t.pop();

    let err = ping_bodies(&ctx, &tess1, &tess2, 0, "dropped", &PingConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        SensError::SampleCountMismatch { kind: ObjectClass::Edge, index: 3, .. }
    ));
}

#[test]
fn test_permuted_face_samples_are_structural() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let cube = primitive(Family::Box, Orientation::Outward);
    let body = kernel.make_solid(&mut ctx, &cube).unwrap();
    let dot = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    solid_primitive_dot(&mut ctx, &kernel, body, &cube, &dot).unwrap();
    let moved: Vec<f64> = cube.params.iter().zip(dot).map(|(v, d)| v + 1e-7 * d).collect();
    let body2 = kernel.make_solid(&mut ctx, &cube.with_params(moved).unwrap()).unwrap();
    let tess1 = kernel.tessellate(&ctx, body, &Default::default()).unwrap();
    let mut tess2 = kernel.map_tessellation(&ctx, &tess1, body2).unwrap();

    let config = PingConfig::default();
    assert!(ping_bodies(&ctx, &tess1, &tess2, 0, "box", &config).unwrap().passed());

    let last = tess2.faces[0].points.len() - 1;
    tess2.faces[0].points.swap(0, last);
    tess2.faces[0].uv.swap(0, last);
    let err = ping_bodies(&ctx, &tess1, &tess2, 0, "box", &config).unwrap_err();
    assert!(matches!(
        err,
        SensError::SampleCorrespondence { kind: ObjectClass::Face, index: 0, sample: 0 }
    ));
}

#[test]
fn test_face_from_curved_loop_is_unsupported() {
    let kernel = AnalyticKernel::new();
    let mut ctx = Context::new();
    let body = kernel
        .make_solid(&mut ctx, &primitive(Family::Cylinder, Orientation::Outward))
        .unwrap();
    let lp = ctx.body_children(body, ObjectClass::Loop).unwrap()[0];
    let before = ctx.live_count();

    let mut scope = TempScope::new(&mut ctx);
    let err = make_face_from_loop(&mut scope, lp).unwrap_err();
    assert!(matches!(err, SensError::UnsupportedConstruction(_)));
    drop(scope);
    assert_eq!(ctx.live_count(), before);
}

#[test]
fn test_face_velocity_needs_loop_velocity_first() {
    let mut ctx = Context::new();
    let (face, lp) = {
        let mut scope = TempScope::new(&mut ctx);
        let points = [DVec3::ZERO, DVec3::X, DVec3::Y];
        let lp = make_planar_loop(&mut scope, &points).unwrap();
        scope.push(lp);
        let face = make_face_from_loop(&mut scope, lp).unwrap();
        scope.push(face);
        make_sheet_body(&mut scope, face).unwrap();
        (face, lp)
    };

    assert!(matches!(
        face_from_loop_dot(&mut ctx, face),
        Err(SensError::VelocityNotSet { .. })
    ));
    planar_loop_dot(&mut ctx, lp, &[DVec3::Z, DVec3::ZERO, DVec3::ZERO]).unwrap();
    face_from_loop_dot(&mut ctx, face).unwrap();
    assert!(ctx.has_velocity(face).unwrap());
}
