//! Velocities of native primitive solids

use crate::error::{SensError, SensResult};
use crate::kernel::{Primitive, PrimitiveDerivative};
use crate::model::{Context, EntityId, ObjectClass};

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

/// Set velocities on every child of a primitive solid
///
/// The derivative itself comes from `kernel`; this routine only distributes
/// it over the body's nodes, then edge curves and ranges, then face surfaces
/// and uv boxes, matching them to `body_children` by position.
pub fn solid_primitive_dot<K>(
    ctx: &mut Context,
    kernel: &K,
    body: EntityId,
    primitive: &Primitive,
    params_dot: &[f64],
) -> SensResult<()>
where
    K: PrimitiveDerivative + ?Sized,
{
    if params_dot.len() != primitive.params.len() {
        return Err(SensError::ShapeMismatch {
            what: format!("{:?} parameter velocity", primitive.kind),
            expected: primitive.params.len(),
            actual: params_dot.len(),
        });
    }
    let velocity = kernel.solid_velocity(primitive, params_dot)?;

    let nodes = ctx.body_children(body, ObjectClass::Node)?;
    let edges = ctx.body_children(body, ObjectClass::Edge)?;
    let faces = ctx.body_children(body, ObjectClass::Face)?;
    check_count(ObjectClass::Node, nodes.len(), velocity.nodes.len())?;
    check_count(ObjectClass::Edge, edges.len(), velocity.edges.len())?;
    check_count(ObjectClass::Face, faces.len(), velocity.faces.len())?;

    for (&node, dot) in nodes.iter().zip(&velocity.nodes) {
        ctx.set_velocity_dot(node, &dot.to_array())?;
    }
    for (&edge, dot) in edges.iter().zip(&velocity.edges) {
        let curve = ctx.geometry_of(edge)?;
        ctx.set_velocity_dot(curve, &dot.curve_dot)?;
        ctx.set_velocity_dot(edge, &dot.range_dot)?;
    }
    for (&face, dot) in faces.iter().zip(&velocity.faces) {
        let surface = ctx.geometry_of(face)?;
        ctx.set_velocity_dot(surface, &dot.surface_dot)?;
        ctx.set_velocity_dot(face, &dot.uv_dot)?;
    }
    tracing::debug!(
        "Set {:?} velocities on {} nodes, {} edges, {} faces of body {}",
        primitive.kind,
        nodes.len(),
        edges.len(),
        faces.len(),
        body
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{
        AnalyticKernel, BodyVelocity, CadKernel, KernelResult, NullKernel, Orientation,
        PrimitiveKind,
    };
    use glam::DVec3;

    fn unit_box() -> Primitive {
        Primitive::new(
            PrimitiveKind::Box,
            Orientation::Outward,
            vec![4.0, 5.0, 6.0, 1.0, 2.0, 3.0],
        )
        .unwrap()
    }

    /// Reports one node too few
    struct ShortKernel;

    impl PrimitiveDerivative for ShortKernel {
        fn solid_velocity(&self, primitive: &Primitive, params_dot: &[f64]) -> KernelResult<BodyVelocity> {
            let mut velocity = AnalyticKernel.solid_velocity(primitive, params_dot)?;
            velocity.nodes.pop();
            Ok(velocity)
        }
    }

    #[test]
    fn test_box_translation_moves_every_node() {
        let mut ctx = Context::new();
        let kernel = AnalyticKernel::new();
        let primitive = unit_box();
        let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
        solid_primitive_dot(&mut ctx, &kernel, body, &primitive, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();

        assert!(ctx.has_velocity(body).unwrap());
        for node in ctx.body_children(body, ObjectClass::Node).unwrap() {
            assert_eq!(ctx.velocity(node).unwrap().data_dot, vec![1.0, 0.0, 0.0]);
        }
        for edge in ctx.body_children(body, ObjectClass::Edge).unwrap() {
            assert_eq!(ctx.range_dot(edge).unwrap().1, vec![0.0, 0.0]);
        }
    }

    #[test]
    fn test_works_through_trait_object() {
        let mut ctx = Context::new();
        let kernel: Box<dyn CadKernel> = Box::new(AnalyticKernel::new());
        let primitive = unit_box();
        let body = kernel.make_solid(&mut ctx, &primitive).unwrap();
        solid_primitive_dot(&mut ctx, kernel.as_ref(), body, &primitive, &[0.0; 6]).unwrap();
        let face = ctx.body_children(body, ObjectClass::Face).unwrap()[0];
        let (_, velocity) = ctx.evaluate_dot(face, &[0.5, 0.5], &[0.0, 0.0]).unwrap();
        assert_eq!(velocity, DVec3::ZERO);
    }

    #[test]
    fn test_shape_and_count_mismatch() {
        let mut ctx = Context::new();
        let primitive = unit_box();
        let body = AnalyticKernel.make_solid(&mut ctx, &primitive).unwrap();

        let err = solid_primitive_dot(&mut ctx, &AnalyticKernel, body, &primitive, &[1.0; 4]).unwrap_err();
        assert!(matches!(err, SensError::ShapeMismatch { expected: 6, actual: 4, .. }));

        let err = solid_primitive_dot(&mut ctx, &ShortKernel, body, &primitive, &[0.0; 6]).unwrap_err();
        assert!(matches!(
            err,
            SensError::TopologyCountMismatch { kind: ObjectClass::Node, expected: 8, actual: 7 }
        ));
    }

    #[test]
    fn test_unavailable_kernel() {
        let mut ctx = Context::new();
        let primitive = unit_box();
        let body = AnalyticKernel.make_solid(&mut ctx, &primitive).unwrap();
        let err = solid_primitive_dot(&mut ctx, &NullKernel, body, &primitive, &[0.0; 6]).unwrap_err();
        assert!(matches!(err, SensError::Kernel(_)));
    }
}
