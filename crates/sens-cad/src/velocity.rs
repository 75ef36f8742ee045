//! Velocity store
//!
//! Attaches the derivative of an entity's defining data along the active
//! design direction: a node's position, a curve's or surface's coefficients,
//! an edge's range or a face's uv box. Loops, shells and bodies carry no data
//! of their own; they have velocity once everything beneath them does.

use glam::DVec3;

use crate::error::{SensError, SensResult};
use crate::model::{self, Context, Entity, EntityId, TopoType, Velocity};

fn vec3(data: &[f64]) -> DVec3 {
    DVec3::new(data[0], data[1], data[2])
}

impl Context {
    /// Record defining data and its velocity on an entity
    pub fn set_velocity(&mut self, id: EntityId, data: &[f64], data_dot: &[f64]) -> SensResult<()> {
        let class = self.class_of(id)?;
        let expected = self.defining_data(id)?.len();
        if expected == 0 {
            return Err(SensError::UnsupportedConstruction(format!(
                "{class} {id} has no defining data to attach a velocity to"
            )));
        }
        for (what, actual) in [("data", data.len()), ("velocity", data_dot.len())] {
            if actual != expected {
                return Err(SensError::ShapeMismatch {
                    what: format!("{class} {id} {what}"),
                    expected,
                    actual,
                });
            }
        }
        if data_dot.iter().any(|d| !d.is_finite()) {
            return Err(SensError::UnsupportedConstruction(format!(
                "non-finite velocity for {class} {id}"
            )));
        }

        self.slot_mut(id)?.velocity = Some(Velocity {
            data: data.to_vec(),
            data_dot: data_dot.to_vec(),
        });
        tracing::trace!("Velocity set on {} {}: {:?}", class, id, data_dot);
        Ok(())
    }

    /// Record a velocity against the entity's current defining data
    pub fn set_velocity_dot(&mut self, id: EntityId, data_dot: &[f64]) -> SensResult<()> {
        let data = self.defining_data(id)?;
        self.set_velocity(id, &data, data_dot)
    }

    /// Previously stored velocity of an entity
    pub fn velocity(&self, id: EntityId) -> SensResult<&Velocity> {
        let slot = self.slot(id)?;
        slot.velocity.as_ref().ok_or(SensError::VelocityNotSet {
            class: slot.entity.class(),
            id,
        })
    }

    /// The most primitive entity under `id` still lacking a velocity
    ///
    /// Children and geometry are checked before the entity itself, so the
    /// answer names the first link missing in dependency order.
    pub fn first_missing_velocity(&self, id: EntityId) -> SensResult<Option<EntityId>> {
        let slot = self.slot(id)?;
        match &slot.entity {
            Entity::Geometry(_) => Ok(slot.velocity.is_none().then_some(id)),
            Entity::Topology(parts) => {
                for &child in &parts.children {
                    if let Some(missing) = self.first_missing_velocity(child)? {
                        return Ok(Some(missing));
                    }
                }
                if let Some(geometry) = parts.geometry {
                    if let Some(missing) = self.first_missing_velocity(geometry)? {
                        return Ok(Some(missing));
                    }
                }
                let carries_data = parts.mtype.data_len() > 0;
                Ok((carries_data && slot.velocity.is_none()).then_some(id))
            }
        }
    }

    /// Whether the entity and everything it depends on have velocity
    pub fn has_velocity(&self, id: EntityId) -> SensResult<bool> {
        Ok(self.first_missing_velocity(id)?.is_none())
    }

    /// Fail with `VelocityNotSet` unless the entity is ready to be queried
    pub fn require_velocity(&self, id: EntityId) -> SensResult<()> {
        match self.first_missing_velocity(id)? {
            None => Ok(()),
            Some(missing) => Err(SensError::VelocityNotSet {
                class: self.class_of(missing)?,
                id: missing,
            }),
        }
    }

    pub fn clear_velocity(&mut self, id: EntityId) -> SensResult<()> {
        self.slot_mut(id)?.velocity = None;
        Ok(())
    }

    /// Forget every velocity before starting a new direction
    pub fn clear_all_velocities(&mut self) {
        for id in self.live_ids() {
            if let Ok(slot) = self.slot_mut(id) {
                slot.velocity = None;
            }
        }
    }

    /// Position and position velocity at a parametric location
    ///
    /// `params_dot` is the velocity of the parameters themselves; pass zeros
    /// to hold the parametric location fixed.
    pub fn evaluate_dot(
        &self,
        id: EntityId,
        params: &[f64],
        params_dot: &[f64],
    ) -> SensResult<(DVec3, DVec3)> {
        self.require_velocity(id)?;
        let slot = self.slot(id)?;
        let geometry = match &slot.entity {
            Entity::Geometry(_) => id,
            Entity::Topology(parts) => match parts.mtype {
                TopoType::Node => {
                    let v = self.velocity(id)?;
                    return Ok((vec3(&v.data), vec3(&v.data_dot)));
                }
                TopoType::Edge(_) | TopoType::Face(_) => self.geometry_of(id)?,
                other => {
                    return Err(SensError::UnsupportedConstruction(format!(
                        "cannot evaluate a {}",
                        other.class()
                    )));
                }
            },
        };

        let gtype = self.get_geometry(geometry)?.gtype;
        let v = self.velocity(geometry)?;
        Ok(model::evaluate_dot(gtype, &v.data, &v.data_dot, params, params_dot)?)
    }

    /// Parametric range of an edge or face and its velocity
    pub fn range_dot(&self, id: EntityId) -> SensResult<(Vec<f64>, Vec<f64>)> {
        let mtype = self.get_topology(id)?.mtype;
        if !matches!(mtype, TopoType::Edge(_) | TopoType::Face(_)) {
            return Err(SensError::UnsupportedConstruction(format!(
                "a {} has no parametric range",
                mtype.class()
            )));
        }
        let v = self.velocity(id)?;
        Ok((v.data.clone(), v.data_dot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeometryType, ObjectClass, Sense};

    fn unit_edge(ctx: &mut Context) -> (EntityId, EntityId, EntityId, EntityId) {
        let n1 = ctx.make_node(DVec3::ZERO).unwrap();
        let n2 = ctx.make_node(DVec3::X).unwrap();
        let curve = ctx
            .make_geometry(GeometryType::Line, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
            .unwrap();
        let edge = ctx.make_edge(curve, &[n1, n2], [0.0, 1.0]).unwrap();
        (n1, n2, curve, edge)
    }

    #[test]
    fn test_set_and_get_velocity() {
        let mut ctx = Context::new();
        let (n1, ..) = unit_edge(&mut ctx);
        ctx.set_velocity_dot(n1, &[1.0, 2.0, 3.0]).unwrap();
        let first = ctx.velocity(n1).unwrap().clone();
        let second = ctx.velocity(n1).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.data, vec![0.0, 0.0, 0.0]);
        assert_eq!(first.data_dot, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_velocity_shape_must_match() {
        let mut ctx = Context::new();
        let (_, _, curve, edge) = unit_edge(&mut ctx);
        let err = ctx.set_velocity_dot(curve, &[0.0; 3]).unwrap_err();
        assert!(matches!(err, SensError::ShapeMismatch { expected: 6, actual: 3, .. }));
        let err = ctx.set_velocity(edge, &[0.0, 1.0, 2.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SensError::ShapeMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_containers_carry_no_velocity() {
        let mut ctx = Context::new();
        let (.., edge) = unit_edge(&mut ctx);
        let lp = ctx.make_loop(&[edge], &[Sense::Forward], false).unwrap();
        assert!(matches!(
            ctx.set_velocity_dot(lp, &[]),
            Err(SensError::UnsupportedConstruction(_))
        ));
    }

    #[test]
    fn test_query_out_of_order_is_an_error() {
        let mut ctx = Context::new();
        let (n1, n2, curve, edge) = unit_edge(&mut ctx);

        // the edge's own range velocity alone is not enough
        ctx.set_velocity_dot(edge, &[0.0, 1.0]).unwrap();
        let err = ctx.evaluate_dot(edge, &[0.5], &[0.0]).unwrap_err();
        assert!(matches!(err, SensError::VelocityNotSet { class: ObjectClass::Node, id } if id == n1));

        ctx.set_velocity_dot(n1, &[0.0; 3]).unwrap();
        ctx.set_velocity_dot(n2, &[1.0, 0.0, 0.0]).unwrap();
        let err = ctx.evaluate_dot(edge, &[0.5], &[0.0]).unwrap_err();
        assert!(matches!(err, SensError::VelocityNotSet { class: ObjectClass::Curve, id } if id == curve));

        ctx.set_velocity_dot(curve, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        assert!(ctx.has_velocity(edge).unwrap());
        let (point, velocity) = ctx.evaluate_dot(edge, &[0.5], &[0.0]).unwrap();
        assert_eq!(point, DVec3::new(0.5, 0.0, 0.0));
        // stretching along the line leaves fixed-t points in place
        assert_eq!(velocity, DVec3::ZERO);
    }

    #[test]
    fn test_clear_all_velocities() {
        let mut ctx = Context::new();
        let (n1, _, _, edge) = unit_edge(&mut ctx);
        ctx.set_velocity_dot(n1, &[1.0, 0.0, 0.0]).unwrap();
        ctx.set_velocity_dot(edge, &[0.0, 1.0]).unwrap();
        ctx.clear_all_velocities();
        assert!(matches!(ctx.velocity(n1), Err(SensError::VelocityNotSet { .. })));
        assert!(matches!(ctx.range_dot(edge), Err(SensError::VelocityNotSet { .. })));
    }

    #[test]
    fn test_range_dot() {
        let mut ctx = Context::new();
        let (.., edge) = unit_edge(&mut ctx);
        ctx.set_velocity_dot(edge, &[0.0, 1.0]).unwrap();
        let (range, range_dot) = ctx.range_dot(edge).unwrap();
        assert_eq!(range, vec![0.0, 1.0]);
        assert_eq!(range_dot, vec![0.0, 1.0]);
    }
}
