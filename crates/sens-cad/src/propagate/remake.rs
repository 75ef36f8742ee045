//! Decompose-and-rebuild consistency check

use crate::error::{SensError, SensResult};
use crate::model::{Context, EntityId, ObjectClass, TempScope};

/// Rebuild an entity and everything beneath it from its decomposed parts
///
/// Each level is decomposed, rebuilt from the rebuilt children and compared
/// bitwise with the original. The copies are released again, so a successful
/// round trip leaves the context as it found it.
pub fn remake_topology(ctx: &mut Context, id: EntityId) -> SensResult<()> {
    let mut scope = TempScope::new(ctx);
    remake(&mut scope, id)?;
    let released = scope.release();
    tracing::debug!("Remade {} with {} temporary copies", id, released.len());
    Ok(())
}

fn remake(scope: &mut TempScope<'_>, id: EntityId) -> SensResult<EntityId> {
    let class = scope.class_of(id)?;
    if matches!(class, ObjectClass::Curve | ObjectClass::Surface) {
        let parts = scope.get_geometry(id)?.clone();
        let copy = scope.temp(|ctx| ctx.make_geometry(parts.gtype, parts.data.clone()))?;
        if !scope.get_geometry(copy)?.same_as(&parts) {
            return Err(SensError::RemakeMismatch { class, id });
        }
        return Ok(copy);
    }

    let parts = scope.get_topology(id)?.clone();
    let mut rebuilt = parts.clone();
    if let Some(geometry) = parts.geometry {
        rebuilt.geometry = Some(remake(scope, geometry)?);
    }
    for child in rebuilt.children.iter_mut() {
        *child = remake(scope, *child)?;
    }
    let copy = scope.temp(|ctx| ctx.make_topology(&rebuilt))?;

    // the copy must decompose back to exactly what it was made from
    if !scope.get_topology(copy)?.same_as(&rebuilt) {
        return Err(SensError::RemakeMismatch { class, id });
    }
    Ok(copy)
}
