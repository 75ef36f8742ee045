//! Scoped release of temporary entities

use std::ops::{Deref, DerefMut};

use super::{Context, EntityId};
use crate::kernel::KernelResult;

/// Tracks temporaries created while assembling a composite entity
///
/// Every tracked handle is released in reverse creation order when the scope
/// ends, including when construction bails out early with `?`. Entities still
/// referenced by a surviving parent stay alive through that reference.
pub struct TempScope<'a> {
    ctx: &'a mut Context,
    stack: Vec<EntityId>,
}

impl<'a> TempScope<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
        }
    }

    /// Track an entity for release
    pub fn push(&mut self, id: EntityId) -> EntityId {
        self.stack.push(id);
        id
    }

    /// Create an entity and track it
    pub fn temp<F>(&mut self, make: F) -> KernelResult<EntityId>
    where
        F: FnOnce(&mut Context) -> KernelResult<EntityId>,
    {
        let id = make(&mut *self.ctx)?;
        Ok(self.push(id))
    }

    /// Stop tracking an entity so it outlives the scope
    pub fn keep(&mut self, id: EntityId) {
        if let Some(pos) = self.stack.iter().rposition(|&e| e == id) {
            self.stack.remove(pos);
        }
    }

    /// Number of tracked temporaries
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// End the scope now, returning the handles in the order they were released
    pub fn release(mut self) -> Vec<EntityId> {
        self.release_all()
    }

    fn release_all(&mut self) -> Vec<EntityId> {
        let mut released = Vec::with_capacity(self.stack.len());
        while let Some(id) = self.stack.pop() {
            if let Err(e) = self.ctx.delete(id) {
                tracing::warn!("Failed to release temporary {}: {}", id, e);
            }
            released.push(id);
        }
        released
    }
}

impl Deref for TempScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &*self.ctx
    }
}

impl DerefMut for TempScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }
}

impl Drop for TempScope<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}
