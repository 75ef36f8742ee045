//! Kernel trait definitions
//!
//! These traits define the capabilities the sensitivity core consumes from a
//! solid-modeling kernel: primitive construction, the derivative of that
//! construction, tessellation, and index-preserving tessellation mapping.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Context, EntityId, ObjectClass};

/// Error type for kernel and model operations
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("Entity {0} belongs to another context")]
    ForeignEntity(EntityId),

    #[error("Entity {id} is a {actual}, expected a {expected}")]
    InvalidClass {
        id: EntityId,
        expected: ObjectClass,
        actual: ObjectClass,
    },

    #[error("Invalid {what}: expected {expected} values, got {actual}")]
    InvalidData {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Tessellation failed: {0}")]
    TessellationFailed(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Native solid primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Base corner and extents
    Box,
    /// Centre and radius
    Sphere,
    /// Apex, base centre and base radius
    Cone,
    /// Base centre, top centre and radius
    Cylinder,
    /// Centre, axis, major and minor radius
    Torus,
}

impl PrimitiveKind {
    /// Length of the defining parameter vector
    pub fn param_count(self) -> usize {
        self.parameter_names().len()
    }

    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            PrimitiveKind::Box => &["x", "y", "z", "dx", "dy", "dz"],
            PrimitiveKind::Sphere => &["cx", "cy", "cz", "r"],
            PrimitiveKind::Cone => &["ax", "ay", "az", "bx", "by", "bz", "r"],
            PrimitiveKind::Cylinder => &["x0", "y0", "z0", "x1", "y1", "z1", "r"],
            PrimitiveKind::Torus => &["cx", "cy", "cz", "nx", "ny", "nz", "major", "minor"],
        }
    }
}

/// Which way the faces of a primitive point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Outward,
    Inward,
}

impl Orientation {
    pub fn sign(self) -> f64 {
        match self {
            Orientation::Outward => 1.0,
            Orientation::Inward => -1.0,
        }
    }
}

/// A primitive solid request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub orientation: Orientation,
    pub params: Vec<f64>,
}

impl Primitive {
    /// Create a primitive, checking the parameter count
    pub fn new(kind: PrimitiveKind, orientation: Orientation, params: Vec<f64>) -> KernelResult<Self> {
        if params.len() != kind.param_count() {
            return Err(KernelError::InvalidData {
                what: format!("{kind:?} parameters"),
                expected: kind.param_count(),
                actual: params.len(),
            });
        }
        Ok(Self {
            kind,
            orientation,
            params,
        })
    }

    /// Same primitive with different parameter values
    pub fn with_params(&self, params: Vec<f64>) -> KernelResult<Self> {
        Self::new(self.kind, self.orientation, params)
    }
}

/// Velocity of one edge: its curve data and its range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeVelocity {
    pub curve_dot: Vec<f64>,
    pub range_dot: [f64; 2],
}

/// Velocity of one face: its surface data and its uv box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceVelocity {
    pub surface_dot: Vec<f64>,
    pub uv_dot: [f64; 4],
}

/// Velocities of every child of a primitive body, in body-children order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyVelocity {
    pub nodes: Vec<DVec3>,
    pub edges: Vec<EdgeVelocity>,
    pub faces: Vec<FaceVelocity>,
}

/// Discretization quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TessQuality {
    /// Longest allowed segment
    pub max_edge_length: f64,
    /// Largest allowed chord height
    pub max_sag: f64,
    /// Largest allowed turning angle per segment, in degrees
    pub max_angle_deg: f64,
}

impl Default for TessQuality {
    fn default() -> Self {
        Self {
            max_edge_length: 0.2,
            max_sag: 0.01,
            max_angle_deg: 12.0,
        }
    }
}

impl TessQuality {
    pub fn new(max_edge_length: f64, max_sag: f64, max_angle_deg: f64) -> Self {
        Self {
            max_edge_length,
            max_sag,
            max_angle_deg,
        }
    }
}

/// Samples along one edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeSamples {
    pub points: Vec<DVec3>,
    pub t: Vec<f64>,
    /// Edge range at tessellation time
    pub range: [f64; 2],
}

/// Triangulated samples of one face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceSamples {
    pub points: Vec<DVec3>,
    pub uv: Vec<[f64; 2]>,
    pub triangles: Vec<[u32; 3]>,
    /// Face uv box at tessellation time
    pub uv_box: [f64; 4],
}

/// Discretization of one body, indexed like its body children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tessellation {
    pub body: EntityId,
    pub quality: TessQuality,
    pub edges: Vec<EdgeSamples>,
    pub faces: Vec<FaceSamples>,
}

impl Tessellation {
    pub fn edge_samples(&self, index: usize) -> Option<&EdgeSamples> {
        self.edges.get(index)
    }

    pub fn face_samples(&self, index: usize) -> Option<&FaceSamples> {
        self.faces.get(index)
    }

    /// Total number of edge and face sample points
    pub fn point_count(&self) -> usize {
        self.edges.iter().map(|e| e.points.len()).sum::<usize>()
            + self.faces.iter().map(|f| f.points.len()).sum::<usize>()
    }
}

/// Derivative of primitive construction
///
/// Given a primitive and a velocity of its parameter vector, return the
/// velocity of every node, edge and face of the body the kernel builds for
/// that primitive, in the order `Context::body_children` lists them.
pub trait PrimitiveDerivative {
    fn solid_velocity(&self, primitive: &Primitive, params_dot: &[f64]) -> KernelResult<BodyVelocity>;
}

/// Trait for solid-modeling kernels
pub trait CadKernel: PrimitiveDerivative + Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Build a solid body for a primitive
    fn make_solid(&self, ctx: &mut Context, primitive: &Primitive) -> KernelResult<EntityId>;

    /// Tessellate every edge and face of a body
    fn tessellate(
        &self,
        ctx: &Context,
        body: EntityId,
        quality: &TessQuality,
    ) -> KernelResult<Tessellation>;

    /// Tessellate `body` at the samples of `base`, preserving every index
    ///
    /// `body` must have the same topology as the body `base` was made from.
    fn map_tessellation(
        &self,
        ctx: &Context,
        base: &Tessellation,
        body: EntityId,
    ) -> KernelResult<Tessellation>;
}

/// A no-op kernel used when no backend is available
pub struct NullKernel;

impl PrimitiveDerivative for NullKernel {
    fn solid_velocity(&self, _primitive: &Primitive, _params_dot: &[f64]) -> KernelResult<BodyVelocity> {
        Err(KernelError::KernelNotAvailable("No CAD kernel available".into()))
    }
}

impl CadKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn make_solid(&self, _ctx: &mut Context, _primitive: &Primitive) -> KernelResult<EntityId> {
        Err(KernelError::KernelNotAvailable("No CAD kernel available".into()))
    }

    fn tessellate(
        &self,
        _ctx: &Context,
        _body: EntityId,
        _quality: &TessQuality,
    ) -> KernelResult<Tessellation> {
        Err(KernelError::KernelNotAvailable("No CAD kernel available".into()))
    }

    fn map_tessellation(
        &self,
        _ctx: &Context,
        _base: &Tessellation,
        _body: EntityId,
    ) -> KernelResult<Tessellation> {
        Err(KernelError::KernelNotAvailable("No CAD kernel available".into()))
    }
}

/// Get the default kernel
pub fn default_kernel() -> Box<dyn CadKernel> {
    Box::new(super::AnalyticKernel::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_param_count() {
        assert_eq!(PrimitiveKind::Box.param_count(), 6);
        assert_eq!(PrimitiveKind::Sphere.param_count(), 4);
        assert_eq!(PrimitiveKind::Torus.param_count(), 8);
        assert!(Primitive::new(PrimitiveKind::Box, Orientation::Outward, vec![1.0; 5]).is_err());
    }

    #[test]
    fn test_null_kernel_refuses() {
        let kernel = NullKernel;
        let mut ctx = Context::new();
        let prim = Primitive::new(PrimitiveKind::Sphere, Orientation::Outward, vec![0.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert!(!kernel.is_available());
        assert!(matches!(
            kernel.make_solid(&mut ctx, &prim),
            Err(KernelError::KernelNotAvailable(_))
        ));
        assert!(kernel.solid_velocity(&prim, &[0.0; 4]).is_err());
    }

    #[test]
    fn test_default_kernel_is_available() {
        let kernel = default_kernel();
        assert!(kernel.is_available());
        assert_eq!(kernel.name(), "analytic");
    }
}
