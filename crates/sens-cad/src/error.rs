//! Structural errors of sensitivity propagation
//!
//! These abort the current computation. Numeric disagreements between analytic
//! and finite-difference derivatives are not errors; they are collected as
//! [`Finding`](crate::oracle::Finding)s.

use thiserror::Error;

use crate::kernel::KernelError;
use crate::model::{EntityId, ObjectClass};

/// Error type for sensitivity operations
#[derive(Debug, Clone, Error)]
pub enum SensError {
    #[error("Velocity not set on {class} {id}")]
    VelocityNotSet { class: ObjectClass, id: EntityId },

    #[error("Shape mismatch for {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported construction: {0}")]
    UnsupportedConstruction(String),

    #[error("Topology count mismatch: {expected} vs {actual} {kind} entities")]
    TopologyCountMismatch {
        kind: ObjectClass,
        expected: usize,
        actual: usize,
    },

    #[error("Sample count mismatch on {kind} {index}: {expected} vs {actual}")]
    SampleCountMismatch {
        kind: ObjectClass,
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Sample {sample} of {kind} {index} does not correspond to the base sample")]
    SampleCorrespondence {
        kind: ObjectClass,
        index: usize,
        sample: usize,
    },

    #[error("Remade {class} {id} is not equivalent to the original")]
    RemakeMismatch { class: ObjectClass, id: EntityId },

    #[error("Invalid design direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Result type for sensitivity operations
pub type SensResult<T> = Result<T, SensError>;
