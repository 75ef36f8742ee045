//! Design Sensitivity Propagation and Verification
//!
//! This crate provides:
//! - A reference counted B-rep model context with decomposable entities
//! - A velocity store attaching directional derivatives to entity data
//! - Chain-rule propagation through lines, loops, planar faces and primitive solids
//! - A finite-difference oracle comparing analytic velocities with perturbed tessellations
//! - Scenario drivers for box, sphere, cone, cylinder, torus and face-from-loop bodies

pub mod config;
pub mod dual;
pub mod error;
pub mod kernel;
pub mod model;
pub mod oracle;
pub mod params;
pub mod propagate;
pub mod scenario;
mod velocity;

// Re-exports for convenience
pub use config::PingConfig;
pub use error::{SensError, SensResult};
pub use kernel::{
    AnalyticKernel, BodyVelocity, CadKernel, KernelError, KernelResult, NullKernel, Orientation,
    Primitive, PrimitiveDerivative, PrimitiveKind, TessQuality, Tessellation, default_kernel,
};
pub use model::{BodyClass, Context, EntityId, ObjectClass, Sense, TempScope, Velocity};
pub use oracle::{Finding, FindingKind, PingReport, ping_bodies};
pub use params::{DesignParameter, DesignParameters};
pub use scenario::{
    Family, Scenario, ScenarioDriver, ScenarioOutcome, ScenarioState, SuiteConfig, SuiteReport,
    run_scenario, run_suite,
};
