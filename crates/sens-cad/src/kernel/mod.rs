//! Solid-modeling kernel abstraction
//!
//! This module provides the kernel capabilities the sensitivity core consumes
//! and a pure-Rust analytic kernel implementing them.

mod analytic;
mod tessellate;
mod traits;

pub use analytic::AnalyticKernel;
pub(crate) use tessellate::remap;
pub use tessellate::{map_tessellation, segment_count, tessellate_body};
pub use traits::*;
