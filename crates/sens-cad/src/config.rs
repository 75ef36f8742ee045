//! Finite-difference verification settings

use serde::{Deserialize, Serialize};

use crate::error::{SensError, SensResult};
use crate::kernel::TessQuality;

/// Step size, tolerances and discretization for one ping run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Forward-difference step applied to the active parameter
    pub step: f64,
    /// Absolute tolerance on face sample velocities
    pub face_tol: f64,
    /// Absolute tolerance on edge sample and range velocities
    pub edge_tol: f64,
    /// Absolute tolerance on node velocities
    pub node_tol: f64,
    /// Discretization used for the base tessellation
    pub tess_quality: TessQuality,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            step: 1e-7,
            face_tol: 1e-7,
            edge_tol: 1e-7,
            node_tol: 1e-7,
            tess_quality: TessQuality::default(),
        }
    }
}

impl PingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the finite-difference step
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the face, edge and node tolerances
    pub fn with_tolerances(mut self, face_tol: f64, edge_tol: f64, node_tol: f64) -> Self {
        self.face_tol = face_tol;
        self.edge_tol = edge_tol;
        self.node_tol = node_tol;
        self
    }

    /// Set one tolerance for faces, edges and nodes
    pub fn with_tolerance(self, tol: f64) -> Self {
        self.with_tolerances(tol, tol, tol)
    }

    pub fn with_tess_quality(mut self, quality: TessQuality) -> Self {
        self.tess_quality = quality;
        self
    }

    pub fn validate(&self) -> SensResult<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SensError::InvalidConfig(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        for (name, tol) in [
            ("face_tol", self.face_tol),
            ("edge_tol", self.edge_tol),
            ("node_tol", self.node_tol),
        ] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(SensError::InvalidConfig(format!(
                    "{name} must be non-negative, got {tol}"
                )));
            }
        }
        let q = &self.tess_quality;
        if [q.max_edge_length, q.max_sag, q.max_angle_deg]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(SensError::InvalidConfig(format!(
                "tessellation quality must be positive, got {q:?}"
            )));
        }
        Ok(())
    }
}
