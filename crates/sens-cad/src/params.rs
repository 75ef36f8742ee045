//! Design parameters
//!
//! Named scalars driving a model. During one sensitivity query exactly one
//! parameter carries a unit velocity and every other velocity is zero.

use serde::{Deserialize, Serialize};

use crate::error::{SensError, SensResult};

/// A named scalar input and its velocity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignParameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub dot: f64,
}

/// Ordered set of design parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignParameters {
    params: Vec<DesignParameter>,
}

impl DesignParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel name and value lists, all velocities zero
    pub fn from_values(names: &[&str], values: &[f64]) -> SensResult<Self> {
        if names.len() != values.len() {
            return Err(SensError::ShapeMismatch {
                what: "design parameter values".into(),
                expected: names.len(),
                actual: values.len(),
            });
        }
        let mut params = Self::new();
        for (name, &value) in names.iter().zip(values) {
            params.push(*name, value);
        }
        Ok(params)
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.params.push(DesignParameter {
            name: name.into(),
            value,
            dot: 0.0,
        });
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DesignParameter> {
        self.params.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesignParameter> {
        self.params.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn dots(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.dot).collect()
    }

    /// Zero every velocity
    pub fn clear(&mut self) {
        self.params.iter_mut().for_each(|p| p.dot = 0.0);
    }

    /// Make `index` the single active direction
    pub fn seed(&mut self, index: usize) -> SensResult<()> {
        if index >= self.params.len() {
            return Err(SensError::InvalidDirection(format!(
                "parameter {index} out of range for {} parameters",
                self.params.len()
            )));
        }
        self.clear();
        self.params[index].dot = 1.0;
        Ok(())
    }

    pub fn seed_named(&mut self, name: &str) -> SensResult<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| SensError::InvalidDirection(format!("unknown parameter {name}")))?;
        self.seed(index)
    }

    /// The active direction, or `None` when every velocity is zero
    ///
    /// Fails unless at most one velocity is nonzero and that one is exactly 1.
    pub fn active_direction(&self) -> SensResult<Option<usize>> {
        let mut active = None;
        for (i, p) in self.params.iter().enumerate() {
            if p.dot == 0.0 {
                continue;
            }
            if p.dot != 1.0 {
                return Err(SensError::InvalidDirection(format!(
                    "parameter {} has velocity {}, expected 0 or 1",
                    p.name, p.dot
                )));
            }
            if let Some(previous) = active.replace(i) {
                return Err(SensError::InvalidDirection(format!(
                    "parameters {} and {} are both active",
                    self.params[previous].name, p.name
                )));
            }
        }
        Ok(active)
    }

    /// Values with the `index`-th scalar incremented by `step`
    pub fn perturbed(&self, index: usize, step: f64) -> SensResult<Vec<f64>> {
        let mut values = self.values();
        let value = values.get_mut(index).ok_or_else(|| {
            SensError::InvalidDirection(format!("parameter {index} out of range"))
        })?;
        *value += step;
        Ok(values)
    }
}
