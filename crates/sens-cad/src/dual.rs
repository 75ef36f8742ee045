//! Forward-mode dual numbers
//!
//! A [`Dual`] carries a value together with its derivative along the single
//! active design direction. Every construction recipe in this crate is written
//! once against these types, so evaluating it yields both the geometry and the
//! geometry's velocity from the same arithmetic.

use glam::DVec3;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A scalar value paired with its directional derivative
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual {
    /// Value
    pub re: f64,
    /// Derivative along the active direction
    pub eps: f64,
}

impl Dual {
    /// Zero value with zero derivative
    pub const ZERO: Dual = Dual { re: 0.0, eps: 0.0 };

    /// Create a dual from a value and its derivative
    pub const fn new(re: f64, eps: f64) -> Self {
        Self { re, eps }
    }

    /// A quantity that does not move with the design
    pub const fn constant(re: f64) -> Self {
        Self { re, eps: 0.0 }
    }

    pub fn sin(self) -> Self {
        Self::new(self.re.sin(), self.eps * self.re.cos())
    }

    pub fn cos(self) -> Self {
        Self::new(self.re.cos(), -self.eps * self.re.sin())
    }

    pub fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        let eps = if s > 0.0 { self.eps / (2.0 * s) } else { 0.0 };
        Self::new(s, eps)
    }

    pub fn abs(self) -> Self {
        if self.re < 0.0 { -self } else { self }
    }
}

impl Add for Dual {
    type Output = Dual;
    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.re + rhs.re, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Dual;
    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.re - rhs.re, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(self.re * rhs.re, self.eps * rhs.re + self.re * rhs.eps)
    }
}

impl Div for Dual {
    type Output = Dual;
    fn div(self, rhs: Dual) -> Dual {
        Dual::new(
            self.re / rhs.re,
            (self.eps * rhs.re - self.re * rhs.eps) / (rhs.re * rhs.re),
        )
    }
}

impl Neg for Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual::new(-self.re, -self.eps)
    }
}

impl Add<f64> for Dual {
    type Output = Dual;
    fn add(self, rhs: f64) -> Dual {
        Dual::new(self.re + rhs, self.eps)
    }
}

impl Sub<f64> for Dual {
    type Output = Dual;
    fn sub(self, rhs: f64) -> Dual {
        Dual::new(self.re - rhs, self.eps)
    }
}

impl Mul<f64> for Dual {
    type Output = Dual;
    fn mul(self, rhs: f64) -> Dual {
        Dual::new(self.re * rhs, self.eps * rhs)
    }
}

impl Div<f64> for Dual {
    type Output = Dual;
    fn div(self, rhs: f64) -> Dual {
        Dual::new(self.re / rhs, self.eps / rhs)
    }
}

impl Mul<Dual> for f64 {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        rhs * self
    }
}

/// A 3-vector of [`Dual`] components
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual3 {
    pub x: Dual,
    pub y: Dual,
    pub z: Dual,
}

impl Dual3 {
    pub const ZERO: Dual3 = Dual3 {
        x: Dual::ZERO,
        y: Dual::ZERO,
        z: Dual::ZERO,
    };

    pub const fn new(x: Dual, y: Dual, z: Dual) -> Self {
        Self { x, y, z }
    }

    /// Build from a value and its velocity
    pub fn from_parts(value: DVec3, velocity: DVec3) -> Self {
        Self::new(
            Dual::new(value.x, velocity.x),
            Dual::new(value.y, velocity.y),
            Dual::new(value.z, velocity.z),
        )
    }

    pub fn constant(value: DVec3) -> Self {
        Self::from_parts(value, DVec3::ZERO)
    }

    /// Read three consecutive components from a dual slice
    pub fn from_slice(data: &[Dual], offset: usize) -> Self {
        Self::new(data[offset], data[offset + 1], data[offset + 2])
    }

    pub fn value(self) -> DVec3 {
        DVec3::new(self.x.re, self.y.re, self.z.re)
    }

    pub fn velocity(self) -> DVec3 {
        DVec3::new(self.x.eps, self.y.eps, self.z.eps)
    }

    pub fn dot(self, rhs: Dual3) -> Dual {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Dual3) -> Dual3 {
        Dual3::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> Dual {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Dual3 {
        self / self.length()
    }

    /// Append the three components to a defining-data vector
    pub fn extend_into(self, out: &mut Vec<Dual>) {
        out.extend([self.x, self.y, self.z]);
    }
}

impl Add for Dual3 {
    type Output = Dual3;
    fn add(self, rhs: Dual3) -> Dual3 {
        Dual3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Dual3 {
    type Output = Dual3;
    fn sub(self, rhs: Dual3) -> Dual3 {
        Dual3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Dual3 {
    type Output = Dual3;
    fn neg(self) -> Dual3 {
        Dual3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<Dual> for Dual3 {
    type Output = Dual3;
    fn mul(self, rhs: Dual) -> Dual3 {
        Dual3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<f64> for Dual3 {
    type Output = Dual3;
    fn mul(self, rhs: f64) -> Dual3 {
        Dual3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<Dual> for Dual3 {
    type Output = Dual3;
    fn div(self, rhs: Dual) -> Dual3 {
        Dual3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// Split a dual slice into its values and velocities
pub fn split(data: &[Dual]) -> (Vec<f64>, Vec<f64>) {
    data.iter().map(|d| (d.re, d.eps)).unzip()
}

/// Pair plain values with their velocities
pub fn join(values: &[f64], velocities: &[f64]) -> Vec<Dual> {
    values
        .iter()
        .zip(velocities)
        .map(|(&re, &eps)| Dual::new(re, eps))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_product_rule() {
        let a = Dual::new(3.0, 1.0);
        let b = Dual::new(2.0, 0.5);
        let p = a * b;
        assert_eq!(p.re, 6.0);
        assert_eq!(p.eps, 1.0 * 2.0 + 3.0 * 0.5);
    }

    #[test]
    fn test_quotient_and_sqrt() {
        let x = Dual::new(4.0, 1.0);
        let s = x.sqrt();
        assert_abs_diff_eq!(s.re, 2.0);
        assert_abs_diff_eq!(s.eps, 0.25);

        let q = Dual::constant(1.0) / x;
        assert_abs_diff_eq!(q.eps, -1.0 / 16.0);
    }

    #[test]
    fn test_trig_derivatives() {
        let t = Dual::new(0.3, 2.0);
        assert_abs_diff_eq!(t.sin().eps, 2.0 * 0.3f64.cos());
        assert_abs_diff_eq!(t.cos().eps, -2.0 * 0.3f64.sin());
    }

    #[test]
    fn test_norm_derivative() {
        // d|d| = d . d_dot / |d|
        let d = Dual3::from_parts(DVec3::new(3.0, 4.0, 0.0), DVec3::new(1.0, 0.0, 0.0));
        let len = d.length();
        assert_abs_diff_eq!(len.re, 5.0);
        assert_abs_diff_eq!(len.eps, 3.0 / 5.0);

        let n = d.normalize();
        assert_abs_diff_eq!(n.value().length(), 1.0, epsilon = 1e-15);
        // a unit vector's velocity is orthogonal to it
        assert_abs_diff_eq!(n.value().dot(n.velocity()), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_split_join() {
        let data = join(&[1.0, 2.0], &[0.0, 1.0]);
        let (values, velocities) = split(&data);
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(velocities, vec![0.0, 1.0]);
    }
}
