//! Analytic curve and surface evaluation
//!
//! Each geometry type is described by a flat vector of defining data. With
//! `C(u) = cos u * x + sin u * y` the layouts are:
//!
//! | type     | len | data              | position                                   |
//! |----------|-----|-------------------|--------------------------------------------|
//! | Line     | 6   | o, d              | o + t * d / \|d\|                          |
//! | Circle   | 10  | c, x, y, r        | c + r * C(t)                               |
//! | Plane    | 9   | o, x, y           | o + u * x + v * y                          |
//! | Sphere   | 13  | c, x, y, z, r     | c + r * (cos v * C(u) + sin v * z)         |
//! | Cylinder | 13  | o, x, y, z, r     | o + r * C(u) + v * z                       |
//! | Cone     | 13  | a, x, y, z, k     | a + v * k * C(u) + v * z                   |
//! | Torus    | 14  | c, x, y, z, R, r  | c + (R + r cos v) * C(u) + r sin v * z     |

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::ObjectClass;
use crate::dual::{Dual, Dual3, join};
use crate::kernel::{KernelError, KernelResult};

/// Analytic geometry families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Line,
    Circle,
    Plane,
    Sphere,
    Cylinder,
    Cone,
    Torus,
}

impl GeometryType {
    /// Length of the defining-data vector
    pub fn data_len(self) -> usize {
        match self {
            GeometryType::Line => 6,
            GeometryType::Circle => 10,
            GeometryType::Plane => 9,
            GeometryType::Sphere | GeometryType::Cylinder | GeometryType::Cone => 13,
            GeometryType::Torus => 14,
        }
    }

    /// Curve or surface
    pub fn class(self) -> ObjectClass {
        match self {
            GeometryType::Line | GeometryType::Circle => ObjectClass::Curve,
            _ => ObjectClass::Surface,
        }
    }

    /// Number of parameters an evaluation takes (1 for curves, 2 for surfaces)
    pub fn param_count(self) -> usize {
        match self.class() {
            ObjectClass::Curve => 1,
            _ => 2,
        }
    }
}

/// Position and partial derivatives at a parametric location
///
/// Curves fill only the `du`/`duu` slots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluation {
    pub point: DVec3,
    pub du: DVec3,
    pub dv: DVec3,
    pub duu: DVec3,
    pub duv: DVec3,
    pub dvv: DVec3,
}

impl Evaluation {
    /// A point with no parametric freedom
    pub fn at(point: DVec3) -> Self {
        Self {
            point,
            ..Default::default()
        }
    }
}

fn v3(data: &[f64], offset: usize) -> DVec3 {
    DVec3::new(data[offset], data[offset + 1], data[offset + 2])
}

fn check(gtype: GeometryType, data_len: usize, params_len: usize) -> KernelResult<()> {
    if data_len != gtype.data_len() {
        return Err(KernelError::InvalidData {
            what: format!("{gtype:?} data"),
            expected: gtype.data_len(),
            actual: data_len,
        });
    }
    if params_len != gtype.param_count() {
        return Err(KernelError::InvalidData {
            what: format!("{gtype:?} parameters"),
            expected: gtype.param_count(),
            actual: params_len,
        });
    }
    Ok(())
}

/// Evaluate position with first and second partials
pub fn evaluate(gtype: GeometryType, data: &[f64], params: &[f64]) -> KernelResult<Evaluation> {
    check(gtype, data.len(), params.len())?;

    let eval = match gtype {
        GeometryType::Line => {
            let o = v3(data, 0);
            let d = v3(data, 3);
            let len = d.length();
            if len == 0.0 {
                return Err(KernelError::Evaluation("degenerate line direction".into()));
            }
            let e = d / len;
            Evaluation {
                point: o + params[0] * e,
                du: e,
                ..Default::default()
            }
        }
        GeometryType::Circle => {
            let (c, x, y, r) = (v3(data, 0), v3(data, 3), v3(data, 6), data[9]);
            let (s, co) = params[0].sin_cos();
            let radial = co * x + s * y;
            Evaluation {
                point: c + r * radial,
                du: r * (-s * x + co * y),
                duu: -r * radial,
                ..Default::default()
            }
        }
        GeometryType::Plane => {
            let (o, x, y) = (v3(data, 0), v3(data, 3), v3(data, 6));
            Evaluation {
                point: o + params[0] * x + params[1] * y,
                du: x,
                dv: y,
                ..Default::default()
            }
        }
        GeometryType::Sphere => {
            let (c, x, y, z, r) = (v3(data, 0), v3(data, 3), v3(data, 6), v3(data, 9), data[12]);
            let (su, cu) = params[0].sin_cos();
            let (sv, cv) = params[1].sin_cos();
            let radial = cu * x + su * y;
            let tangent = -su * x + cu * y;
            Evaluation {
                point: c + r * (cv * radial + sv * z),
                du: r * cv * tangent,
                dv: r * (-sv * radial + cv * z),
                duu: -r * cv * radial,
                duv: -r * sv * tangent,
                dvv: -r * (cv * radial + sv * z),
            }
        }
        GeometryType::Cylinder => {
            let (o, x, y, z, r) = (v3(data, 0), v3(data, 3), v3(data, 6), v3(data, 9), data[12]);
            let (su, cu) = params[0].sin_cos();
            let radial = cu * x + su * y;
            Evaluation {
                point: o + r * radial + params[1] * z,
                du: r * (-su * x + cu * y),
                dv: z,
                duu: -r * radial,
                ..Default::default()
            }
        }
        GeometryType::Cone => {
            let (a, x, y, z, k) = (v3(data, 0), v3(data, 3), v3(data, 6), v3(data, 9), data[12]);
            let (su, cu) = params[0].sin_cos();
            let v = params[1];
            let radial = cu * x + su * y;
            let tangent = -su * x + cu * y;
            Evaluation {
                point: a + v * k * radial + v * z,
                du: v * k * tangent,
                dv: k * radial + z,
                duu: -v * k * radial,
                duv: k * tangent,
                ..Default::default()
            }
        }
        GeometryType::Torus => {
            let (c, x, y, z) = (v3(data, 0), v3(data, 3), v3(data, 6), v3(data, 9));
            let (major, minor) = (data[12], data[13]);
            let (su, cu) = params[0].sin_cos();
            let (sv, cv) = params[1].sin_cos();
            let radial = cu * x + su * y;
            let tangent = -su * x + cu * y;
            let ring = major + minor * cv;
            Evaluation {
                point: c + ring * radial + minor * sv * z,
                du: ring * tangent,
                dv: -minor * sv * radial + minor * cv * z,
                duu: -ring * radial,
                duv: -minor * sv * tangent,
                dvv: -minor * cv * radial - minor * sv * z,
            }
        }
    };
    Ok(eval)
}

/// Position as a function of dual data and dual parameters
///
/// The derivative part is the total derivative of the position with respect
/// to both the defining data and the parameters.
pub fn position_dual(gtype: GeometryType, data: &[Dual], params: &[Dual]) -> KernelResult<Dual3> {
    check(gtype, data.len(), params.len())?;

    let p = |i| Dual3::from_slice(data, i);
    let point = match gtype {
        GeometryType::Line => {
            let d = p(3);
            let len = d.length();
            if len.re == 0.0 {
                return Err(KernelError::Evaluation("degenerate line direction".into()));
            }
            p(0) + d * (params[0] / len)
        }
        GeometryType::Circle => p(0) + (p(3) * params[0].cos() + p(6) * params[0].sin()) * data[9],
        GeometryType::Plane => p(0) + p(3) * params[0] + p(6) * params[1],
        GeometryType::Sphere => {
            let radial = p(3) * params[0].cos() + p(6) * params[0].sin();
            p(0) + (radial * params[1].cos() + p(9) * params[1].sin()) * data[12]
        }
        GeometryType::Cylinder => {
            let radial = p(3) * params[0].cos() + p(6) * params[0].sin();
            p(0) + radial * data[12] + p(9) * params[1]
        }
        GeometryType::Cone => {
            let radial = p(3) * params[0].cos() + p(6) * params[0].sin();
            p(0) + radial * (params[1] * data[12]) + p(9) * params[1]
        }
        GeometryType::Torus => {
            let radial = p(3) * params[0].cos() + p(6) * params[0].sin();
            let ring = data[12] + data[13] * params[1].cos();
            p(0) + radial * ring + p(9) * (data[13] * params[1].sin())
        }
    };
    Ok(point)
}

/// Position and its velocity given data and parameter velocities
pub fn evaluate_dot(
    gtype: GeometryType,
    data: &[f64],
    data_dot: &[f64],
    params: &[f64],
    params_dot: &[f64],
) -> KernelResult<(DVec3, DVec3)> {
    if data_dot.len() != data.len() {
        return Err(KernelError::InvalidData {
            what: format!("{gtype:?} data velocity"),
            expected: data.len(),
            actual: data_dot.len(),
        });
    }
    if params_dot.len() != params.len() {
        return Err(KernelError::InvalidData {
            what: format!("{gtype:?} parameter velocity"),
            expected: params.len(),
            actual: params_dot.len(),
        });
    }
    let point = position_dual(gtype, &join(data, data_dot), &join(params, params_dot))?;
    Ok((point.value(), point.velocity()))
}
