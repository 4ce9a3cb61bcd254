//! Conic coefficients and the geometric ellipse they describe.

use nalgebra::{Matrix2, Matrix3, Vector2};
use serde::{Deserialize, Serialize};

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// General conic `A x² + B xy + C y² + D x + E y + F = 0`, stored as
/// `[A, B, C, D, E, F]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Geometric ellipse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseParams {
    /// Center x (pixels).
    pub cx: f64,
    /// Center y (pixels).
    pub cy: f64,
    /// Semi-major axis, `>= semi_minor`.
    pub semi_major: f64,
    /// Semi-minor axis, `> 0`.
    pub semi_minor: f64,
    /// Angle of the major axis from +x, radians in (−π/2, π/2].
    pub tilt: f64,
}

impl ConicCoeffs {
    /// `B² − 4AC`; strictly negative for an ellipse.
    pub fn discriminant(&self) -> f64 {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c
    }

    /// Rescale so the quadratic part `(A, B, C)` has unit norm.
    pub fn normalized(&self) -> Option<Self> {
        let [a, b, c, ..] = self.0;
        let k = (a * a + b * b + c * c).sqrt();
        if !k.is_finite() || k < 1e-300 {
            return None;
        }
        Some(Self(self.0.map(|v| v / k)))
    }

    /// Negative discriminant `B² − 4AC`.
    pub fn is_ellipse(&self) -> bool {
        self.discriminant() < 0.0
    }

    /// Value of the conic polynomial at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// Closed-form center, semi-axes and tilt.
    ///
    /// `None` for non-elliptic or degenerate (point / imaginary) conics.
    pub fn to_ellipse(&self) -> Option<EllipseParams> {
        if !self.0.iter().all(|v| v.is_finite()) || !self.is_ellipse() {
            return None;
        }
        let unit = self.normalized()?;
        let [a, b, c, d, e, f] = unit.0;

        let full = Matrix3::new(a, b / 2.0, d / 2.0, b / 2.0, c, e / 2.0, d / 2.0, e / 2.0, f);
        if full.determinant().abs() < 1e-15 {
            return None;
        }

        // Center: gradient of the conic vanishes.
        let quad = Matrix2::new(a, b / 2.0, b / 2.0, c);
        let center = quad.try_inverse()? * Vector2::new(-d / 2.0, -e / 2.0);
        let (cx, cy) = (center[0], center[1]);

        let f0 = unit.eval(cx, cy);
        if f0.abs() < 1e-15 {
            return None;
        }

        // Eigenvalues of the quadratic part.
        let mean = (a + c) / 2.0;
        let half_spread = (((a - c) / 2.0).powi(2) + (b / 2.0).powi(2)).sqrt();
        let l1 = mean + half_spread;
        let l2 = mean - half_spread;
        if l1.abs() < 1e-300 || l2.abs() < 1e-300 {
            return None;
        }
        let r1 = -f0 / l1;
        let r2 = -f0 / l2;
        if r1 <= 0.0 || r2 <= 0.0 {
            return None;
        }

        let tilt = if (a - c).abs() < 1e-15 {
            if b == 0.0 {
                0.0
            } else {
                FRAC_PI_4.copysign(b)
            }
        } else {
            0.5 * b.atan2(a - c)
        };

        // l1 >= l2, so the axis along `tilt` has length sqrt(r1) and is the
        // shorter one whenever r1 < r2.
        let (semi_major, semi_minor, tilt) = if r1 >= r2 {
            (r1.sqrt(), r2.sqrt(), tilt)
        } else {
            (r2.sqrt(), r1.sqrt(), tilt + FRAC_PI_2)
        };

        let ellipse = EllipseParams {
            cx,
            cy,
            semi_major,
            semi_minor,
            tilt: wrap_half_turn(tilt),
        };
        ellipse.is_valid().then_some(ellipse)
    }
}

impl EllipseParams {
    /// Finite center and angle, positive ordered axes.
    pub fn is_valid(&self) -> bool {
        [self.cx, self.cy, self.semi_major, self.semi_minor, self.tilt]
            .iter()
            .all(|v| v.is_finite())
            && self.semi_minor > 0.0
            && self.semi_major >= self.semi_minor
    }

    /// `semi_minor / semi_major` in (0, 1].
    pub fn axis_ratio(&self) -> f64 {
        self.semi_minor / self.semi_major
    }

    /// Tilt of the supporting plane relative to the image plane, radians.
    ///
    /// A circle seen at angle `α` off-axis projects (orthographically) to an
    /// ellipse with `b / a = cos α`.
    pub fn inclination(&self) -> f64 {
        self.axis_ratio().clamp(0.0, 1.0).acos()
    }

    /// [`inclination`](Self::inclination) in degrees.
    pub fn inclination_deg(&self) -> f64 {
        self.inclination().to_degrees()
    }

    /// Implicit form, scaled so the polynomial equals −1 at the center.
    pub fn to_conic(&self) -> ConicCoeffs {
        let (s, c) = self.tilt.sin_cos();
        let ia = 1.0 / (self.semi_major * self.semi_major);
        let ib = 1.0 / (self.semi_minor * self.semi_minor);
        let qa = c * c * ia + s * s * ib;
        let qb = 2.0 * s * c * (ia - ib);
        let qc = s * s * ia + c * c * ib;
        let (x0, y0) = (self.cx, self.cy);
        ConicCoeffs([
            qa,
            qb,
            qc,
            -2.0 * qa * x0 - qb * y0,
            -qb * x0 - 2.0 * qc * y0,
            qa * x0 * x0 + qb * x0 * y0 + qc * y0 * y0 - 1.0,
        ])
    }

    /// `n` boundary points at equal parameter steps.
    pub fn sample_points(&self, n: usize) -> Vec<[f64; 2]> {
        let (s, c) = self.tilt.sin_cos();
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                let u = self.semi_major * t.cos();
                let v = self.semi_minor * t.sin();
                [self.cx + c * u - s * v, self.cy + s * u + c * v]
            })
            .collect()
    }

    /// First-order geometric distance from `(x, y)` to the boundary.
    pub fn sampson_distance(&self, x: f64, y: f64) -> f64 {
        let conic = self.to_conic();
        let [a, b, c, d, e, _] = conic.0;
        let gx = 2.0 * a * x + b * y + d;
        let gy = b * x + 2.0 * c * y + e;
        let g2 = gx * gx + gy * gy;
        let alg = conic.eval(x, y).abs();
        if g2 < 1e-30 {
            alg
        } else {
            alg / g2.sqrt()
        }
    }
}

/// Wrap an axis angle into (−π/2, π/2].
pub(crate) fn wrap_half_turn(mut angle: f64) -> f64 {
    while angle > FRAC_PI_2 {
        angle -= PI;
    }
    while angle <= -FRAC_PI_2 {
        angle += PI;
    }
    angle
}
