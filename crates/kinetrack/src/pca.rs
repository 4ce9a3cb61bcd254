//! Principal direction of a 2-D point cloud.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::conic::wrap_half_turn;

/// Relative anisotropy below which the covariance counts as isotropic.
const ISOTROPY_EPS: f64 = 1e-9;

/// Mean and second moments of a point cloud, plus the major-axis angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrincipalAxis {
    pub mean: [f64; 2],
    /// Major-axis angle from +x, radians in (−π/2, π/2] (or (−π, π] after
    /// [`oriented`](Self::oriented)).
    pub angle: f64,
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl PrincipalAxis {
    pub fn angle_deg(&self) -> f64 {
        self.angle.to_degrees()
    }

    /// Unit vector along the axis.
    pub fn direction(&self) -> [f64; 2] {
        let (s, c) = self.angle.sin_cos();
        [c, s]
    }

    /// Flip the axis by π when needed so that `to` projects ahead of `from`.
    ///
    /// The angle then lies in (−π, π] and follows the direction of travel.
    pub fn oriented(mut self, from: [f64; 2], to: [f64; 2]) -> Self {
        if self.project(to) < self.project(from) {
            self.angle = if self.angle > 0.0 {
                self.angle - PI
            } else {
                self.angle + PI
            };
        }
        self
    }

    /// Signed coordinate of `p` along the axis, relative to the mean.
    pub fn project(&self, p: [f64; 2]) -> f64 {
        let [dx, dy] = self.direction();
        (p[0] - self.mean[0]) * dx + (p[1] - self.mean[1]) * dy
    }
}

/// Covariance principal axis; `None` for fewer than two points.
///
/// Near-isotropic clouds report angle 0.
pub fn principal_axis(points: &[[f64; 2]]) -> Option<PrincipalAxis> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p[0] - mx;
        let dy = p[1] - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if !(sxx.is_finite() && syy.is_finite() && sxy.is_finite()) {
        return None;
    }
    let spread = (sxx - syy).hypot(2.0 * sxy);
    let angle = if spread <= ISOTROPY_EPS * (sxx + syy) || spread == 0.0 {
        0.0
    } else {
        wrap_half_turn(0.5 * (2.0 * sxy).atan2(sxx - syy))
    };
    Some(PrincipalAxis {
        mean: [mx, my],
        angle,
        sxx,
        syy,
        sxy,
    })
}

/// Median of undirected axis angles (radians, period π); `None` when empty
/// or all NaN.
///
/// Angles are unwrapped into the half-turn centred on their doubled-angle
/// mean before taking the median, so axes straddling ±π/2 stay together.
/// The result lies in (−π/2, π/2].
pub fn median_angle(angles: &[f64]) -> Option<f64> {
    let finite = angles.iter().copied().filter(|a| a.is_finite());
    let (s2, c2) = finite
        .clone()
        .fold((0.0f64, 0.0f64), |(s, c), a| (s + (2.0 * a).sin(), c + (2.0 * a).cos()));
    let center = 0.5 * s2.atan2(c2);
    let mut v: Vec<f64> = finite
        .map(|mut a| {
            while a > center + FRAC_PI_2 {
                a -= PI;
            }
            while a <= center - FRAC_PI_2 {
                a += PI;
            }
            a
        })
        .collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    let median = if v.len() % 2 == 1 {
        v[mid]
    } else {
        0.5 * (v[mid - 1] + v[mid])
    };
    Some(wrap_half_turn(median))
}
