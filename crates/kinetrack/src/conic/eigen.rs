//! Eigen-solver for the reduced 3×3 ellipse-fit system.

use nalgebra::{Matrix3, Vector3};

/// Eigenvector of `system` (= C⁻¹M) that satisfies the ellipse constraint
/// `4AC − B² > 0`.
///
/// `system` is not symmetric, so its eigenvalues are taken from the
/// characteristic cubic and each eigenvector from the null space of
/// `system − λI`. When several eigenvectors pass the constraint (only
/// possible with noise-free degenerate input) the smallest |λ| wins.
pub(crate) fn ellipse_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let m = system;
    let trace = m.trace();
    let minors = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
        + m[(0, 0)] * m[(2, 2)]
        - m[(0, 2)] * m[(2, 0)]
        + m[(1, 1)] * m[(2, 2)]
        - m[(1, 2)] * m[(2, 1)];
    let det = m.determinant();

    // λ³ − tr λ² + minors λ − det = 0
    let mut best: Option<(f64, Vector3<f64>)> = None;
    for lambda in real_cubic_roots(-trace, minors, -det) {
        let Some(v) = null_vector(&(m - Matrix3::identity() * lambda)) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] <= 0.0 {
            continue;
        }
        if best.map_or(true, |(l, _)| lambda.abs() < l) {
            best = Some((lambda.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

/// Unit null vector of a rank-2 matrix: the largest cross product of two of
/// its rows.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0 = m.row(0).transpose();
    let r1 = m.row(1).transpose();
    let r2 = m.row(2).transpose();
    let candidates = [r0.cross(&r1), r0.cross(&r2), r1.cross(&r2)];
    let v = candidates
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let n2 = v.norm_squared();
    if !(n2 > 1e-30) {
        return None;
    }
    Some(v / n2.sqrt())
}

/// Real roots of the monic cubic `x³ + b x² + c x + d`.
fn real_cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    use std::f64::consts::PI;

    // x = t − b/3 gives t³ + p t + q = 0.
    let shift = -b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if disc > 0.0 {
        let s = disc.sqrt();
        return vec![(-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt() + shift];
    }

    // Three real roots (trigonometric form); p <= 0 here.
    let m = 2.0 * (-p / 3.0).max(0.0).sqrt();
    if m < 1e-300 {
        return vec![shift];
    }
    let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
    let phi = arg.acos() / 3.0;
    (0..3)
        .map(|k| m * (phi - 2.0 * PI * k as f64 / 3.0).cos() + shift)
        .collect()
}
