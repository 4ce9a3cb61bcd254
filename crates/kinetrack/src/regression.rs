//! Least-squares curve fits used for the kinematic post-pass.

use serde::{Deserialize, Serialize};

/// Pivots at or below this magnitude are treated as zero.
const PIVOT_EPS: f64 = 1e-12;

/// `y = a·t + b` over `domain = [t_min, t_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub a: f64,
    pub b: f64,
    pub domain: [f64; 2],
}

impl LinearFit {
    pub fn eval(&self, t: f64) -> f64 {
        self.a * t + self.b
    }

    /// `n` evenly spaced `(t, y)` pairs over the fitted domain.
    pub fn sample(&self, n: usize) -> Vec<[f64; 2]> {
        sample_domain(self.domain, n, |t| self.eval(t))
    }
}

/// `y = a·t² + b·t + c` over `domain`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub domain: [f64; 2],
}

impl QuadraticFit {
    pub fn eval(&self, t: f64) -> f64 {
        (self.a * t + self.b) * t + self.c
    }

    /// Physical acceleration when `y(t) = ½·acc·t² + v0·t + x0`.
    pub fn acceleration(&self) -> f64 {
        2.0 * self.a
    }

    /// Velocity at `t = 0`.
    pub fn initial_velocity(&self) -> f64 {
        self.b
    }

    pub fn sample(&self, n: usize) -> Vec<[f64; 2]> {
        sample_domain(self.domain, n, |t| self.eval(t))
    }
}

fn sample_domain<F: Fn(f64) -> f64>(domain: [f64; 2], n: usize, f: F) -> Vec<[f64; 2]> {
    let [t0, t1] = domain;
    match n {
        0 => Vec::new(),
        1 => vec![[t0, f(t0)]],
        _ => (0..n)
            .map(|i| {
                let t = t0 + (t1 - t0) * i as f64 / (n - 1) as f64;
                [t, f(t)]
            })
            .collect(),
    }
}

fn domain_of(t: &[f64]) -> [f64; 2] {
    if t.is_empty() {
        return [0.0, 0.0];
    }
    let lo = t.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    [lo, hi]
}

/// Closed-form linear least squares over paired slices (extra elements of the
/// longer slice are ignored).
///
/// A vanishing denominator (fewer than two distinct `t`) yields the flat fit
/// `a = 0, b = mean(y)`; an empty input yields `a = b = 0`.
pub fn fit_linear(t: &[f64], y: &[f64]) -> LinearFit {
    let n = t.len().min(y.len());
    let (t, y) = (&t[..n], &y[..n]);
    let domain = domain_of(t);
    if n == 0 {
        return LinearFit {
            a: 0.0,
            b: 0.0,
            domain,
        };
    }
    let nf = n as f64;
    let st: f64 = t.iter().sum();
    let sy: f64 = y.iter().sum();
    let stt: f64 = t.iter().map(|v| v * v).sum();
    let sty: f64 = t.iter().zip(y).map(|(a, b)| a * b).sum();
    let denom = nf * stt - st * st;
    let scale = (nf * stt).abs().max(1.0);
    if !(denom.abs() > 1e-12 * scale) {
        return LinearFit {
            a: 0.0,
            b: sy / nf,
            domain,
        };
    }
    let a = (nf * sty - st * sy) / denom;
    let b = (sy - a * st) / nf;
    LinearFit { a, b, domain }
}

/// Quadratic least squares from the 3×3 normal equations.
///
/// `None` with fewer than three points or a singular system (fewer than
/// three distinct `t`).
pub fn fit_quadratic(t: &[f64], y: &[f64]) -> Option<QuadraticFit> {
    let n = t.len().min(y.len());
    if n < 3 {
        return None;
    }
    let (t, y) = (&t[..n], &y[..n]);
    // Power sums Σt^k for k = 0..4 and Σ t^k y for k = 0..2.
    let mut s = [0.0f64; 5];
    let mut r = [0.0f64; 3];
    for (&ti, &yi) in t.iter().zip(y) {
        let mut p = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += p;
            if k < 3 {
                r[k] += p * yi;
            }
            p *= ti;
        }
    }
    let normal = vec![
        vec![s[4], s[3], s[2]],
        vec![s[3], s[2], s[1]],
        vec![s[2], s[1], s[0]],
    ];
    let coeffs = solve_linear_system(normal, vec![r[2], r[1], r[0]])?;
    Some(QuadraticFit {
        a: coeffs[0],
        b: coeffs[1],
        c: coeffs[2],
        domain: domain_of(t),
    })
}

/// Solve `a·x = b` for square `a` by Gaussian elimination with partial
/// pivoting.
///
/// `None` for mismatched shapes or when no pivot above the tolerance exists
/// in some column.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }
    let scale = a
        .iter()
        .flatten()
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if !(a[pivot_row][col].abs() > PIVOT_EPS * scale) {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
