//! Direct least-squares ellipse fit (Fitzgibbon, Pilu & Fisher, 1999).

use nalgebra::{DMatrix, Matrix3, Vector3};

use super::eigen::ellipse_eigenvector;
use super::types::{ConicCoeffs, EllipseParams};

/// Fewest points that determine a conic.
pub const MIN_CONIC_POINTS: usize = 6;

/// Fit a conic constrained to be an ellipse.
///
/// Points are shifted to their centroid and scaled to a mean radius of √2
/// before building the scatter matrix; the returned coefficients are in the
/// caller's coordinates. `None` for too few points, singular scatter blocks,
/// or a result that is not a proper ellipse.
pub fn fit_conic(points: &[[f64; 2]]) -> Option<ConicCoeffs> {
    let n = points.len();
    if n < MIN_CONIC_POINTS {
        return None;
    }
    let frame = Normalization::of(points)?;

    // Design matrix rows [x², xy, y², x, y, 1].
    let design = DMatrix::from_fn(n, 6, |i, j| {
        let [x, y] = frame.apply(points[i]);
        match j {
            0 => x * x,
            1 => x * y,
            2 => y * y,
            3 => x,
            4 => y,
            _ => 1.0,
        }
    });
    let scatter = design.transpose() * &design;

    let s1: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s2: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s3: Matrix3<f64> = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // T = −S3⁻¹ S2ᵀ maps (A, B, C) to (D, E, F).
    let t = -s3.try_inverse()? * s2.transpose();
    let m = s1 + s2 * t;

    // Ellipse constraint 4AC − B² = 1 as aᵀ C a.
    let constraint = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let system = constraint.try_inverse()? * m;

    let quad: Vector3<f64> = ellipse_eigenvector(&system)?;
    let lin = t * quad;

    let conic = frame.restore(&ConicCoeffs([
        quad[0], quad[1], quad[2], lin[0], lin[1], lin[2],
    ]));
    if !conic.is_ellipse() {
        return None;
    }
    conic.to_ellipse()?;
    Some(conic)
}

/// Fit and convert to geometric parameters in one step.
pub fn fit_ellipse(points: &[[f64; 2]]) -> Option<EllipseParams> {
    fit_conic(points)?.to_ellipse()
}

/// RMS Sampson distance of `points` to `ellipse` (0 for an empty set).
pub fn rms_sampson_distance(ellipse: &EllipseParams, points: &[[f64; 2]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum: f64 = points
        .iter()
        .map(|&[x, y]| ellipse.sampson_distance(x, y).powi(2))
        .sum();
    (sum / points.len() as f64).sqrt()
}

/// Similarity transform `p' = s (p − m)` used to condition the fit.
struct Normalization {
    mx: f64,
    my: f64,
    s: f64,
}

impl Normalization {
    fn of(points: &[[f64; 2]]) -> Option<Self> {
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
        let spread = points
            .iter()
            .map(|p| (p[0] - mx).hypot(p[1] - my))
            .sum::<f64>()
            / n;
        if !spread.is_finite() || spread < 1e-12 {
            return None;
        }
        Some(Self {
            mx,
            my,
            s: std::f64::consts::SQRT_2 / spread,
        })
    }

    #[inline]
    fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [(p[0] - self.mx) * self.s, (p[1] - self.my) * self.s]
    }

    /// Substitute `x' = s(x − mx)`, `y' = s(y − my)` back into the conic.
    fn restore(&self, c: &ConicCoeffs) -> ConicCoeffs {
        let [a, b, cc, d, e, f] = c.0;
        let (mx, my, s) = (self.mx, self.my, self.s);
        let s2 = s * s;
        ConicCoeffs([
            a * s2,
            b * s2,
            cc * s2,
            -2.0 * a * s2 * mx - b * s2 * my + d * s,
            -b * s2 * mx - 2.0 * cc * s2 * my + e * s,
            s2 * (a * mx * mx + b * mx * my + cc * my * my) - s * (d * mx + e * my) + f,
        ])
    }
}
