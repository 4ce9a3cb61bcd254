//! Ellipse fitting for tilted circular targets.
//!
//! A printed circle viewed off-axis projects to an ellipse; its axis ratio
//! gives the inclination of the target plane. Implements:
//! - direct least-squares conic fit with the ellipse-specific constraint,
//! - closed-form conic → (center, semi-axes, tilt) extraction,
//! - Sampson residuals for fit quality gating.

mod eigen;
mod fit;
mod types;

pub use fit::{fit_conic, fit_ellipse, rms_sampson_distance, MIN_CONIC_POINTS};
pub(crate) use types::wrap_half_turn;
pub use types::{ConicCoeffs, EllipseParams};

/// Gates applied when fitting a target outline extracted from a frame.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EllipseConfig {
    /// Minimum number of boundary points required to attempt a fit.
    pub min_points: usize,
    /// Maximum accepted RMS Sampson residual (pixels).
    pub max_rms_residual: f64,
}

impl Default for EllipseConfig {
    fn default() -> Self {
        Self {
            min_points: 20,
            max_rms_residual: 2.0,
        }
    }
}

/// Fit an outline, enforcing the point-count and residual gates.
pub fn fit_target_ellipse(points: &[[f64; 2]], config: &EllipseConfig) -> Option<EllipseParams> {
    if points.len() < config.min_points.max(MIN_CONIC_POINTS) {
        tracing::trace!(n = points.len(), "too few outline points for ellipse fit");
        return None;
    }
    let ellipse = fit_ellipse(points)?;
    let rms = rms_sampson_distance(&ellipse, points);
    if !(rms <= config.max_rms_residual) {
        tracing::debug!(rms, "ellipse fit rejected by residual gate");
        return None;
    }
    Some(ellipse)
}
