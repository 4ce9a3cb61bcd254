//! Raw samples and kinematic fits over a tracked trajectory.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationState;
use crate::kalman::FilteredSample;
use crate::pca::{principal_axis, PrincipalAxis};
use crate::regression::{fit_linear, fit_quadratic, LinearFit, QuadraticFit};

/// Why a derived quantity could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unavailable {
    /// Fewer samples than the estimator needs.
    InsufficientData {
        /// Minimum sample count.
        needed: usize,
        /// Samples available.
        got: usize,
    },
    /// The inputs admit no well-defined answer.
    Degenerate,
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData { needed, got } => {
                write!(f, "insufficient data: need {} samples, have {}", needed, got)
            }
            Self::Degenerate => write!(f, "degenerate input"),
        }
    }
}

impl std::error::Error for Unavailable {}

fn require(needed: usize, got: usize) -> Result<(), Unavailable> {
    if got < needed {
        Err(Unavailable::InsufficientData { needed, got })
    } else {
        Ok(())
    }
}

/// One per-frame measurement before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub t: f64,
    pub x_px: f64,
    pub y_px: f64,
    /// Present once the session is calibrated.
    pub x_m: Option<f64>,
    pub y_m: Option<f64>,
}

impl RawSample {
    pub fn new(t: f64, position_px: [f64; 2], calibration: Option<&CalibrationState>) -> Self {
        let [x_px, y_px] = position_px;
        Self {
            t,
            x_px,
            y_px,
            x_m: calibration.map(|c| c.to_meters(x_px)),
            y_m: calibration.map(|c| c.to_meters(y_px)),
        }
    }

    /// Metric position, when calibrated.
    pub fn metric(&self) -> Option<[f64; 2]> {
        Some([self.x_m?, self.y_m?])
    }
}

/// Incline angle (degrees) of a plane along which a body accelerates at
/// `acceleration` under gravity `g`: `asin(a / g)`.
pub fn plane_inclination_from_acceleration(acceleration: f64, g: f64) -> Result<f64, Unavailable> {
    if !acceleration.is_finite() || !(g > 0.0) || acceleration.abs() > g {
        return Err(Unavailable::Degenerate);
    }
    Ok((acceleration / g).asin().to_degrees())
}

/// Motion along the principal axis of the filtered trajectory.
///
/// Along-axis quantities are signed in the direction of travel (first to last
/// sample).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicReport {
    /// Filtered samples used.
    pub samples: usize,
    pub axis: Result<PrincipalAxis, Unavailable>,
    /// Axis angle from +x in degrees, (−180, 180].
    pub axis_angle_deg: Result<f64, Unavailable>,
    /// Mean filtered speed.
    pub mean_speed: Result<f64, Unavailable>,
    /// Along-axis velocity against time.
    pub velocity_fit: Result<LinearFit, Unavailable>,
    /// Along-axis position against time.
    pub position_fit: Result<QuadraticFit, Unavailable>,
    /// Slope of `velocity_fit`.
    pub acceleration_from_velocity: Result<f64, Unavailable>,
    /// `2a` of `position_fit`.
    pub acceleration_from_position: Result<f64, Unavailable>,
    /// Incline implied by the acceleration (position fit preferred).
    pub inclination_deg: Result<f64, Unavailable>,
}

impl KinematicReport {
    pub fn from_samples(samples: &[FilteredSample], gravity: f64) -> Self {
        let n = samples.len();
        let points: Vec<[f64; 2]> = samples.iter().map(|s| [s.x, s.y]).collect();
        let t: Vec<f64> = samples.iter().map(|s| s.t).collect();

        let axis = require(2, n).and_then(|()| {
            let axis = principal_axis(&points).ok_or(Unavailable::Degenerate)?;
            Ok(axis.oriented(points[0], points[n - 1]))
        });

        let mean_speed =
            require(1, n).map(|()| samples.iter().map(|s| s.speed()).sum::<f64>() / n as f64);

        let velocity_fit = axis.map(|ax| {
            let [dx, dy] = ax.direction();
            let v: Vec<f64> = samples.iter().map(|s| s.vx * dx + s.vy * dy).collect();
            fit_linear(&t, &v)
        });

        let position_fit = require(3, n).and(axis).and_then(|ax| {
            let along: Vec<f64> = points.iter().map(|&p| ax.project(p)).collect();
            fit_quadratic(&t, &along).ok_or(Unavailable::Degenerate)
        });

        let acceleration_from_velocity = velocity_fit.map(|f| f.a);
        let acceleration_from_position = position_fit.map(|f| f.acceleration());
        let inclination_deg = acceleration_from_position
            .or(acceleration_from_velocity)
            .and_then(|a| plane_inclination_from_acceleration(a, gravity));

        Self {
            samples: n,
            axis,
            axis_angle_deg: axis.map(|a| a.angle_deg()),
            mean_speed,
            velocity_fit,
            position_fit,
            acceleration_from_velocity,
            acceleration_from_position,
            inclination_deg,
        }
    }
}

/// Everything a session has accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationState>,
    pub raw_samples: Vec<RawSample>,
    pub filtered_samples: Vec<FilteredSample>,
    pub kinematics: KinematicReport,
}
