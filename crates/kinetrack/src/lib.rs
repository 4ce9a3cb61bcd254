//! kinetrack: 2-D motion tracking of a ball or circular target from video
//! frames.
//!
//! The pipeline stages are:
//!
//! 1. **Preprocess** – grayscale, box blur, Sobel magnitude, adaptive
//!    binarization.
//! 2. **Detect** – HSV/luminance blobs, background-subtraction motion, and
//!    per-radius Hough circle voting.
//! 3. **Calibrate** – pixel-to-meter scale frozen from the first target of
//!    known diameter.
//! 4. **Filter** – constant-velocity Kalman smoothing of metric positions.
//! 5. **Fit** – principal axis of the trajectory, linear/quadratic
//!    regression, and the derived acceleration and incline angle.
//!
//! Tilted circular targets are measured separately by fitting an ellipse to
//! their outline ([`inspect_target`]).
//!
//! # Public API
//! - [`TrackingSession`] with [`TrackingConfig`] as the primary entry point
//! - [`FrameSource`] for feeding frames
//! - detector, fitter and filter building blocks for direct use

mod blob;
mod calibration;
mod conic;
mod frame;
mod hough;
mod kalman;
mod pca;
mod preprocess;
mod regression;
mod session;

#[cfg(test)]
pub(crate) mod test_utils;

pub use blob::{
    detect_color, detect_luminance, rgb_to_hsv, select_best, BackgroundModel, Blob, BlobConfig,
    CandidateKind, DetectionCandidate, Hsv, HsvBand, MotionConfig,
};
pub use calibration::{meters_per_pixel, CalibrationConfig, CalibrationState, Calibrator};
pub use conic::{
    fit_conic, fit_ellipse, fit_target_ellipse, rms_sampson_distance, ConicCoeffs, EllipseConfig,
    EllipseParams, MIN_CONIC_POINTS,
};
pub use frame::{frame_from_rgba, Frame, FrameError, TimedFrame};
pub use hough::{detect_circle, hough_circle, CircleCandidate, HoughConfig};
pub use kalman::{FilteredSample, KalmanConfig, KalmanTracker2D};
pub use pca::{median_angle, principal_axis, PrincipalAxis};
pub use preprocess::{
    adaptive_edge_map, binarize, box_blur, downscale_to_width, luminance, max_value,
    sobel_magnitude, to_grayscale, BitMap, FloatMap, PreprocessConfig,
};
pub use regression::{
    fit_linear, fit_quadratic, solve_linear_system, LinearFit, QuadraticFit,
};
pub use session::{
    auto_calibrate, inspect_target, plane_inclination_from_acceleration, AutoCalibration,
    AutoCalibrationConfig, DetectorSet, FrameOutcome, FrameSource, KinematicReport, RawSample,
    SessionReport, Strategy, TargetPose, TrackingConfig, TrackingSession, Unavailable, VecSource,
    STANDARD_GRAVITY,
};
