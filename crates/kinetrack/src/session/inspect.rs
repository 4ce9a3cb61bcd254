//! Single-frame target inspection and multi-frame auto-calibration.

use serde::{Deserialize, Serialize};

use crate::blob::{detect_color, CandidateKind};
use crate::calibration::{CalibrationState, Calibrator};
use crate::conic::{fit_target_ellipse, EllipseParams};
use crate::frame::Frame;
use crate::pca::{median_angle, principal_axis};

use super::config::TrackingConfig;
use super::source::FrameSource;

/// Pixels needed before the blob orientation is trusted.
const MIN_ORIENTATION_PIXELS: usize = 10;

/// Geometry of the printed target seen in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPose {
    pub centroid: [f64; 2],
    pub pixel_count: usize,
    /// Bounding-box extent of the target pixels.
    pub extent_px: f64,
    /// Scale implied by this frame alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationState>,
    /// Blob major-axis angle in degrees, (−90, 90].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis_angle_deg: Option<f64>,
    /// Outline ellipse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ellipse: Option<EllipseParams>,
    /// Target-plane tilt from the outline axis ratio, degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclination_deg: Option<f64>,
}

/// Detect the target band in `frame` and measure scale, orientation and
/// plane inclination. `None` when the band has too few pixels.
pub fn inspect_target(frame: &Frame, config: &TrackingConfig) -> Option<TargetPose> {
    let blob = detect_color(
        frame,
        &config.blob.target,
        config.blob.stride,
        config.blob.min_target_pixels,
        CandidateKind::Target,
    )?;

    let calibration =
        Calibrator::new(config.calibration.clone()).estimate(blob.extent(), blob.count());

    let axis_angle_deg = (blob.count() >= MIN_ORIENTATION_PIXELS)
        .then(|| {
            let pts: Vec<[f64; 2]> = blob
                .pixels
                .iter()
                .map(|&[x, y]| [x as f64, y as f64])
                .collect();
            principal_axis(&pts)
        })
        .flatten()
        .map(|a| a.angle_deg());

    let ellipse = fit_target_ellipse(&blob.boundary_points(), &config.ellipse);
    let pose = TargetPose {
        centroid: blob.centroid,
        pixel_count: blob.count(),
        extent_px: blob.extent(),
        calibration,
        axis_angle_deg,
        inclination_deg: ellipse.map(|e| e.inclination_deg()),
        ellipse,
    };
    tracing::debug!(
        pixels = pose.pixel_count,
        extent = pose.extent_px,
        angle = ?pose.axis_angle_deg,
        inclination = ?pose.inclination_deg,
        "target inspected"
    );
    Some(pose)
}

/// Result of sampling several frames of a static target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCalibration {
    /// Scale from the detection with the most pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationState>,
    /// Median blob orientation over all detections, degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<f64>,
    /// Frames pulled from the source.
    pub frames: usize,
    /// Frames in which the target was found.
    pub detections: usize,
}

/// Pull up to `config.auto_calibration.samples` frames, pausing
/// `pace_ms` between pulls, and aggregate the target inspections.
///
/// `None` when no frame contained the target.
pub fn auto_calibrate<S: FrameSource + ?Sized>(
    source: &mut S,
    config: &TrackingConfig,
) -> Option<AutoCalibration> {
    let cfg = &config.auto_calibration;
    let mut poses: Vec<TargetPose> = Vec::new();
    let mut frames = 0usize;
    for i in 0..cfg.samples {
        let Some(input) = source.next_frame() else {
            break;
        };
        frames += 1;
        if let Some(pose) = inspect_target(&input.frame, config) {
            poses.push(pose);
        }
        if i + 1 < cfg.samples && cfg.pace_ms > 0 {
            std::thread::sleep(cfg.pace());
        }
    }
    if poses.is_empty() {
        tracing::warn!(frames, "auto-calibration found no target");
        return None;
    }

    let best = poses.iter().max_by_key(|p| p.pixel_count)?;
    let angles: Vec<f64> = poses
        .iter()
        .filter_map(|p| p.axis_angle_deg.map(f64::to_radians))
        .collect();
    let result = AutoCalibration {
        calibration: best.calibration,
        angle_deg: median_angle(&angles).map(f64::to_degrees),
        frames,
        detections: poses.len(),
    };
    tracing::info!(
        frames,
        detections = result.detections,
        meters_per_pixel = ?result.calibration.map(|c| c.meters_per_pixel),
        angle_deg = ?result.angle_deg,
        "auto-calibration finished"
    );
    Some(result)
}
