//! Pixel-to-meter scale from a target of known physical diameter.

use serde::{Deserialize, Serialize};

use crate::blob::{CandidateKind, DetectionCandidate};

/// `real_diameter_m / pixel_diameter`, or `None` for non-positive or
/// non-finite inputs.
pub fn meters_per_pixel(real_diameter_m: f64, pixel_diameter: f64) -> Option<f64> {
    if !(real_diameter_m > 0.0) || !(pixel_diameter > 0.0) {
        return None;
    }
    let k = real_diameter_m / pixel_diameter;
    k.is_finite().then_some(k)
}

/// Frozen session scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Scale factor, always `> 0`.
    pub meters_per_pixel: f64,
    /// Apparent target diameter the scale was derived from.
    pub reference_diameter_px: f64,
}

impl CalibrationState {
    pub fn to_meters(&self, px: f64) -> f64 {
        px * self.meters_per_pixel
    }

    pub fn to_pixels(&self, meters: f64) -> f64 {
        meters / self.meters_per_pixel
    }
}

/// Calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Physical diameter of the reference object (meters).
    pub real_diameter_m: f64,
    /// Apparent diameters at or below this are rejected (pixels).
    pub min_diameter_px: f64,
    /// Minimum accepted blob pixels behind the diameter. Circle candidates
    /// are gated by their own vote minimum instead.
    pub min_pixels: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            real_diameter_m: 0.15,
            min_diameter_px: 3.0,
            min_pixels: 200,
        }
    }
}

/// Freezes the first acceptable scale estimate of a session.
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationConfig,
    state: Option<CalibrationState>,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn state(&self) -> Option<CalibrationState> {
        self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.is_some()
    }

    /// Estimate a scale from a blob `(diameter_px, pixel count)` without
    /// freezing it.
    pub fn estimate(&self, diameter_px: f64, support: usize) -> Option<CalibrationState> {
        self.estimate_with(diameter_px, support, self.config.min_pixels)
    }

    fn estimate_with(
        &self,
        diameter_px: f64,
        support: usize,
        min_support: usize,
    ) -> Option<CalibrationState> {
        if !(diameter_px > self.config.min_diameter_px) || support < min_support {
            return None;
        }
        let k = meters_per_pixel(self.config.real_diameter_m, diameter_px)?;
        Some(CalibrationState {
            meters_per_pixel: k,
            reference_diameter_px: diameter_px,
        })
    }

    /// Offer a detection. The first acceptable one freezes the scale; once
    /// frozen, offers are ignored. Returns the current state.
    pub fn offer(&mut self, candidate: &DetectionCandidate) -> Option<CalibrationState> {
        if self.state.is_some() {
            return self.state;
        }
        let diameter = candidate.diameter_px()?;
        // Hough votes are bounded by the angle sampling, not by the disk area.
        let min_support = match candidate.kind {
            CandidateKind::Circle => candidate.min_required,
            _ => self.config.min_pixels,
        };
        let Some(state) = self.estimate_with(diameter, candidate.pixel_count, min_support) else {
            tracing::trace!(
                diameter,
                support = candidate.pixel_count,
                "calibration estimate rejected"
            );
            return None;
        };
        tracing::debug!(
            meters_per_pixel = state.meters_per_pixel,
            diameter_px = diameter,
            kind = ?candidate.kind,
            "calibration frozen"
        );
        self.state = Some(state);
        self.state
    }

    /// Freeze an externally obtained scale (e.g. from auto-calibration).
    /// Ignored when already calibrated; returns whether it was applied.
    pub fn seed(&mut self, state: CalibrationState) -> bool {
        if self.state.is_some() || !(state.meters_per_pixel > 0.0) {
            return false;
        }
        self.state = Some(state);
        true
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(extent: f64, count: usize) -> DetectionCandidate {
        DetectionCandidate {
            x: 10.0,
            y: 10.0,
            radius: None,
            extent_px: Some(extent),
            score: 1.0,
            pixel_count: count,
            min_required: 40,
            kind: CandidateKind::Target,
        }
    }

    #[test]
    fn round_trip_reproduces_real_diameter() {
        let (real, d) = (0.15, 40.0);
        let k = meters_per_pixel(real, d).unwrap();
        assert_eq!(k, real / d);
        let state = CalibrationState {
            meters_per_pixel: k,
            reference_diameter_px: d,
        };
        assert!((state.to_meters(d) - real).abs() < 1e-15);
        assert!((state.to_pixels(real) - d).abs() < 1e-12);
    }

    #[test]
    fn invalid_inputs_have_no_scale() {
        assert!(meters_per_pixel(0.15, 0.0).is_none());
        assert!(meters_per_pixel(0.0, 10.0).is_none());
        assert!(meters_per_pixel(f64::NAN, 10.0).is_none());
    }

    #[test]
    fn first_valid_offer_is_frozen() {
        let mut cal = Calibrator::new(CalibrationConfig::default());
        assert!(cal.offer(&candidate(40.0, 50)).is_none(), "too little support");
        assert!(cal.offer(&candidate(2.0, 500)).is_none(), "too small");

        let first = cal.offer(&candidate(40.0, 300)).expect("calibrated");
        assert_eq!(first.meters_per_pixel, 0.15 / 40.0);

        let later = cal.offer(&candidate(80.0, 900)).unwrap();
        assert_eq!(later, first);

        cal.reset();
        assert!(!cal.is_calibrated());
        let again = cal.offer(&candidate(80.0, 900)).unwrap();
        assert_eq!(again.reference_diameter_px, 80.0);
    }

    #[test]
    fn circle_candidates_use_twice_the_radius() {
        let mut cal = Calibrator::new(CalibrationConfig::default());
        let c = DetectionCandidate {
            radius: Some(25.0),
            extent_px: None,
            pixel_count: 40,
            kind: CandidateKind::Circle,
            ..candidate(0.0, 0)
        };
        let state = cal.offer(&c).unwrap();
        assert_eq!(state.reference_diameter_px, 50.0);
    }

    #[test]
    fn circle_support_is_measured_in_votes() {
        let mut cal = Calibrator::new(CalibrationConfig::default());
        let weak = DetectionCandidate {
            radius: Some(24.0),
            extent_px: None,
            pixel_count: 20,
            min_required: 27,
            kind: CandidateKind::Circle,
            ..candidate(0.0, 0)
        };
        assert!(cal.offer(&weak).is_none());

        let strong = DetectionCandidate {
            pixel_count: 60,
            ..weak
        };
        let state = cal.offer(&strong).expect("votes above the circle minimum");
        assert_eq!(state.reference_diameter_px, 48.0);
        assert_eq!(state.meters_per_pixel, 0.15 / 48.0);
    }
}
