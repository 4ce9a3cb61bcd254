//! Frame-sequential tracking session.
//!
//! Per frame: run the enabled detectors, keep the strongest candidate,
//! freeze calibration on the first usable one, record the raw sample and,
//! once calibrated, feed the metric position to the Kalman tracker.
//! The post-pass ([`TrackingSession::kinematics`]) fits the filtered
//! trajectory.
//!
//! A session owns all of its state; independent sessions share nothing.

mod config;
mod inspect;
mod report;
mod source;

pub use config::{
    AutoCalibrationConfig, DetectorSet, Strategy, TrackingConfig, STANDARD_GRAVITY,
};
pub use inspect::{auto_calibrate, inspect_target, AutoCalibration, TargetPose};
pub use report::{
    plane_inclination_from_acceleration, KinematicReport, RawSample, SessionReport, Unavailable,
};
pub use source::{FrameSource, VecSource};

use crate::blob::{
    detect_color, detect_luminance, select_best, BackgroundModel, CandidateKind,
    DetectionCandidate,
};
use crate::calibration::{CalibrationState, Calibrator};
use crate::frame::{Frame, TimedFrame};
use crate::hough::detect_circle;
use crate::kalman::{FilteredSample, KalmanTracker2D};
use crate::preprocess::to_grayscale;

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No strategy found the object.
    Skipped,
    Tracked {
        /// Winning detection.
        candidate: DetectionCandidate,
        raw: RawSample,
        /// Present once calibrated.
        filtered: Option<FilteredSample>,
    },
}

impl FrameOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Tracking state for one video.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    config: TrackingConfig,
    calibrator: Calibrator,
    tracker: KalmanTracker2D,
    background: BackgroundModel,
    raw: Vec<RawSample>,
    filtered: Vec<FilteredSample>,
    frames_processed: usize,
    frames_skipped: usize,
}

impl TrackingSession {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            calibrator: Calibrator::new(config.calibration.clone()),
            tracker: KalmanTracker2D::new(config.kalman.clone()),
            background: BackgroundModel::new(config.motion.background_frames),
            raw: Vec::new(),
            filtered: Vec::new(),
            frames_processed: 0,
            frames_skipped: 0,
            config,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn calibration(&self) -> Option<CalibrationState> {
        self.calibrator.state()
    }

    /// Adopt a scale obtained elsewhere; ignored once calibrated.
    pub fn seed_calibration(&mut self, state: CalibrationState) -> bool {
        let applied = self.calibrator.seed(state);
        if applied {
            tracing::debug!(
                meters_per_pixel = state.meters_per_pixel,
                "calibration seeded"
            );
        }
        applied
    }

    pub fn raw_samples(&self) -> &[RawSample] {
        &self.raw
    }

    pub fn filtered_samples(&self) -> &[FilteredSample] {
        &self.filtered
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Clear calibration, tracker, background model and samples.
    pub fn reset(&mut self) {
        self.calibrator.reset();
        self.tracker.reset();
        self.background.reset();
        self.raw.clear();
        self.filtered.clear();
        self.frames_processed = 0;
        self.frames_skipped = 0;
        tracing::debug!("tracking session reset");
    }

    /// All candidates found in `frame` by the enabled strategies.
    ///
    /// Motion runs only when nothing else fired; the background model
    /// observes every frame while motion is enabled.
    pub fn detect(&mut self, frame: &Frame) -> Vec<DetectionCandidate> {
        let cfg = &self.config;
        let blob = &cfg.blob;
        let mut out = Vec::new();

        if cfg.detectors.ball {
            out.extend(
                detect_color(frame, &blob.ball, blob.stride, blob.min_ball_pixels, CandidateKind::Ball)
                    .map(|b| b.to_candidate()),
            );
        }
        if cfg.detectors.target {
            out.extend(
                detect_color(
                    frame,
                    &blob.target,
                    blob.stride,
                    blob.min_target_pixels,
                    CandidateKind::Target,
                )
                .map(|b| b.to_candidate()),
            );
        }
        if cfg.detectors.luminance {
            out.extend(
                detect_luminance(
                    frame,
                    blob.dark_max,
                    blob.bright_min,
                    blob.stride,
                    blob.min_luminance_pixels,
                )
                .map(|b| b.to_candidate()),
            );
        }
        if cfg.detectors.hough {
            let gray = to_grayscale(frame);
            out.extend(
                detect_circle(&gray, &cfg.preprocess, &cfg.hough)
                    .map(|c| DetectionCandidate::from_circle(&c, cfg.hough.min_votes())),
            );
        }
        if cfg.detectors.motion {
            if out.is_empty() {
                out.extend(
                    self.background
                        .detect_motion(
                            frame,
                            cfg.motion.diff_threshold,
                            blob.stride,
                            cfg.motion.min_pixels,
                        )
                        .map(|b| b.to_candidate()),
                );
            }
            self.background.observe(frame);
        }
        out
    }

    /// Run one frame through detection, calibration and filtering.
    pub fn process_frame(&mut self, input: &TimedFrame) -> FrameOutcome {
        self.frames_processed += 1;
        let candidates = self.detect(&input.frame);
        let Some(candidate) = select_best(&candidates) else {
            self.frames_skipped += 1;
            tracing::debug!(t = input.t, "no detection; frame skipped");
            return FrameOutcome::Skipped;
        };

        let calibration = self.calibrator.offer(&candidate);
        let raw = RawSample::new(input.t, [candidate.x, candidate.y], calibration.as_ref());
        self.raw.push(raw);

        let filtered = raw.metric().map(|z| {
            let sample = self.tracker.step(input.t, z);
            self.filtered.push(sample);
            sample
        });
        tracing::debug!(
            t = input.t,
            kind = ?candidate.kind,
            x = candidate.x,
            y = candidate.y,
            strength = candidate.strength(),
            calibrated = calibration.is_some(),
            "frame tracked"
        );
        FrameOutcome::Tracked {
            candidate,
            raw,
            filtered,
        }
    }

    /// Drain `source`, returning the number of frames processed.
    ///
    /// Stopping early (dropping the source) leaves the accumulated samples
    /// valid.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> usize {
        let mut n = 0usize;
        while let Some(frame) = source.next_frame() {
            self.process_frame(&frame);
            n += 1;
        }
        tracing::info!(
            frames = n,
            skipped = self.frames_skipped,
            tracked = self.filtered.len(),
            calibrated = self.calibrator.is_calibrated(),
            "frame source drained"
        );
        n
    }

    /// Fit the filtered trajectory.
    pub fn kinematics(&self) -> KinematicReport {
        let report = KinematicReport::from_samples(&self.filtered, self.config.gravity_m_s2);
        if self.filtered.len() >= 3 && report.position_fit.is_err() {
            tracing::warn!(samples = self.filtered.len(), "position fit failed");
        }
        report
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            calibration: self.calibration(),
            raw_samples: self.raw.clone(),
            filtered_samples: self.filtered.clone(),
            kinematics: self.kinematics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_disk_frame, paint_disk};
    use approx::assert_relative_eq;

    const ORANGE: [u8; 3] = [255, 140, 0];
    const BACKDROP: [u8; 3] = [20, 20, 20];

    /// 50 frames at 50 fps of a 40 px disk moving from (100, 100) to
    /// (100, 600).
    fn falling_disk() -> VecSource {
        (0..50)
            .map(|i| {
                let y = 100.0 + 500.0 * i as f32 / 49.0;
                let frame = draw_disk_frame(200, 700, [100.0, y], 20.0, ORANGE, BACKDROP);
                TimedFrame::new(i as f64 / 50.0, frame)
            })
            .collect()
    }

    #[test]
    fn end_to_end_vertical_motion() {
        let mut session = TrackingSession::new(TrackingConfig::default());
        let processed = session.run(&mut falling_disk());
        assert_eq!(processed, 50);

        let cal = session.calibration().expect("calibrated");
        assert_relative_eq!(cal.meters_per_pixel, 0.00375, epsilon = 1e-9);
        assert_eq!(session.raw_samples().len(), 50);
        assert_eq!(session.filtered_samples().len(), 50);

        let expected = 500.0 * 50.0 / 49.0 * 0.00375;
        let filtered = session.filtered_samples();
        let last = filtered[filtered.len() - 1];
        assert!((last.speed() - expected).abs() / expected < 0.03, "speed {}", last.speed());
        let tail = &filtered[30..];
        let mean = tail.iter().map(|s| s.speed()).sum::<f64>() / tail.len() as f64;
        assert!((mean - expected).abs() / expected < 0.02, "mean speed {}", mean);

        let kin = session.kinematics();
        assert_relative_eq!(kin.axis_angle_deg.unwrap(), 90.0, epsilon = 2.0);
        assert!(kin.position_fit.is_ok());
        assert!(kin.acceleration_from_position.unwrap().abs() < 0.5);
    }

    #[test]
    fn frames_without_object_are_skipped() {
        let mut session = TrackingSession::new(TrackingConfig::default());
        let empty = TimedFrame::new(0.0, Frame::from_pixel(64, 64, image::Rgba([20, 20, 20, 255])));
        assert!(session.process_frame(&empty).is_skipped());
        assert!(session.raw_samples().is_empty());
        assert_eq!(session.report().frames_skipped, 1);
    }

    #[test]
    fn uncalibrated_samples_stay_in_pixels() {
        let mut cfg = TrackingConfig::default();
        cfg.calibration.min_pixels = 10_000;
        let mut session = TrackingSession::new(cfg);
        let frame = draw_disk_frame(100, 100, [50.0, 50.0], 10.0, ORANGE, BACKDROP);
        match session.process_frame(&TimedFrame::new(0.0, frame)) {
            FrameOutcome::Tracked { raw, filtered, .. } => {
                assert!(raw.x_m.is_none());
                assert!(filtered.is_none());
                assert_relative_eq!(raw.x_px, 50.0, epsilon = 0.5);
            }
            FrameOutcome::Skipped => panic!("disk should be detected"),
        }
        assert!(session.filtered_samples().is_empty());
        assert_eq!(
            session.kinematics().axis,
            Err(Unavailable::InsufficientData { needed: 2, got: 0 })
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = TrackingSession::new(TrackingConfig::default());
        session.run(&mut falling_disk());
        session.reset();
        assert!(session.calibration().is_none());
        assert!(session.raw_samples().is_empty());
        assert!(session.filtered_samples().is_empty());
        assert_eq!(session.frames_processed(), 0);
    }

    #[test]
    fn motion_fallback_after_background_converges() {
        let mut cfg = TrackingConfig::default();
        cfg.detectors = DetectorSet::only(Strategy::Motion);
        cfg.motion.background_frames = 3;
        cfg.calibration.min_pixels = 50;
        let mut session = TrackingSession::new(cfg);

        let bg = Frame::from_pixel(120, 120, image::Rgba([40, 40, 40, 255]));
        for i in 0..3 {
            let out = session.process_frame(&TimedFrame::new(i as f64 * 0.1, bg.clone()));
            assert!(out.is_skipped());
        }
        let mut moving = bg.clone();
        paint_disk(&mut moving, [60.0, 40.0], 12.0, [220, 220, 220]);
        match session.process_frame(&TimedFrame::new(0.3, moving)) {
            FrameOutcome::Tracked { candidate, .. } => {
                assert_eq!(candidate.kind, CandidateKind::Motion);
                assert_relative_eq!(candidate.x, 60.0, epsilon = 0.5);
                assert_relative_eq!(candidate.y, 40.0, epsilon = 0.5);
            }
            FrameOutcome::Skipped => panic!("motion should be detected"),
        }
    }

    #[test]
    fn hough_strategy_tracks_gray_disk() {
        let mut cfg = TrackingConfig::default();
        cfg.detectors = DetectorSet::only(Strategy::Hough);
        let mut session = TrackingSession::new(cfg);
        let frame = draw_disk_frame(200, 160, [90.0, 80.0], 24.0, [230, 230, 230], [20, 20, 20]);
        match session.process_frame(&TimedFrame::new(0.0, frame)) {
            FrameOutcome::Tracked { candidate, .. } => {
                assert_eq!(candidate.kind, CandidateKind::Circle);
                assert!((candidate.x - 90.0).abs() <= 2.0);
                assert!((candidate.y - 80.0).abs() <= 2.0);
            }
            FrameOutcome::Skipped => panic!("circle should be detected"),
        }
        assert!(session.calibration().is_some());
    }

    #[test]
    fn hough_only_session_calibrates_with_defaults() {
        let mut cfg = TrackingConfig::default();
        cfg.detectors = DetectorSet::only(Strategy::Hough);
        let mut session = TrackingSession::new(cfg);
        let mut source: VecSource = (0..10)
            .map(|i| {
                let frame =
                    draw_disk_frame(200, 160, [90.0, 80.0], 24.0, [230, 230, 230], [20, 20, 20]);
                TimedFrame::new(i as f64 / 30.0, frame)
            })
            .collect();
        assert_eq!(session.run(&mut source), 10);

        let cal = session.calibration().expect("scale from circle radius");
        assert!((cal.reference_diameter_px - 48.0).abs() <= 4.0);
        assert_relative_eq!(
            cal.meters_per_pixel,
            0.15 / cal.reference_diameter_px,
            epsilon = 1e-12
        );
        assert_eq!(session.filtered_samples().len(), 10);
    }

    #[test]
    fn seeded_calibration_is_kept() {
        let mut session = TrackingSession::new(TrackingConfig::default());
        let seed = CalibrationState {
            meters_per_pixel: 0.002,
            reference_diameter_px: 75.0,
        };
        assert!(session.seed_calibration(seed));
        session.run(&mut falling_disk());
        assert_eq!(session.calibration(), Some(seed));
        assert!(!session.seed_calibration(seed));
    }
}
