//! Threshold-based blob detection: HSV color bands, luminance cutoffs and a
//! background-subtraction motion fallback.
//!
//! Every strategy scans the frame at a fixed stride, accumulates the
//! centroid of accepted pixels and reports a [`Blob`]. Strategies are
//! compared through [`DetectionCandidate::strength`], which normalises the
//! accepted count by the strategy's own minimum.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::hough::CircleCandidate;
use crate::preprocess::{luminance, BitMap};

/// Color in HSV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`.
    pub h: f32,
    /// Saturation, `[0, 1]`.
    pub s: f32,
    /// Value, `[0, 1]`.
    pub v: f32,
}

/// Convert an 8-bit RGB triple to HSV.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let rf = r as f32 / 255.0;
    let gf = g as f32 / 255.0;
    let bf = b as f32 / 255.0;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let d = max - min;
    let s = if max == 0.0 { 0.0 } else { d / max };
    let mut h = 0.0;
    if d > 0.0 {
        h = if max == rf {
            (gf - bf) / d + if gf < bf { 6.0 } else { 0.0 }
        } else if max == gf {
            (bf - rf) / d + 2.0
        } else {
            (rf - gf) / d + 4.0
        };
        h *= 60.0;
        if h >= 360.0 {
            h -= 360.0;
        }
    }
    Hsv { h, s, v: max }
}

/// Acceptance band in HSV space.
///
/// `hue_min > hue_max` describes a band wrapping through 0° (reds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsvBand {
    /// Lower hue bound (degrees, inclusive).
    pub hue_min: f32,
    /// Upper hue bound (degrees, inclusive).
    pub hue_max: f32,
    /// Minimum saturation.
    pub sat_min: f32,
    /// Minimum value.
    pub val_min: f32,
    /// Minimum `r + g + b`; rejects dark pixels whose hue is noise.
    pub min_rgb_sum: u32,
}

impl Default for HsvBand {
    fn default() -> Self {
        Self::target()
    }
}

impl HsvBand {
    /// Saturated orange/yellow ball.
    pub fn ball() -> Self {
        Self {
            hue_min: 5.0,
            hue_max: 35.0,
            sat_min: 0.5,
            val_min: 0.4,
            min_rgb_sum: 0,
        }
    }

    /// Light ochre printed target; deliberately wide.
    pub fn target() -> Self {
        Self {
            hue_min: 18.0,
            hue_max: 60.0,
            sat_min: 0.12,
            val_min: 0.35,
            min_rgb_sum: 120,
        }
    }

    /// Hue test in degrees; `hue_min > hue_max` wraps through 0°.
    pub fn contains_hue(&self, h: f32) -> bool {
        if self.hue_min <= self.hue_max {
            h >= self.hue_min && h <= self.hue_max
        } else {
            h >= self.hue_min || h <= self.hue_max
        }
    }

    /// Whether an RGB pixel falls inside the band.
    pub fn accepts(&self, r: u8, g: u8, b: u8) -> bool {
        if (r as u32 + g as u32 + b as u32) < self.min_rgb_sum {
            return false;
        }
        let hsv = rgb_to_hsv(r, g, b);
        self.contains_hue(hsv.h) && hsv.s >= self.sat_min && hsv.v >= self.val_min
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Ball,
    Target,
    Motion,
    Circle,
}

/// One detection from one strategy in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    /// Center x (source pixels).
    pub x: f64,
    /// Center y (source pixels).
    pub y: f64,
    /// Circle radius, when the strategy measures one.
    pub radius: Option<f64>,
    /// Bounding-box extent of accepted pixels, when the strategy has one.
    pub extent_px: Option<f64>,
    /// Strategy-specific quality in `[0, 1]`.
    pub score: f64,
    /// Supporting evidence: accepted pixels or Hough votes.
    pub pixel_count: usize,
    /// The strategy's own acceptance minimum for `pixel_count`.
    pub min_required: usize,
    pub kind: CandidateKind,
}

impl DetectionCandidate {
    /// Evidence relative to the strategy's minimum.
    pub fn strength(&self) -> f64 {
        self.pixel_count as f64 / self.min_required.max(1) as f64
    }

    /// Apparent diameter: the blob extent, or twice the circle radius.
    pub fn diameter_px(&self) -> Option<f64> {
        self.extent_px.or(self.radius.map(|r| 2.0 * r))
    }

    /// Wrap a Hough circle as a candidate.
    pub fn from_circle(circle: &CircleCandidate, min_votes: u32) -> Self {
        Self {
            x: circle.cx,
            y: circle.cy,
            radius: Some(circle.r),
            extent_px: None,
            score: circle.score,
            pixel_count: circle.votes as usize,
            min_required: min_votes as usize,
            kind: CandidateKind::Circle,
        }
    }
}

/// Pick the candidate with the highest [`strength`](DetectionCandidate::strength).
/// Ties keep the earliest.
pub fn select_best(candidates: &[DetectionCandidate]) -> Option<DetectionCandidate> {
    let mut best: Option<&DetectionCandidate> = None;
    for c in candidates {
        if best.map_or(true, |b| c.strength() > b.strength()) {
            best = Some(c);
        }
    }
    best.cloned()
}

/// Accepted pixels of one strategy.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Mean of accepted coordinates.
    pub centroid: [f64; 2],
    /// Bounding box min corner.
    pub bbox_min: [u32; 2],
    /// Bounding box max corner.
    pub bbox_max: [u32; 2],
    /// Accepted pixel coordinates, scan order.
    pub pixels: Vec<[u32; 2]>,
    /// Fraction of scanned samples accepted.
    pub fill: f64,
    /// Sampling stride used by the scan.
    pub stride: u32,
    pub kind: CandidateKind,
    pub min_required: usize,
}

impl Blob {
    /// Accepted samples.
    pub fn count(&self) -> usize {
        self.pixels.len()
    }

    /// `max(width, height)` of the bounding box.
    pub fn extent(&self) -> f64 {
        let dx = self.bbox_max[0] - self.bbox_min[0];
        let dy = self.bbox_max[1] - self.bbox_min[1];
        dx.max(dy) as f64
    }

    /// Accepted pixels with at least one 4-neighbour (at stride spacing) that
    /// was not accepted.
    pub fn boundary_points(&self) -> Vec<[f64; 2]> {
        let s = self.stride.max(1);
        let w = self.bbox_max[0] / s + 1;
        let h = self.bbox_max[1] / s + 1;
        let mut mask = BitMap::new(w, h);
        for &[x, y] in &self.pixels {
            mask.set(x / s, y / s, true);
        }
        let mut out = Vec::new();
        for &[x, y] in &self.pixels {
            let (gx, gy) = (x / s, y / s);
            let interior = gx > 0
                && gy > 0
                && mask.get(gx - 1, gy)
                && mask.get(gx + 1, gy)
                && mask.get(gx, gy - 1)
                && mask.get(gx, gy + 1);
            if !interior {
                out.push([x as f64, y as f64]);
            }
        }
        out
    }

    /// Candidate at the centroid, sized by the bounding-box extent.
    pub fn to_candidate(&self) -> DetectionCandidate {
        DetectionCandidate {
            x: self.centroid[0],
            y: self.centroid[1],
            radius: None,
            extent_px: Some(self.extent()),
            score: self.fill,
            pixel_count: self.count(),
            min_required: self.min_required,
            kind: self.kind,
        }
    }
}

/// Strided scan shared by every strategy.
fn scan<F>(
    frame: &Frame,
    stride: u32,
    min_pixels: usize,
    kind: CandidateKind,
    mut accept: F,
) -> Option<Blob>
where
    F: FnMut(u32, u32, [u8; 4]) -> bool,
{
    let stride = stride.max(1);
    let (w, h) = frame.dimensions();
    let mut pixels = Vec::new();
    let (mut sx, mut sy) = (0.0f64, 0.0f64);
    let mut bbox_min = [u32::MAX; 2];
    let mut bbox_max = [0u32; 2];
    let mut scanned = 0usize;
    for y in (0..h).step_by(stride as usize) {
        for x in (0..w).step_by(stride as usize) {
            scanned += 1;
            if !accept(x, y, frame.get_pixel(x, y).0) {
                continue;
            }
            sx += x as f64;
            sy += y as f64;
            bbox_min = [bbox_min[0].min(x), bbox_min[1].min(y)];
            bbox_max = [bbox_max[0].max(x), bbox_max[1].max(y)];
            pixels.push([x, y]);
        }
    }
    let count = pixels.len();
    if count == 0 || count < min_pixels {
        tracing::trace!(?kind, count, min_pixels, "blob below minimum");
        return None;
    }
    let n = count as f64;
    Some(Blob {
        centroid: [sx / n, sy / n],
        bbox_min,
        bbox_max,
        pixels,
        fill: n / scanned.max(1) as f64,
        stride,
        kind,
        min_required: min_pixels,
    })
}

/// Pixels inside an HSV band.
pub fn detect_color(
    frame: &Frame,
    band: &HsvBand,
    stride: u32,
    min_pixels: usize,
    kind: CandidateKind,
) -> Option<Blob> {
    scan(frame, stride, min_pixels, kind, |_, _, [r, g, b, _]| {
        band.accepts(r, g, b)
    })
}

/// Pixels darker than `dark_max` or brighter than `bright_min` (luminance,
/// 0..=255). Reported as [`CandidateKind::Target`].
pub fn detect_luminance(
    frame: &Frame,
    dark_max: f32,
    bright_min: f32,
    stride: u32,
    min_pixels: usize,
) -> Option<Blob> {
    scan(
        frame,
        stride,
        min_pixels,
        CandidateKind::Target,
        |_, _, [r, g, b, _]| {
            let l = luminance(r, g, b);
            l <= dark_max || l >= bright_min
        },
    )
}

/// Blob detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Sampling stride in pixels (both axes).
    pub stride: u32,
    /// Ball color band.
    pub ball: HsvBand,
    /// Target color band.
    pub target: HsvBand,
    pub min_ball_pixels: usize,
    pub min_target_pixels: usize,
    /// Luminance at or below which a pixel counts as dark.
    pub dark_max: f32,
    /// Luminance at or above which a pixel counts as bright.
    pub bright_min: f32,
    pub min_luminance_pixels: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            stride: 2,
            ball: HsvBand::ball(),
            target: HsvBand::target(),
            min_ball_pixels: 40,
            min_target_pixels: 40,
            dark_max: 40.0,
            bright_min: 225.0,
            min_luminance_pixels: 40,
        }
    }
}

/// Background-subtraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Frames averaged into the background before it freezes.
    pub background_frames: usize,
    /// Minimum summed |ΔR| + |ΔG| + |ΔB| for a pixel to count as moving.
    pub diff_threshold: f32,
    pub min_pixels: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            background_frames: 10,
            diff_threshold: 60.0,
            min_pixels: 40,
        }
    }
}

/// Running per-pixel RGB mean of the first `target_frames` frames.
///
/// Once converged the model is frozen. A frame of different dimensions
/// restarts accumulation.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    mean: Vec<f32>,
    frames: usize,
    target_frames: usize,
}

impl BackgroundModel {
    pub fn new(target_frames: usize) -> Self {
        Self {
            width: 0,
            height: 0,
            mean: Vec::new(),
            frames: 0,
            target_frames,
        }
    }

    /// Frames accumulated so far (saturates at the target).
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_converged(&self) -> bool {
        self.target_frames > 0 && self.frames >= self.target_frames
    }

    /// Drop all accumulated state.
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mean.clear();
        self.frames = 0;
    }

    /// Fold a frame into the running mean until converged.
    pub fn observe(&mut self, frame: &Frame) {
        let (w, h) = frame.dimensions();
        if (w, h) != (self.width, self.height) {
            if self.frames > 0 {
                tracing::debug!(w, h, "frame size changed; background model restarted");
            }
            self.width = w;
            self.height = h;
            self.mean = vec![0.0; w as usize * h as usize * 3];
            self.frames = 0;
        }
        if self.is_converged() || self.target_frames == 0 {
            return;
        }
        let k = 1.0 / (self.frames + 1) as f32;
        for (px, m) in frame.pixels().zip(self.mean.chunks_exact_mut(3)) {
            for c in 0..3 {
                m[c] += (px.0[c] as f32 - m[c]) * k;
            }
        }
        self.frames += 1;
        if self.is_converged() {
            tracing::debug!(frames = self.frames, "background model converged");
        }
    }

    /// Pixels differing from the background by more than `threshold`.
    ///
    /// `None` until the model has converged or when `frame` does not match
    /// the model size.
    pub fn detect_motion(
        &self,
        frame: &Frame,
        threshold: f32,
        stride: u32,
        min_pixels: usize,
    ) -> Option<Blob> {
        if !self.is_converged() || frame.dimensions() != (self.width, self.height) {
            return None;
        }
        let w = self.width as usize;
        scan(
            frame,
            stride,
            min_pixels,
            CandidateKind::Motion,
            |x, y, px| {
                let i = (y as usize * w + x as usize) * 3;
                let bg = &self.mean[i..i + 3];
                let diff: f32 = (0..3).map(|c| (px[c] as f32 - bg[c]).abs()).sum();
                diff > threshold
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_disk_frame, paint_disk};
    use approx::assert_relative_eq;

    const ORANGE: [u8; 3] = [255, 140, 0];
    const DARK: [u8; 3] = [20, 20, 20];

    #[test]
    fn hsv_of_primaries() {
        let red = rgb_to_hsv(255, 0, 0);
        assert_relative_eq!(red.h, 0.0);
        assert_relative_eq!(red.s, 1.0);
        assert_relative_eq!(red.v, 1.0);
        assert_relative_eq!(rgb_to_hsv(0, 255, 0).h, 120.0);
        assert_relative_eq!(rgb_to_hsv(0, 0, 255).h, 240.0);
        assert_relative_eq!(rgb_to_hsv(255, 0, 128).h, 360.0 - 128.0 / 255.0 * 60.0, epsilon = 1e-3);
        let gray = rgb_to_hsv(90, 90, 90);
        assert_eq!(gray.h, 0.0);
        assert_eq!(gray.s, 0.0);
    }

    #[test]
    fn wrapping_band_accepts_both_sides_of_zero() {
        let red = HsvBand {
            hue_min: 340.0,
            hue_max: 15.0,
            sat_min: 0.3,
            val_min: 0.3,
            min_rgb_sum: 0,
        };
        assert!(red.accepts(255, 0, 0));
        assert!(red.accepts(255, 0, 40));
        assert!(red.accepts(255, 40, 0));
        assert!(!red.accepts(0, 255, 0));
    }

    #[test]
    fn target_band_rejects_dark_pixels() {
        let band = HsvBand::target();
        assert!(band.accepts(220, 190, 120));
        assert!(!band.accepts(40, 30, 10));
    }

    #[test]
    fn color_blob_reports_centroid_and_extent() {
        let frame = draw_disk_frame(160, 120, [80.0, 60.0], 20.0, ORANGE, DARK);
        let blob = detect_color(&frame, &HsvBand::ball(), 2, 40, CandidateKind::Ball)
            .expect("ball visible");
        assert_relative_eq!(blob.centroid[0], 80.0, epsilon = 0.5);
        assert_relative_eq!(blob.centroid[1], 60.0, epsilon = 0.5);
        assert_eq!(blob.extent(), 40.0);
        let c = blob.to_candidate();
        assert_eq!(c.kind, CandidateKind::Ball);
        assert_eq!(c.diameter_px(), Some(40.0));
        assert!(c.strength() > 1.0);
    }

    #[test]
    fn color_blob_below_minimum_is_none() {
        let frame = draw_disk_frame(100, 100, [50.0, 50.0], 3.0, ORANGE, DARK);
        assert!(detect_color(&frame, &HsvBand::ball(), 2, 40, CandidateKind::Ball).is_none());
    }

    #[test]
    fn luminance_detects_bright_patch() {
        let frame = draw_disk_frame(100, 100, [30.0, 70.0], 12.0, [250, 250, 250], [120, 120, 120]);
        let blob = detect_luminance(&frame, 40.0, 225.0, 1, 40).expect("bright patch");
        assert_relative_eq!(blob.centroid[0], 30.0, epsilon = 0.5);
        assert_relative_eq!(blob.centroid[1], 70.0, epsilon = 0.5);
        assert_eq!(blob.kind, CandidateKind::Target);
    }

    #[test]
    fn boundary_points_lie_on_the_rim() {
        let frame = draw_disk_frame(100, 100, [50.0, 50.0], 15.0, ORANGE, DARK);
        let blob = detect_color(&frame, &HsvBand::ball(), 1, 40, CandidateKind::Ball).unwrap();
        let rim = blob.boundary_points();
        assert!(!rim.is_empty());
        assert!(rim.len() < blob.count());
        for [x, y] in rim {
            let d = (x - 50.0).hypot(y - 50.0);
            assert!(d > 13.0 && d <= 15.0, "rim point at distance {}", d);
        }
    }

    #[test]
    fn motion_needs_converged_background() {
        let bg = Frame::from_pixel(80, 60, image::Rgba([30, 30, 30, 255]));
        let mut model = BackgroundModel::new(3);
        let mut moving = bg.clone();
        paint_disk(&mut moving, [40.0, 30.0], 8.0, [200, 200, 200]);

        model.observe(&bg);
        model.observe(&bg);
        assert!(!model.is_converged());
        assert!(model.detect_motion(&moving, 60.0, 1, 20).is_none());

        model.observe(&bg);
        assert!(model.is_converged());
        let blob = model.detect_motion(&moving, 60.0, 1, 20).expect("motion");
        assert_relative_eq!(blob.centroid[0], 40.0, epsilon = 0.5);
        assert_relative_eq!(blob.centroid[1], 30.0, epsilon = 0.5);
        assert!(model.detect_motion(&bg, 60.0, 1, 20).is_none());

        // Frozen: later frames do not change the background.
        model.observe(&moving);
        assert!(model.detect_motion(&moving, 60.0, 1, 20).is_some());
    }

    #[test]
    fn size_change_restarts_background() {
        let mut model = BackgroundModel::new(2);
        model.observe(&Frame::new(10, 10));
        model.observe(&Frame::new(10, 10));
        assert!(model.is_converged());
        model.observe(&Frame::new(12, 10));
        assert!(!model.is_converged());
        assert_eq!(model.frames(), 1);
    }

    #[test]
    fn selection_normalises_by_strategy_minimum() {
        let mk = |count, min, kind| DetectionCandidate {
            x: 0.0,
            y: 0.0,
            radius: None,
            extent_px: None,
            score: 0.5,
            pixel_count: count,
            min_required: min,
            kind,
        };
        let cands = [
            mk(300, 200, CandidateKind::Target),
            mk(100, 40, CandidateKind::Ball),
            mk(500, 400, CandidateKind::Motion),
        ];
        assert_eq!(select_best(&cands).unwrap().kind, CandidateKind::Ball);
        assert!(select_best(&[]).is_none());
    }
}
