//! Circle localization by per-radius Hough voting.
//!
//! Every edge pixel votes for the centers `(x - r cos θ, y - r sin θ)` over a
//! fixed set of sampled angles. The accumulator is re-used radius by radius,
//! so memory stays at one `W x H` vote plane regardless of the sweep length.

use image::GrayImage;

use crate::preprocess::{adaptive_edge_map, downscale_to_width, BitMap, PreprocessConfig};

const PEAK_WINDOW: i64 = 5;
const PLATEAU_FRAC: f64 = 0.9;

/// Configuration for the Hough circle sweep.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Smallest radius tried (working pixels).
    pub r_min: f32,
    /// Largest radius tried (working pixels).
    pub r_max: f32,
    /// Radius increment of the sweep.
    pub r_step: f32,
    /// Number of angles sampled over 360°.
    pub angle_samples: usize,
    /// Minimum peak votes, as a fraction of `angle_samples`.
    pub min_vote_frac: f32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            r_min: 8.0,
            r_max: 60.0,
            r_step: 2.0,
            angle_samples: 60,
            min_vote_frac: 0.45,
        }
    }
}

impl HoughConfig {
    /// Minimum accumulator count for a peak to qualify.
    pub fn min_votes(&self) -> u32 {
        (self.min_vote_frac * self.angle_samples as f32).ceil().max(1.0) as u32
    }

    fn radii(&self) -> Vec<f32> {
        let mut out = Vec::new();
        if self.r_step <= 0.0 || self.r_max < self.r_min || self.r_min <= 0.0 {
            return out;
        }
        let mut r = self.r_min;
        while r <= self.r_max + 1e-4 {
            out.push(r);
            r += self.r_step;
        }
        out
    }
}

/// Best circle found by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircleCandidate {
    /// Center x (pixels).
    pub cx: f64,
    /// Center y (pixels).
    pub cy: f64,
    /// Radius (pixels).
    pub r: f64,
    /// Raw accumulator count at the peak.
    pub votes: u32,
    /// `votes / angle_samples`.
    pub score: f64,
}

impl CircleCandidate {
    fn rescaled(self, scale: f64) -> Self {
        Self {
            cx: self.cx * scale,
            cy: self.cy * scale,
            r: self.r * scale,
            ..self
        }
    }
}

/// Run the radius sweep over a binary edge map.
///
/// Returns `None` when the map has no edge pixels or no radius produces a
/// peak reaching [`HoughConfig::min_votes`].
pub fn hough_circle(edges: &BitMap, config: &HoughConfig) -> Option<CircleCandidate> {
    let (w, h) = edges.dimensions();
    if w == 0 || h == 0 || config.angle_samples == 0 {
        return None;
    }
    let points = edges.points();
    if points.is_empty() {
        return None;
    }
    let radii = config.radii();
    if radii.is_empty() {
        return None;
    }

    let trig: Vec<(f32, f32)> = (0..config.angle_samples)
        .map(|i| {
            let theta = 2.0 * std::f32::consts::PI * i as f32 / config.angle_samples as f32;
            (theta.cos(), theta.sin())
        })
        .collect();

    let stride = w as usize;
    let mut accum = vec![0u32; stride * h as usize];
    let min_votes = config.min_votes();
    let mut peaks: Vec<CircleCandidate> = Vec::new();

    for &r in &radii {
        accum.iter_mut().for_each(|v| *v = 0);
        for &[px, py] in &points {
            let xf = px as f32;
            let yf = py as f32;
            for &(c, s) in &trig {
                let cx = (xf - r * c).round();
                let cy = (yf - r * s).round();
                if cx < 0.0 || cy < 0.0 || cx >= w as f32 || cy >= h as f32 {
                    continue;
                }
                accum[cy as usize * stride + cx as usize] += 1;
            }
        }

        let Some((idx, votes)) = accum
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        else {
            continue;
        };
        if votes < min_votes {
            continue;
        }

        let [cx, cy] = refine_peak(&accum, stride, idx, votes);
        let score = votes as f64 / config.angle_samples as f64;
        tracing::trace!(r, votes, score, "hough peak");
        peaks.push(CircleCandidate {
            cx,
            cy,
            r: r as f64,
            votes,
            score,
        });
    }

    // Thick edge bands give equal scores to neighbouring radii; take the
    // middle of the tied run.
    let best_votes = peaks.iter().map(|p| p.votes).max()?;
    let tied: Vec<&CircleCandidate> = peaks.iter().filter(|p| p.votes == best_votes).collect();
    tied.get(tied.len() / 2).map(|&&p| p)
}

/// Vote-weighted centroid of the near-maximal bins around a peak.
///
/// The per-bin count saturates at `angle_samples`, so a thick edge band
/// produces a plateau rather than a single maximum.
fn refine_peak(accum: &[u32], stride: usize, idx: usize, votes: u32) -> [f64; 2] {
    let h = accum.len() / stride;
    let px = (idx % stride) as i64;
    let py = (idx / stride) as i64;
    let floor = (votes as f64 * PLATEAU_FRAC).ceil() as u32;
    let mut sum_w = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    for y in (py - PEAK_WINDOW).max(0)..=(py + PEAK_WINDOW).min(h as i64 - 1) {
        for x in (px - PEAK_WINDOW).max(0)..=(px + PEAK_WINDOW).min(stride as i64 - 1) {
            let v = accum[y as usize * stride + x as usize];
            if v < floor {
                continue;
            }
            let wgt = v as f64;
            sum_w += wgt;
            sum_x += wgt * x as f64;
            sum_y += wgt * y as f64;
        }
    }
    if sum_w <= 0.0 {
        return [px as f64, py as f64];
    }
    [sum_x / sum_w, sum_y / sum_w]
}

/// Full circle detection on a grayscale frame: downscale, edge map, sweep,
/// and map the result back to source resolution.
///
/// Radii in `hough` are interpreted in working (downscaled) pixels.
pub fn detect_circle(
    gray: &GrayImage,
    preprocess: &PreprocessConfig,
    hough: &HoughConfig,
) -> Option<CircleCandidate> {
    let (work, scale) = downscale_to_width(gray, preprocess.max_width);
    let edges = adaptive_edge_map(&work, preprocess);
    tracing::trace!(edge_pixels = edges.count(), scale, "hough edge map");
    hough_circle(&edges, hough).map(|c| c.rescaled(scale))
}
