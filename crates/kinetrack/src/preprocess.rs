//! Per-frame image preprocessing: grayscale, box blur, Sobel magnitude and
//! threshold binarization.
//!
//! All transforms are pure and allocate their output; nothing here keeps
//! state between frames.

use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma};

use crate::frame::Frame;

/// Single-channel float image (gradient magnitudes, accumulators).
pub type FloatMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Configuration for edge-map construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Box-blur radius applied before the Sobel pass (0 disables blurring).
    pub blur_radius: u32,
    /// Edge threshold as a fraction of the frame's maximum gradient magnitude.
    pub edge_threshold_frac: f32,
    /// Frames wider than this are downscaled before geometric detection.
    pub max_width: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_radius: 1,
            edge_threshold_frac: 0.25,
            max_width: 480,
        }
    }
}

/// Binary mask, one `bool` per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BitMap {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BitMap {
    /// All-zero mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Mask dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bit at `(x, y)`; out-of-range coordinates read as unset.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    /// Set the bit at `(x, y)`; out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Coordinates of every set pixel, row-major order.
    pub fn points(&self) -> Vec<[u32; 2]> {
        let w = self.width as usize;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| [(i % w) as u32, (i / w) as u32])
            .collect()
    }
}

/// Luminosity grayscale: `0.299 R + 0.587 G + 0.114 B`, alpha ignored.
pub fn to_grayscale(frame: &Frame) -> GrayImage {
    let (w, h) = frame.dimensions();
    let mut out = GrayImage::new(w, h);
    for (src, dst) in frame.pixels().zip(out.pixels_mut()) {
        let [r, g, b, _] = src.0;
        dst.0[0] = luminance(r, g, b).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Luminance of one RGB triple on the 0..=255 scale.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Square mean filter of side `2 * radius + 1`; border samples repeat the
/// edge pixels.
pub fn box_blur(gray: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    imageproc::filter::box_filter(gray, radius, radius)
}

/// Sobel gradient magnitude. The 1-pixel border is left at zero.
pub fn sobel_magnitude(gray: &GrayImage) -> FloatMap {
    let (w, h) = gray.dimensions();
    let mut out = FloatMap::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }
    let gx = imageproc::gradients::horizontal_sobel(gray);
    let gy = imageproc::gradients::vertical_sobel(gray);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let dx = gx.get_pixel(x, y)[0] as f32;
            let dy = gy.get_pixel(x, y)[0] as f32;
            out.put_pixel(x, y, Luma([(dx * dx + dy * dy).sqrt()]));
        }
    }
    out
}

/// Set a bit wherever `value >= threshold`.
pub fn binarize(map: &FloatMap, threshold: f32) -> BitMap {
    let (w, h) = map.dimensions();
    let mut out = BitMap::new(w, h);
    for (dst, &v) in out.bits.iter_mut().zip(map.as_raw().iter()) {
        *dst = v >= threshold;
    }
    out
}

/// Maximum value of a float map (0 for an empty map).
pub fn max_value(map: &FloatMap) -> f32 {
    map.as_raw().iter().copied().fold(0.0f32, f32::max)
}

/// Blur, Sobel and threshold at a fraction of this frame's strongest
/// gradient. A flat frame yields an empty mask.
pub fn adaptive_edge_map(gray: &GrayImage, config: &PreprocessConfig) -> BitMap {
    let blurred = box_blur(gray, config.blur_radius);
    let mag = sobel_magnitude(&blurred);
    let max_mag = max_value(&mag);
    let (w, h) = gray.dimensions();
    if max_mag < 1e-6 {
        return BitMap::new(w, h);
    }
    binarize(&mag, config.edge_threshold_frac * max_mag)
}

/// Shrink `gray` to at most `max_width` columns (aspect preserved).
///
/// Returns the working image and the factor that maps working coordinates
/// back to source coordinates (`source = working * scale`).
pub fn downscale_to_width(gray: &GrayImage, max_width: u32) -> (GrayImage, f64) {
    let (w, h) = gray.dimensions();
    if max_width == 0 || w <= max_width {
        return (gray.clone(), 1.0);
    }
    let scale = w as f64 / max_width as f64;
    let new_h = ((h as f64 / scale).round() as u32).max(1);
    let small = image::imageops::resize(gray, max_width, new_h, FilterType::Triangle);
    (small, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn grayscale_uses_luminosity_weights() {
        let mut frame = Frame::new(3, 1);
        frame.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        frame.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        frame.put_pixel(2, 0, Rgba([0, 0, 255, 0]));
        let gray = to_grayscale(&frame);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
    }

    #[test]
    fn box_blur_spreads_impulse_and_clamps_borders() {
        let mut gray = GrayImage::new(5, 5);
        gray.put_pixel(2, 2, Luma([90]));
        let out = box_blur(&gray, 1);
        assert_eq!(out.get_pixel(2, 2)[0], 10);
        assert_eq!(out.get_pixel(1, 1)[0], 10);
        assert_eq!(out.get_pixel(0, 0)[0], 0);

        let flat = GrayImage::from_pixel(4, 3, Luma([77]));
        let out = box_blur(&flat, 2);
        assert!(out.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn sobel_border_is_zero_and_step_is_detected() {
        let mut gray = GrayImage::new(8, 8);
        for y in 0..8 {
            for x in 4..8 {
                gray.put_pixel(x, y, Luma([200]));
            }
        }
        let mag = sobel_magnitude(&gray);
        for i in 0..8 {
            assert_eq!(mag.get_pixel(0, i)[0], 0.0);
            assert_eq!(mag.get_pixel(7, i)[0], 0.0);
            assert_eq!(mag.get_pixel(i, 0)[0], 0.0);
            assert_eq!(mag.get_pixel(i, 7)[0], 0.0);
        }
        assert!(mag.get_pixel(3, 4)[0] > 0.0);
        assert!(mag.get_pixel(4, 4)[0] > 0.0);
        assert_eq!(mag.get_pixel(1, 4)[0], 0.0);
    }

    #[test]
    fn binarize_is_inclusive() {
        let mut map = FloatMap::new(3, 1);
        map.put_pixel(0, 0, Luma([0.5]));
        map.put_pixel(1, 0, Luma([1.0]));
        map.put_pixel(2, 0, Luma([2.0]));
        let bits = binarize(&map, 1.0);
        assert!(!bits.get(0, 0));
        assert!(bits.get(1, 0));
        assert!(bits.get(2, 0));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.points(), vec![[1, 0], [2, 0]]);
    }

    #[test]
    fn flat_frame_has_no_edges() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128]));
        let edges = adaptive_edge_map(&gray, &PreprocessConfig::default());
        assert_eq!(edges.count(), 0);
    }

    #[test]
    fn downscale_reports_scale() {
        let gray = GrayImage::new(960, 540);
        let (small, scale) = downscale_to_width(&gray, 480);
        assert_eq!(small.dimensions(), (480, 270));
        assert!((scale - 2.0).abs() < 1e-12);

        let (same, scale) = downscale_to_width(&GrayImage::new(320, 240), 480);
        assert_eq!(same.dimensions(), (320, 240));
        assert_eq!(scale, 1.0);
    }
}
