//! Synthetic frame renderers shared by unit tests.

use image::{GrayImage, Luma, Rgba};

use crate::conic::EllipseParams;
use crate::frame::Frame;

/// Render a filled disk on a uniform background.
///
/// Pixels at distance `d <= radius` from `center` get `fg`, others `bg`.
pub(crate) fn draw_disk_gray(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    fg: u8,
    bg: u8,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            let pix = if (dx * dx + dy * dy).sqrt() <= radius {
                fg
            } else {
                bg
            };
            img.put_pixel(x, y, Luma([pix]));
        }
    }
    img
}

/// RGBA counterpart of [`draw_disk_gray`] with opaque colors.
pub(crate) fn draw_disk_frame(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    fg: [u8; 3],
    bg: [u8; 3],
) -> Frame {
    let mut frame = Frame::from_pixel(w, h, Rgba([bg[0], bg[1], bg[2], 255]));
    paint_disk(&mut frame, center, radius, fg);
    frame
}

/// Paint a filled disk into an existing frame.
pub(crate) fn paint_disk(frame: &mut Frame, center: [f32; 2], radius: f32, fg: [u8; 3]) {
    let (w, h) = frame.dimensions();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            if (dx * dx + dy * dy).sqrt() <= radius {
                frame.put_pixel(x, y, Rgba([fg[0], fg[1], fg[2], 255]));
            }
        }
    }
}

/// Render a filled ellipse (a tilted circular target) on a uniform
/// background.
pub(crate) fn draw_ellipse_frame(
    w: u32,
    h: u32,
    ellipse: &EllipseParams,
    fg: [u8; 3],
    bg: [u8; 3],
) -> Frame {
    let (s, c) = ellipse.tilt.sin_cos();
    let mut frame = Frame::from_pixel(w, h, Rgba([bg[0], bg[1], bg[2], 255]));
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - ellipse.cx;
            let dy = y as f64 - ellipse.cy;
            let u = (c * dx + s * dy) / ellipse.semi_major;
            let v = (-s * dx + c * dy) / ellipse.semi_minor;
            if u * u + v * v <= 1.0 {
                frame.put_pixel(x, y, Rgba([fg[0], fg[1], fg[2], 255]));
            }
        }
    }
    frame
}
