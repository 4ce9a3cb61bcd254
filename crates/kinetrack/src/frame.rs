//! Frame containers handed to the pipeline by the acquisition layer.

use image::RgbaImage;

/// One decoded video frame: RGBA bytes, row-major.
pub type Frame = RgbaImage;

/// Errors raised while wrapping caller-provided pixel buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Width or height is zero.
    EmptyFrame {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Buffer length does not match `width * height * 4`.
    BufferSize {
        /// Expected number of bytes.
        expected: usize,
        /// Provided number of bytes.
        got: usize,
    },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFrame { width, height } => {
                write!(f, "empty frame: {}x{}", width, height)
            }
            Self::BufferSize { expected, got } => {
                write!(f, "RGBA buffer size mismatch: expected {} bytes, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Wrap a raw RGBA buffer into a [`Frame`], validating its size.
pub fn frame_from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Frame, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::EmptyFrame { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(FrameError::BufferSize {
            expected,
            got: pixels.len(),
        });
    }
    RgbaImage::from_raw(width, height, pixels).ok_or(FrameError::BufferSize {
        expected,
        got: 0,
    })
}

/// A frame paired with its capture timestamp in seconds.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    /// Capture time (seconds, monotonically increasing within a stream).
    pub t: f64,
    /// Pixel data.
    pub frame: Frame,
}

impl TimedFrame {
    /// Pair a frame with its timestamp.
    pub fn new(t: f64, frame: Frame) -> Self {
        Self { t, frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = frame_from_rgba(4, 4, vec![0; 10]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferSize {
                expected: 64,
                got: 10
            }
        );
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(matches!(
            frame_from_rgba(0, 3, Vec::new()),
            Err(FrameError::EmptyFrame { .. })
        ));
    }

    #[test]
    fn wraps_valid_buffer() {
        let frame = frame_from_rgba(2, 1, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        assert_eq!(frame.dimensions(), (2, 1));
        assert_eq!(frame.get_pixel(1, 0).0, [4, 5, 6, 255]);
    }
}
