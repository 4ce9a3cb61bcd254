//! Frame sources feeding a tracking session.

use crate::frame::TimedFrame;

/// Synchronous pull interface over a frame stream.
///
/// `None` marks the end of the stream. Any waiting for the next frame
/// happens inside the implementation.
pub trait FrameSource {
    /// Next frame, blocking until one is available.
    fn next_frame(&mut self) -> Option<TimedFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Option<TimedFrame> {
        (**self).next_frame()
    }
}

/// In-memory frame source.
#[derive(Debug)]
pub struct VecSource {
    frames: std::vec::IntoIter<TimedFrame>,
}

impl VecSource {
    pub fn new(frames: Vec<TimedFrame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }

    /// Frames not yet pulled.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FromIterator<TimedFrame> for VecSource {
    fn from_iter<I: IntoIterator<Item = TimedFrame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Option<TimedFrame> {
        self.frames.next()
    }
}
