// SPDX-License-Identifier: MPL-2.0

//! One-shot compositor for the composited delivery mode.
//!
//! Instead of individually timed frames, the sink receives a single looping
//! handle whose frames share one uniform interval, the way platform animated
//! image types present a GIF.

use std::{sync::Arc, time::Duration};

use image::RgbaImage;

use super::types::FrameSequence;

/// A looping animation with evenly spaced frames.
#[derive(Clone)]
pub struct AnimatedImage {
    frames: Vec<Arc<RgbaImage>>,
    duration: Duration,
}

impl AnimatedImage {
    /// Collapse `sequence` into one handle spanning its total duration.
    ///
    /// Returns `None` for an empty sequence.
    #[must_use]
    pub fn compose(sequence: &FrameSequence) -> Option<Self> {
        if sequence.is_empty() {
            return None;
        }

        Some(Self {
            frames: sequence.iter().map(|f| Arc::clone(&f.image)).collect(),
            duration: sequence.total_duration(),
        })
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Length of one loop.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Display time of every frame.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.duration / self.frames.len() as u32
    }

    #[must_use]
    pub fn frames(&self) -> &[Arc<RgbaImage>] {
        &self.frames
    }

    /// Frame index visible `elapsed` after playback started, looping forever.
    #[must_use]
    pub fn index_at(&self, elapsed: Duration) -> usize {
        let interval = self.frame_interval().as_nanos();
        if interval == 0 {
            return 0;
        }
        let looped = elapsed.as_nanos() % self.duration.as_nanos();
        ((looped / interval) as usize).min(self.frames.len() - 1)
    }

    /// Bitmap visible `elapsed` after playback started.
    #[must_use]
    pub fn frame_at(&self, elapsed: Duration) -> &Arc<RgbaImage> {
        &self.frames[self.index_at(elapsed)]
    }

    /// Approximate memory held by the bitmaps.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.as_raw().len()).sum()
    }
}

impl std::fmt::Debug for AnimatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedImage")
            .field("frames", &self.frames.len())
            .field("duration", &self.duration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animated::fixtures::indexed_sequence;

    #[test]
    fn frames_share_a_uniform_interval() {
        let animation = AnimatedImage::compose(&indexed_sequence(&[100, 300])).unwrap();

        assert_eq!(animation.frame_count(), 2);
        assert_eq!(animation.duration(), Duration::from_millis(400));
        assert_eq!(animation.frame_interval(), Duration::from_millis(200));
    }

    #[test]
    fn frame_lookup_loops() {
        let sequence = indexed_sequence(&[100, 100, 100]);
        let animation = AnimatedImage::compose(&sequence).unwrap();

        assert_eq!(animation.index_at(Duration::ZERO), 0);
        assert_eq!(animation.index_at(Duration::from_millis(150)), 1);
        assert_eq!(animation.index_at(Duration::from_millis(299)), 2);
        assert_eq!(animation.index_at(Duration::from_millis(300)), 0);
        assert_eq!(animation.index_at(Duration::from_millis(1250)), 0);
        assert!(Arc::ptr_eq(
            animation.frame_at(Duration::from_millis(210)),
            &sequence[2].image
        ));
    }

    #[test]
    fn empty_sequence_has_no_composite() {
        assert!(AnimatedImage::compose(&FrameSequence::default()).is_none());
    }
}
