// SPDX-License-Identifier: MPL-2.0

//! Core types for animated playback.

use std::{
    ops::Deref,
    sync::{Arc, OnceLock},
    time::Duration,
};

use image::RgbaImage;

/// Substituted for a missing or zero container delay.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(100);

/// Upper bound on the time a single tick may advance playback.
///
/// A stalled host clock (e.g. a suspended process) otherwise produces one giant
/// catch-up step.
pub const MAX_FRAME_DURATION: Duration = Duration::from_secs(1);

static EMPTY_IMAGE: OnceLock<Arc<RgbaImage>> = OnceLock::new();

/// A decoded bitmap with its display duration.
#[derive(Clone)]
pub struct Frame {
    /// The decoded image data (RGBA).
    pub image: Arc<RgbaImage>,
    /// How long this frame should be displayed.
    pub duration: Duration,
}

impl Frame {
    pub fn new(image: RgbaImage, duration: Duration) -> Self {
        Self {
            image: Arc::new(image),
            duration,
        }
    }

    /// Blank 1x1 frame with zero duration, shown when a lookup fails.
    #[must_use]
    pub fn empty() -> Self {
        let image = EMPTY_IMAGE.get_or_init(|| Arc::new(RgbaImage::new(1, 1)));
        Self {
            image: Arc::clone(image),
            duration: Duration::ZERO,
        }
    }

    /// Whether this is the shared fallback frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        EMPTY_IMAGE
            .get()
            .is_some_and(|empty| Arc::ptr_eq(empty, &self.image))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Same bitmap, different duration.
    #[must_use]
    pub fn with_duration(&self, duration: Duration) -> Self {
        Self {
            image: Arc::clone(&self.image),
            duration,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("dimensions", &format!("{}x{}", self.width(), self.height()))
            .field("duration", &self.duration)
            .finish()
    }
}

/// Ordered, immutable list of frames in display order.
///
/// Clones share storage, so a sequence can sit in the cache and be played by
/// any number of drivers at once.
#[derive(Clone, Default)]
pub struct FrameSequence {
    frames: Arc<[Frame]>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Sum of all frame durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.duration).sum()
    }

    /// Approximate memory held by the frame bitmaps.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.image.as_raw().len()).sum()
    }

    /// Whether both sequences share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }
}

impl Deref for FrameSequence {
    type Target = [Frame];

    fn deref(&self) -> &[Frame] {
        &self.frames
    }
}

impl From<Vec<Frame>> for FrameSequence {
    fn from(frames: Vec<Frame>) -> Self {
        Self::new(frames)
    }
}

impl FromIterator<Frame> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for FrameSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSequence")
            .field("frames", &self.frames.len())
            .field("total_duration", &self.total_duration())
            .finish()
    }
}

/// A decoded container along with its header metadata.
#[derive(Debug, Clone)]
pub struct DecodedAnimation {
    pub frames: FrameSequence,
    /// Logical screen width.
    pub width: u32,
    /// Logical screen height.
    pub height: u32,
    /// Container repeat count; 0 loops forever.
    pub loop_count: u32,
}
