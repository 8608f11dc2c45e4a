// SPDX-License-Identifier: MPL-2.0

//! Animated GIF decoding and playback.
//!
//! Container bytes go through one decode path and one reduce path, then to
//! either of two thin consumers:
//!
//! - [`PlaybackDriver`]: presents individually timed frames on every tick
//! - [`AnimatedImage`]: a single looping handle with a uniform frame interval
//!
//! # Module Structure
//!
//! - [`types`]: Core types (Frame, FrameSequence, DecodedAnimation)
//! - [`detection`]: Signature and file type detection
//! - [`decoder`]: GIF decoding with disposal compositing and optional downscaling
//! - [`reduce`]: Frame-count reduction preserving total duration
//! - [`composite`]: One-shot compositor
//! - [`driver`]: Tick-driven playback state machine

pub mod composite;
pub mod decoder;
pub mod detection;
pub mod driver;
pub mod reduce;
pub mod types;

// Re-export public API
pub use composite::AnimatedImage;
pub use decoder::{DecodeOptions, decode, decode_animation, normalize_delay};
pub use detection::{is_gif_file, looks_like_gif};
pub use driver::{FrameSink, PlaybackDriver, PlaybackState, PlaybackStatus};
pub use reduce::reduce;
pub use types::{
    DEFAULT_FRAME_DURATION, DecodedAnimation, Frame, FrameSequence, MAX_FRAME_DURATION,
};

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod tests;
