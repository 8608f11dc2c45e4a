// SPDX-License-Identifier: MPL-2.0

//! Animated GIF playback.
//!
//! Bytes from a [`source::ByteSource`] are decoded into full-canvas frames,
//! optionally thinned out and cached, then played back on a calloop event loop
//! through an [`view::AnimatedView`].

pub mod animated;
pub mod cache;
pub mod error;
pub mod scaler;
pub mod source;
pub mod ticker;
pub mod view;

pub use gifloop_config as config;

pub use cache::FrameCache;
pub use error::{Error, Result};
pub use view::{AnimatedView, LoadRequest, Ready};
