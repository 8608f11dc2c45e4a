// SPDX-License-Identifier: MPL-2.0

//! GIF container decoding.
//!
//! Every frame is composited onto the logical screen, so the resulting
//! [`FrameSequence`] holds full-canvas bitmaps that can be shown in isolation.
//! Delays are normalized and frames are optionally shrunk to a target size.

use std::{io::Cursor, time::Duration};

use gif::{ColorOutput, DisposalMethod, Repeat};
use gifloop_config::{FilterMethod, TargetSize};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::{debug, info};

use super::detection::looks_like_gif;
use super::types::{DEFAULT_FRAME_DURATION, DecodedAnimation, Frame, FrameSequence};
use crate::error::DecodeError;
use crate::scaler;

/// Largest logical screen accepted, in RGBA bytes.
pub const MAX_CANVAS_BYTES: u64 = 128 * 1024 * 1024;

/// Default cap on the RGBA bytes of all decoded frames together.
pub const DEFAULT_MEMORY_LIMIT: u64 = 1024 * 1024 * 1024;

/// Options controlling how frames are post-processed after decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Bounding box frames are shrunk into.
    pub target_size: Option<TargetSize>,
    /// Filter used when shrinking.
    pub filter: FilterMethod,
    /// Cap on the full-size RGBA bytes held by all frames of one decode.
    pub memory_limit: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            target_size: None,
            filter: FilterMethod::default(),
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

/// Convert a GIF delay (centiseconds) to a display duration.
///
/// Zero delays are a common malformed-GIF convention for "use a default".
#[must_use]
pub fn normalize_delay(centiseconds: u16) -> Duration {
    if centiseconds == 0 {
        DEFAULT_FRAME_DURATION
    } else {
        Duration::from_millis(u64::from(centiseconds) * 10)
    }
}

/// Decode container bytes into a frame sequence.
pub fn decode(
    bytes: &[u8],
    target_size: Option<TargetSize>,
) -> Result<FrameSequence, DecodeError> {
    let options = DecodeOptions {
        target_size,
        ..DecodeOptions::default()
    };
    decode_animation(bytes, &options).map(|animation| animation.frames)
}

/// Decode container bytes, keeping the header metadata.
pub fn decode_animation(
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<DecodedAnimation, DecodeError> {
    if !looks_like_gif(bytes) {
        return Err(DecodeError::NotGif);
    }

    let mut gif_options = gif::DecodeOptions::new();
    gif_options.set_color_output(ColorOutput::RGBA);
    let mut reader = gif_options
        .read_info(Cursor::new(bytes))
        .map_err(DecodeError::Container)?;

    let width = u32::from(reader.width());
    let height = u32::from(reader.height());
    debug!(width, height, bytes = bytes.len(), "GIF header parsed");

    let canvas_bytes = u64::from(width) * u64::from(height) * 4;
    if canvas_bytes > MAX_CANVAS_BYTES.min(options.memory_limit) {
        return Err(DecodeError::TooLarge { width, height });
    }

    let mut canvas = Canvas::new(width, height);
    let mut decoded = Vec::new();

    loop {
        let index = decoded.len();
        let frame = match reader.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(source) => return Err(DecodeError::Frame { index, source }),
        };

        if canvas_bytes * (index as u64 + 1) > options.memory_limit {
            return Err(DecodeError::MemoryLimit {
                frames: index + 1,
                limit: options.memory_limit,
            });
        }

        let duration = normalize_delay(frame.delay);
        let image = canvas
            .render(frame)
            .ok_or(DecodeError::Bitmap { index })?;

        tracing::trace!(
            frame = index,
            left = frame.left,
            top = frame.top,
            width = frame.width,
            height = frame.height,
            duration_ms = duration.as_millis(),
            "GIF frame decoded"
        );

        decoded.push((image, duration));
    }

    if decoded.is_empty() {
        return Err(DecodeError::NoFrames);
    }

    // The repeat count is the number of extra plays after the first one.
    let loop_count = match reader.repeat() {
        Repeat::Infinite => 0,
        Repeat::Finite(repeats) => u32::from(repeats) + 1,
    };

    let frames = finish_frames(decoded, options)?;

    info!(
        frames = frames.len(),
        width,
        height,
        loop_count,
        total_ms = frames.total_duration().as_millis(),
        "Decoded GIF"
    );

    Ok(DecodedAnimation {
        frames,
        width,
        height,
        loop_count,
    })
}

/// Wrap decoded bitmaps into frames, shrinking them in parallel if requested.
fn finish_frames(
    decoded: Vec<(RgbaImage, Duration)>,
    options: &DecodeOptions,
) -> Result<FrameSequence, DecodeError> {
    let Some(target) = options.target_size else {
        return Ok(decoded
            .into_iter()
            .map(|(image, duration)| Frame::new(image, duration))
            .collect());
    };

    let max_side = target.max_pixel();
    let filter = options.filter;

    let frames = decoded
        .into_par_iter()
        .enumerate()
        .map(|(index, (image, duration))| {
            scaler::thumbnail(image, max_side, filter)
                .map(|image| Frame::new(image, duration))
                .map_err(|reason| DecodeError::Resize { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FrameSequence::new(frames))
}

/// Logical screen that frames are drawn onto.
struct Canvas {
    pixels: RgbaImage,
    /// Snapshot restored after a frame disposed with `Previous`.
    saved: Option<RgbaImage>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            saved: None,
        }
    }

    /// Draw `frame`, return the visible canvas, then apply its disposal.
    ///
    /// Returns `None` if the frame buffer is shorter than its declared size.
    fn render(&mut self, frame: &gif::Frame<'_>) -> Option<RgbaImage> {
        let left = u32::from(frame.left);
        let top = u32::from(frame.top);
        let fw = u32::from(frame.width);
        let fh = u32::from(frame.height);
        let pixel_count = fw as usize * fh as usize;

        if frame.buffer.len() < pixel_count * 4 {
            return None;
        }

        if frame.dispose == DisposalMethod::Previous {
            self.saved = Some(self.pixels.clone());
        }

        if pixel_count > 0 {
            for (i, src) in frame.buffer.chunks_exact(4).take(pixel_count).enumerate() {
                // transparent pixels leave the canvas untouched
                if src[3] == 0 {
                    continue;
                }
                let x = left + i as u32 % fw;
                let y = top + i as u32 / fw;
                if x < self.pixels.width() && y < self.pixels.height() {
                    self.pixels
                        .put_pixel(x, y, Rgba([src[0], src[1], src[2], src[3]]));
                }
            }
        }

        let visible = self.pixels.clone();

        match frame.dispose {
            DisposalMethod::Background => {
                let right = (left + fw).min(self.pixels.width());
                let bottom = (top + fh).min(self.pixels.height());
                for y in top..bottom {
                    for x in left..right {
                        self.pixels.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                    }
                }
            }
            DisposalMethod::Previous => {
                if let Some(saved) = self.saved.take() {
                    self.pixels = saved;
                }
            }
            _ => {}
        }

        Some(visible)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gif::{DisposalMethod, Repeat};
    use gifloop_config::TargetSize;

    use super::*;
    use crate::animated::fixtures::{self, BLUE, GREEN, RED, TRANSPARENT};

    #[test]
    fn delays_are_normalized() {
        let bytes = fixtures::gif_bytes(4, 4, &[0, 5, 20]);
        let frames = decode(&bytes, None).unwrap();

        let durations: Vec<_> = frames.iter().map(|f| f.duration).collect();
        assert_eq!(
            durations,
            [
                Duration::from_millis(100),
                Duration::from_millis(50),
                Duration::from_millis(200)
            ]
        );
    }

    #[test]
    fn zero_delay_maps_to_default() {
        assert_eq!(normalize_delay(0), DEFAULT_FRAME_DURATION);
        assert_eq!(normalize_delay(1), Duration::from_millis(10));
        assert_eq!(normalize_delay(10), Duration::from_millis(100));
    }

    #[test]
    fn frames_cover_the_logical_screen() {
        let bytes = fixtures::gif_bytes(6, 3, &[10, 10]);
        let animation = decode_animation(&bytes, &DecodeOptions::default()).unwrap();

        assert_eq!((animation.width, animation.height), (6, 3));
        assert_eq!(animation.frames.len(), 2);
        for frame in animation.frames.iter() {
            assert_eq!((frame.width(), frame.height()), (6, 3));
        }
        assert_eq!(animation.frames[0].image.get_pixel(0, 0).0, RED);
        assert_eq!(animation.frames[1].image.get_pixel(5, 2).0, GREEN);
    }

    #[test]
    fn rejects_non_gif_data() {
        assert!(matches!(
            decode(b"\x89PNG\r\n\x1a\n0000", None),
            Err(DecodeError::NotGif)
        ));
        assert!(matches!(decode(b"", None), Err(DecodeError::NotGif)));
    }

    #[test]
    fn rejects_container_without_frames() {
        let bytes = fixtures::encode(4, 4, Repeat::Infinite, Vec::new());
        assert!(matches!(decode(&bytes, None), Err(DecodeError::NoFrames)));
    }

    #[test]
    fn truncated_frame_fails_whole_decode() {
        let bytes = fixtures::gif_bytes(16, 16, &[10, 10, 10]);
        let truncated = &bytes[..bytes.len() - 10];
        assert!(decode(truncated, None).is_err());
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let bytes = fixtures::encode(
            65535,
            65535,
            Repeat::Infinite,
            vec![fixtures::patch(0, 0, 1, 1, 1, DisposalMethod::Keep)],
        );
        assert!(matches!(
            decode(&bytes, None),
            Err(DecodeError::TooLarge {
                width: 65535,
                height: 65535
            })
        ));
    }

    #[test]
    fn decoded_frames_respect_memory_limit() {
        // 4x4 RGBA canvas: 64 bytes per frame
        let bytes = fixtures::gif_bytes(4, 4, &[10, 10, 10]);

        let options = DecodeOptions {
            memory_limit: 128,
            ..DecodeOptions::default()
        };
        assert!(matches!(
            decode_animation(&bytes, &options),
            Err(DecodeError::MemoryLimit { frames: 3, limit: 128 })
        ));

        let options = DecodeOptions {
            memory_limit: 192,
            ..DecodeOptions::default()
        };
        assert_eq!(decode_animation(&bytes, &options).unwrap().frames.len(), 3);
    }

    #[test]
    fn resize_bounds_every_frame() {
        let bytes = fixtures::gif_bytes(40, 20, &[10, 10, 10]);
        let frames = decode(&bytes, Some(TargetSize::new(10, 8))).unwrap();

        assert_eq!(frames.len(), 3);
        for frame in frames.iter() {
            assert_eq!((frame.width(), frame.height()), (10, 5));
        }
    }

    #[test]
    fn resize_does_not_upscale() {
        let bytes = fixtures::gif_bytes(8, 8, &[10]);
        let frames = decode(&bytes, Some(TargetSize::new(100, 100))).unwrap();
        assert_eq!((frames[0].width(), frames[0].height()), (8, 8));
    }

    #[test]
    fn background_disposal_clears_the_frame_rect() {
        let bytes = fixtures::encode(
            4,
            4,
            Repeat::Infinite,
            vec![
                fixtures::patch(0, 0, 4, 4, 1, DisposalMethod::Keep),
                fixtures::patch(1, 1, 2, 2, 3, DisposalMethod::Background),
                fixtures::patch(0, 0, 1, 1, 2, DisposalMethod::Keep),
            ],
        );
        let frames = decode(&bytes, None).unwrap();

        assert_eq!(frames[1].image.get_pixel(0, 0).0, RED);
        assert_eq!(frames[1].image.get_pixel(1, 1).0, BLUE);
        assert_eq!(frames[2].image.get_pixel(0, 0).0, GREEN);
        assert_eq!(frames[2].image.get_pixel(1, 1).0, TRANSPARENT);
        assert_eq!(frames[2].image.get_pixel(3, 3).0, RED);
    }

    #[test]
    fn previous_disposal_restores_the_canvas() {
        let bytes = fixtures::encode(
            4,
            4,
            Repeat::Infinite,
            vec![
                fixtures::patch(0, 0, 4, 4, 1, DisposalMethod::Keep),
                fixtures::patch(0, 0, 2, 2, 3, DisposalMethod::Previous),
                fixtures::patch(3, 3, 1, 1, 2, DisposalMethod::Keep),
            ],
        );
        let frames = decode(&bytes, None).unwrap();

        assert_eq!(frames[1].image.get_pixel(0, 0).0, BLUE);
        assert_eq!(frames[2].image.get_pixel(0, 0).0, RED);
        assert_eq!(frames[2].image.get_pixel(3, 3).0, GREEN);
    }

    #[test]
    fn transparent_pixels_keep_previous_content() {
        let mut overlay = fixtures::patch(0, 0, 2, 1, 0, DisposalMethod::Keep);
        overlay.transparent = Some(0);
        overlay.buffer = vec![0, 3].into();

        let bytes = fixtures::encode(
            2,
            1,
            Repeat::Infinite,
            vec![fixtures::patch(0, 0, 2, 1, 1, DisposalMethod::Keep), overlay],
        );
        let frames = decode(&bytes, None).unwrap();

        assert_eq!(frames[1].image.get_pixel(0, 0).0, RED);
        assert_eq!(frames[1].image.get_pixel(1, 0).0, BLUE);
    }

    #[test]
    fn loop_count_comes_from_the_container() {
        let infinite = fixtures::encode(
            2,
            2,
            Repeat::Infinite,
            vec![fixtures::patch(0, 0, 2, 2, 1, DisposalMethod::Keep)],
        );
        let twice = fixtures::encode(
            2,
            2,
            Repeat::Finite(1),
            vec![fixtures::patch(0, 0, 2, 2, 1, DisposalMethod::Keep)],
        );

        let options = DecodeOptions::default();
        assert_eq!(decode_animation(&infinite, &options).unwrap().loop_count, 0);
        assert_eq!(decode_animation(&twice, &options).unwrap().loop_count, 2);
    }
}
