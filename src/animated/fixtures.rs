// SPDX-License-Identifier: MPL-2.0

//! In-memory GIF builders for tests.

use std::{borrow::Cow, time::Duration};

use gif::{DisposalMethod, Encoder, Repeat};
use image::RgbaImage;

use super::types::{Frame, FrameSequence};

pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Global palette: black, red, green, blue.
const PALETTE: [u8; 12] = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];

/// A frame filling `width`×`height` at (`left`, `top`) with palette `index`.
pub fn patch(
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    index: u8,
    dispose: DisposalMethod,
) -> gif::Frame<'static> {
    gif::Frame {
        left,
        top,
        width,
        height,
        dispose,
        delay: 10,
        buffer: Cow::Owned(vec![index; usize::from(width) * usize::from(height)]),
        ..gif::Frame::default()
    }
}

/// Encode frames into a GIF with the fixture palette.
pub fn encode(width: u16, height: u16, repeat: Repeat, frames: Vec<gif::Frame<'_>>) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = Encoder::new(&mut bytes, width, height, &PALETTE).unwrap();
        encoder.set_repeat(repeat).unwrap();
        for frame in &frames {
            encoder.write_frame(frame).unwrap();
        }
    }
    bytes
}

/// Full-canvas frames cycling red, green, blue with the given delays.
pub fn gif_bytes(width: u16, height: u16, delays: &[u16]) -> Vec<u8> {
    let frames = delays
        .iter()
        .enumerate()
        .map(|(i, &delay)| {
            let mut frame = patch(0, 0, width, height, (i % 3) as u8 + 1, DisposalMethod::Keep);
            frame.delay = delay;
            frame
        })
        .collect();
    encode(width, height, Repeat::Infinite, frames)
}

/// A sequence of 1×1 frames whose red channel records the original index.
pub fn indexed_sequence(durations_ms: &[u64]) -> FrameSequence {
    durations_ms
        .iter()
        .enumerate()
        .map(|(i, &ms)| {
            let image = RgbaImage::from_pixel(1, 1, image::Rgba([i as u8, 0, 0, 255]));
            Frame::new(image, Duration::from_millis(ms))
        })
        .collect()
}

/// Original index encoded by [`indexed_sequence`].
pub fn index_of(frame: &Frame) -> u8 {
    frame.image.get_pixel(0, 0).0[0]
}
