// SPDX-License-Identifier: MPL-2.0

//! Frame-count reduction.
//!
//! A sequence is stride-sampled and every kept frame absorbs the time of the
//! frames dropped after it, so total playback time stays roughly constant.

use gifloop_config::ReduceLevel;

use super::types::FrameSequence;

/// Down-sample `sequence` by the factor of `level`.
///
/// Output frame `i` is input frame `i * f` displayed `f` times as long. The
/// output holds `max(len / f, 1)` frames, so a non-empty input never yields an
/// empty output.
#[must_use]
pub fn reduce(sequence: &FrameSequence, level: ReduceLevel) -> FrameSequence {
    let factor = level.factor();
    if factor <= 1 || sequence.is_empty() {
        return sequence.clone();
    }

    let count = (sequence.len() / factor).max(1);
    let scale = factor as u32;

    let reduced: FrameSequence = (0..count)
        .map(|i| {
            let frame = &sequence[i * factor];
            frame.with_duration(frame.duration * scale)
        })
        .collect();

    tracing::debug!(
        from = sequence.len(),
        to = reduced.len(),
        ?level,
        "Reduced frame sequence"
    );

    reduced
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::animated::{
        decoder::decode,
        fixtures::{self, index_of, indexed_sequence},
    };

    #[test]
    fn keep_returns_the_same_sequence() {
        let sequence = indexed_sequence(&[10, 20, 30]);
        let kept = reduce(&sequence, ReduceLevel::Keep);
        assert!(kept.ptr_eq(&sequence));
    }

    #[test]
    fn lengths_follow_floor_rule() {
        for n in 1..=10 {
            let sequence = indexed_sequence(&vec![100; n]);
            assert_eq!(reduce(&sequence, ReduceLevel::Half).len(), (n / 2).max(1));
            assert_eq!(reduce(&sequence, ReduceLevel::Third).len(), (n / 3).max(1));
        }
    }

    #[test]
    fn sampled_frames_absorb_dropped_time() {
        let sequence = indexed_sequence(&[10, 20, 30, 40, 50, 60, 70]);
        let reduced = reduce(&sequence, ReduceLevel::Third);

        let picks: Vec<_> = reduced.iter().map(index_of).collect();
        assert_eq!(picks, [0, 3]);
        assert_eq!(reduced[0].duration, Duration::from_millis(30));
        assert_eq!(reduced[1].duration, Duration::from_millis(120));
    }

    #[test]
    fn short_input_keeps_first_frame() {
        let sequence = indexed_sequence(&[40, 90]);
        let reduced = reduce(&sequence, ReduceLevel::Third);

        assert_eq!(reduced.len(), 1);
        assert_eq!(index_of(&reduced[0]), 0);
        assert_eq!(reduced[0].duration, Duration::from_millis(120));
    }

    #[test]
    fn uniform_sequences_keep_total_duration() {
        let sequence = indexed_sequence(&[100; 6]);
        let reduced = reduce(&sequence, ReduceLevel::Half);
        assert_eq!(reduced.total_duration(), sequence.total_duration());
    }

    #[test]
    fn empty_input_stays_empty() {
        let reduced = reduce(&FrameSequence::default(), ReduceLevel::Half);
        assert!(reduced.is_empty());
    }

    #[test]
    fn decoded_five_frames_halved() {
        let bytes = fixtures::gif_bytes(2, 2, &[10; 5]);
        let frames = decode(&bytes, None).unwrap();
        let reduced = reduce(&frames, ReduceLevel::Half);

        assert_eq!(reduced.len(), 2);
        assert!(std::sync::Arc::ptr_eq(&reduced[0].image, &frames[0].image));
        assert!(std::sync::Arc::ptr_eq(&reduced[1].image, &frames[2].image));
        for frame in reduced.iter() {
            assert_eq!(frame.duration, Duration::from_millis(200));
        }
    }
}
