// SPDX-License-Identifier: MPL-2.0

//! Tick-driven playback of a [`FrameSequence`].
//!
//! [`PlaybackDriver`] owns the playback state of one view. Every tick from its
//! [`TickSource`] advances an accumulator by the elapsed time; once the current
//! frame's duration has been covered the frame is handed to the registered
//! [`FrameSink`] and playback moves on. Loop counting and loop-limit pausing
//! happen on the same path.

use std::{cell::RefCell, rc::Rc, sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use super::{
    composite::AnimatedImage,
    types::{Frame, FrameSequence, MAX_FRAME_DURATION},
};
use crate::{
    error::TickError,
    ticker::{Subscription, TickAction, TickSource},
};

/// Receiver of frames produced by playback.
///
/// Called on the control thread at tick cadence; implementations should only
/// hand the bitmap over to the display surface.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame);

    /// Receive a composited looping animation in one go.
    fn present_animation(&mut self, animation: &Arc<AnimatedImage>) {
        debug!(?animation, "sink ignores composited animation");
    }

    /// A frame lookup failed and the blank fallback frame was presented.
    fn frame_missing(&mut self, index: usize) {
        let _ = index;
    }
}

impl<F: FnMut(&Frame)> FrameSink for F {
    fn present(&mut self, frame: &Frame) {
        self(frame);
    }
}

/// Lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loaded,
    Playing,
    Paused,
    Cleared,
}

/// Position of playback within the loaded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub current_frame_index: usize,
    pub elapsed_within_frame: Duration,
    pub completed_loops: u32,
    pub is_paused: bool,
}

enum Emission {
    Frame(Frame),
    Missing(usize),
}

#[derive(Default)]
struct DriverCore {
    status: PlaybackStatus,
    sequence: FrameSequence,
    loop_count: u32,
    state: PlaybackState,
    /// Incremented on every load and clear; ticks from older sessions are ignored.
    session: u64,
    subscription: Option<Subscription>,
    /// The loop limit was reached; the next start replays from the beginning.
    finished: bool,
    warned_missing: bool,
    sink: Option<Box<dyn FrameSink>>,
}

impl DriverCore {
    fn lookup(&self, index: usize) -> Option<&Frame> {
        self.sequence.get(index)
    }

    /// Advance playback by one tick.
    ///
    /// Returns the frame to present, if any, and whether ticking should go on.
    fn tick(&mut self, delta: Duration) -> (Option<Emission>, TickAction) {
        let len = self.sequence.len();

        if self.state.current_frame_index >= len {
            self.state.current_frame_index = 0;
            self.state.completed_loops += 1;
            debug!(completed_loops = self.state.completed_loops, "loop completed");
        }

        self.state.elapsed_within_frame += delta.min(MAX_FRAME_DURATION);

        let index = self.state.current_frame_index;
        let (frame, duration) = match self.lookup(index) {
            Some(frame) => (Some(frame.clone()), frame.duration),
            None => (None, Duration::ZERO),
        };

        let mut emission = None;
        if self.state.elapsed_within_frame >= duration {
            emission = Some(match frame {
                Some(frame) => Emission::Frame(frame),
                None => {
                    if !self.warned_missing {
                        warn!(index, len, "frame lookup failed, presenting empty frame");
                        self.warned_missing = true;
                    }
                    Emission::Missing(index)
                }
            });
            self.state.elapsed_within_frame -= duration;
            self.state.current_frame_index += 1;
        }

        if self.loop_count != 0 && self.state.completed_loops >= self.loop_count {
            info!(
                loops = self.state.completed_loops,
                "loop limit reached, pausing playback"
            );
            self.state.current_frame_index = 0;
            self.state.is_paused = true;
            self.status = PlaybackStatus::Paused;
            self.subscription = None;
            self.finished = true;
            return (emission, TickAction::Cancel);
        }

        (emission, TickAction::Continue)
    }
}

fn deliver(core: &Rc<RefCell<DriverCore>>, emission: Emission) {
    // the sink runs unborrowed so it may call back into the driver
    let Some(mut sink) = core.borrow_mut().sink.take() else {
        return;
    };

    match emission {
        Emission::Frame(frame) => sink.present(&frame),
        Emission::Missing(index) => {
            sink.present(&Frame::empty());
            sink.frame_missing(index);
        }
    }

    let mut core = core.borrow_mut();
    if core.sink.is_none() {
        core.sink = Some(sink);
    }
}

/// Stateful loop controller for one view.
pub struct PlaybackDriver<T: TickSource> {
    core: Rc<RefCell<DriverCore>>,
    ticker: T,
}

impl<T: TickSource> PlaybackDriver<T> {
    pub fn new(ticker: T) -> Self {
        Self {
            core: Rc::new(RefCell::new(DriverCore::default())),
            ticker,
        }
    }

    /// Register the sink receiving frames, replacing any previous one.
    pub fn set_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.core.borrow_mut().sink = Some(sink);
    }

    /// Run `f` with the registered sink, if there is one.
    pub fn with_sink<R>(&mut self, f: impl FnOnce(&mut dyn FrameSink) -> R) -> Option<R> {
        let mut sink = self.core.borrow_mut().sink.take()?;
        let result = f(sink.as_mut());

        let mut core = self.core.borrow_mut();
        if core.sink.is_none() {
            core.sink = Some(sink);
        }
        Some(result)
    }

    pub fn set_tick_rate(&mut self, hz: u32) {
        self.ticker.set_rate(hz);
    }

    /// Load `sequence` for playback; a `loop_count` of 0 loops forever.
    ///
    /// Any running playback is stopped and the state is reset.
    pub fn load(&mut self, sequence: FrameSequence, loop_count: u32) {
        self.cancel_ticks();

        let mut core = self.core.borrow_mut();
        debug!(
            frames = sequence.len(),
            loop_count,
            previous = ?core.status,
            "loading sequence"
        );
        core.session += 1;
        core.sequence = sequence;
        core.loop_count = loop_count;
        core.state = PlaybackState::default();
        core.finished = false;
        core.warned_missing = false;
        core.status = PlaybackStatus::Loaded;
    }

    /// Begin or resume ticking.
    ///
    /// Does nothing when already playing or when nothing is loaded.
    pub fn start(&mut self) -> Result<(), TickError> {
        let session = {
            let mut core = self.core.borrow_mut();
            match core.status {
                PlaybackStatus::Loaded | PlaybackStatus::Paused => {}
                PlaybackStatus::Playing => return Ok(()),
                status @ (PlaybackStatus::Idle | PlaybackStatus::Cleared) => {
                    debug!(?status, "start ignored");
                    return Ok(());
                }
            }
            if core.finished {
                core.finished = false;
                core.state.completed_loops = 0;
                core.state.elapsed_within_frame = Duration::ZERO;
            }
            core.session
        };

        let weak = Rc::downgrade(&self.core);
        let subscription = self.ticker.subscribe(Box::new(move |delta| {
            let Some(core) = weak.upgrade() else {
                return TickAction::Cancel;
            };

            let (emission, action) = {
                let mut guard = core.borrow_mut();
                if guard.session != session || guard.status != PlaybackStatus::Playing {
                    return TickAction::Cancel;
                }
                guard.tick(delta)
            };

            if let Some(emission) = emission {
                deliver(&core, emission);
            }
            action
        }))?;

        let mut core = self.core.borrow_mut();
        core.subscription = Some(subscription);
        core.state.is_paused = false;
        core.status = PlaybackStatus::Playing;
        debug!(?subscription, "playback started");
        Ok(())
    }

    /// Stop ticking, keeping the current frame index.
    pub fn pause(&mut self) {
        if self.core.borrow().status != PlaybackStatus::Playing {
            return;
        }
        self.cancel_ticks();

        let mut core = self.core.borrow_mut();
        core.state.is_paused = true;
        core.status = PlaybackStatus::Paused;
        debug!(index = core.state.current_frame_index, "playback paused");
    }

    /// Alias of [`Self::pause`].
    pub fn stop(&mut self) {
        self.pause();
    }

    /// Release the sequence and detach from the tick source.
    ///
    /// No tick reaches the sink after this returns.
    pub fn clear(&mut self) {
        self.cancel_ticks();

        let mut core = self.core.borrow_mut();
        core.session += 1;
        core.sequence = FrameSequence::default();
        core.state = PlaybackState::default();
        core.finished = false;
        core.status = PlaybackStatus::Cleared;
        debug!("playback cleared");
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.core.borrow().status
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.core.borrow().state
    }

    /// Frame at the current index, or the empty frame when there is none.
    #[must_use]
    pub fn current_frame(&self) -> Frame {
        let core = self.core.borrow();
        core.lookup(core.state.current_frame_index)
            .cloned()
            .unwrap_or_else(Frame::empty)
    }

    fn cancel_ticks(&mut self) {
        let subscription = self.core.borrow_mut().subscription.take();
        if let Some(subscription) = subscription {
            self.ticker.cancel(subscription);
        }
    }
}

impl<T: TickSource> Drop for PlaybackDriver<T> {
    fn drop(&mut self) {
        self.cancel_ticks();
    }
}

impl<T: TickSource> std::fmt::Debug for PlaybackDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        f.debug_struct("PlaybackDriver")
            .field("status", &core.status)
            .field("frames", &core.sequence.len())
            .field("loop_count", &core.loop_count)
            .field("state", &core.state)
            .finish()
    }
}
