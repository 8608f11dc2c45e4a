// SPDX-License-Identifier: MPL-2.0

//! Periodic tick sources driving playback.
//!
//! The playback driver only depends on [`TickSource`]. [`LoopTicker`] runs on a
//! calloop event loop; [`ManualTicker`] is advanced explicitly by its owner,
//! which is how hosts with their own frame clock (and tests) feed time in.

use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::Rc,
    time::{Duration, Instant},
};

use calloop::{
    LoopHandle, RegistrationToken,
    timer::{TimeoutAction, Timer},
};

use crate::error::TickError;

/// Default tick rate, matching a 60 Hz display.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// What a tick callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Continue,
    /// End this subscription; the callback is not invoked again.
    Cancel,
}

/// Callback invoked with the time elapsed since the previous tick.
pub type TickCallback = Box<dyn FnMut(Duration) -> TickAction>;

/// Handle identifying one subscription to a tick source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// A cancellable source of periodic ticks.
pub trait TickSource {
    /// Start delivering ticks to `callback`.
    fn subscribe(&mut self, callback: TickCallback) -> Result<Subscription, TickError>;

    /// Change the tick rate of current and future subscriptions.
    fn set_rate(&mut self, hz: u32);

    /// Stop delivering ticks to `subscription`.
    ///
    /// Cancelling an ended subscription is a no-op.
    fn cancel(&mut self, subscription: Subscription);
}

fn interval_for(hz: u32) -> Duration {
    Duration::from_secs(1) / hz.max(1)
}

struct LoopSubscription {
    token: RegistrationToken,
    alive: Rc<Cell<bool>>,
}

/// Tick source backed by calloop timers.
///
/// Each subscription is a [`Timer`] that re-arms itself at the current rate.
pub struct LoopTicker<D: 'static> {
    handle: LoopHandle<'static, D>,
    interval: Rc<Cell<Duration>>,
    next_id: u64,
    subscriptions: Vec<(Subscription, LoopSubscription)>,
}

impl<D: 'static> LoopTicker<D> {
    pub fn new(handle: LoopHandle<'static, D>) -> Self {
        Self {
            handle,
            interval: Rc::new(Cell::new(interval_for(DEFAULT_TICK_RATE))),
            next_id: 0,
            subscriptions: Vec::new(),
        }
    }
}

impl<D: 'static> TickSource for LoopTicker<D> {
    fn subscribe(&mut self, mut callback: TickCallback) -> Result<Subscription, TickError> {
        // forget subscriptions whose callbacks already cancelled themselves
        self.subscriptions.retain(|(_, sub)| sub.alive.get());

        let interval = Rc::clone(&self.interval);
        let alive = Rc::new(Cell::new(true));
        let alive_in_timer = Rc::clone(&alive);
        let mut last = Instant::now();

        let token = self
            .handle
            .insert_source(
                Timer::from_duration(interval.get()),
                move |_deadline, _, _: &mut D| {
                    let span = tracing::trace_span!("LoopTicker::tick");
                    let _handle = span.enter();

                    let now = Instant::now();
                    let delta = now.duration_since(last);
                    last = now;

                    match callback(delta) {
                        TickAction::Continue => TimeoutAction::ToDuration(interval.get()),
                        TickAction::Cancel => {
                            alive_in_timer.set(false);
                            TimeoutAction::Drop
                        }
                    }
                },
            )
            .map_err(|err| TickError(err.to_string()))?;

        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.subscriptions
            .push((subscription, LoopSubscription { token, alive }));

        tracing::debug!(?subscription, interval = ?self.interval.get(), "tick subscription added");
        Ok(subscription)
    }

    fn set_rate(&mut self, hz: u32) {
        self.interval.set(interval_for(hz));
    }

    fn cancel(&mut self, subscription: Subscription) {
        let Some(pos) = self
            .subscriptions
            .iter()
            .position(|(id, _)| *id == subscription)
        else {
            return;
        };

        let (_, sub) = self.subscriptions.swap_remove(pos);
        if sub.alive.replace(false) {
            self.handle.remove(sub.token);
            tracing::debug!(?subscription, "tick subscription cancelled");
        }
    }
}

impl<D: 'static> Drop for LoopTicker<D> {
    fn drop(&mut self) {
        for (_, sub) in self.subscriptions.drain(..) {
            if sub.alive.get() {
                self.handle.remove(sub.token);
            }
        }
    }
}

#[derive(Default)]
struct ManualState {
    next_id: u64,
    rate: u32,
    subscriptions: Vec<(Subscription, TickCallback)>,
    /// Cancellations issued while callbacks were being dispatched.
    cancelled: HashSet<Subscription>,
}

/// Tick source advanced explicitly by its owner.
///
/// Clones share the same subscriptions, so one handle can be given to a driver
/// while another is used to push time forward.
#[derive(Clone)]
pub struct ManualTicker {
    state: Rc<RefCell<ManualState>>,
}

impl Default for ManualTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTicker {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualState {
                rate: DEFAULT_TICK_RATE,
                ..ManualState::default()
            })),
        }
    }

    /// Deliver one tick of `delta` to every subscriber.
    pub fn advance(&self, delta: Duration) {
        // callbacks run without the state borrowed so they may cancel or subscribe
        let mut active = std::mem::take(&mut self.state.borrow_mut().subscriptions);
        active.retain_mut(|(id, callback)| {
            if self.state.borrow().cancelled.contains(&*id) {
                return false;
            }
            callback(delta) == TickAction::Continue
        });

        let mut state = self.state.borrow_mut();
        let cancelled = std::mem::take(&mut state.cancelled);
        active.retain(|(id, _)| !cancelled.contains(id));
        active.append(&mut state.subscriptions);
        state.subscriptions = active;
    }

    /// Deliver ticks of one interval at the current rate until `total` has elapsed.
    ///
    /// Returns the number of ticks delivered.
    pub fn run_for(&self, total: Duration) -> usize {
        let step = interval_for(self.rate());
        let mut elapsed = Duration::ZERO;
        let mut ticks = 0;
        while elapsed < total {
            self.advance(step);
            elapsed += step;
            ticks += 1;
        }
        ticks
    }

    pub fn rate(&self) -> u32 {
        self.state.borrow().rate
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }
}

impl TickSource for ManualTicker {
    fn subscribe(&mut self, callback: TickCallback) -> Result<Subscription, TickError> {
        let mut state = self.state.borrow_mut();
        let subscription = Subscription(state.next_id);
        state.next_id += 1;
        state.subscriptions.push((subscription, callback));
        Ok(subscription)
    }

    fn set_rate(&mut self, hz: u32) {
        self.state.borrow_mut().rate = hz.max(1);
    }

    fn cancel(&mut self, subscription: Subscription) {
        let mut state = self.state.borrow_mut();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|(id, _)| *id != subscription);
        if state.subscriptions.len() == before {
            state.cancelled.insert(subscription);
        }
    }
}
