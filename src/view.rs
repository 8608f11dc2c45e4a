// SPDX-License-Identifier: MPL-2.0

//! High-level animated view.
//!
//! [`AnimatedView`] ties the pipeline together: a load request is answered from
//! the [`FrameCache`] when possible, otherwise bytes are fetched, decoded,
//! reduced and cached on the rayon pool. The result comes back to the event
//! loop thread over a calloop channel, where playback starts.
//!
//! Every load is tagged with a generation number. A completion belonging to a
//! load that has since been superseded or cleared is dropped.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use calloop::{LoopHandle, RegistrationToken, channel};
use derive_setters::Setters;
use gifloop_config::{Config, DeliveryMode, FilterMethod, ReduceLevel, TargetSize};
use tracing::{debug, error, info};

use crate::{
    animated::{
        AnimatedImage, DecodeOptions, Frame, FrameSequence, FrameSink, PlaybackDriver,
        PlaybackState, PlaybackStatus, decode_animation, reduce,
    },
    cache::FrameCache,
    error::{DecodeError, Error},
    source::ByteSource,
    ticker::TickSource,
};

/// Parameters of one load.
#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[must_use]
pub struct LoadRequest {
    /// Name passed to the byte source.
    pub identifier: String,
    /// Cache key; defaults to the identifier.
    #[setters(strip_option)]
    pub cache_key: Option<String>,
    pub use_cache: bool,
    #[setters(strip_option)]
    pub target_size: Option<TargetSize>,
    /// Loops before playback pauses; 0 loops forever.
    pub loop_count: u32,
    pub reduce_level: ReduceLevel,
    pub mode: DeliveryMode,
    pub filter_method: FilterMethod,
}

impl LoadRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            cache_key: None,
            use_cache: true,
            target_size: None,
            loop_count: 0,
            reduce_level: ReduceLevel::Keep,
            mode: DeliveryMode::Frames,
            filter_method: FilterMethod::default(),
        }
    }

    /// A request using the playback defaults of `config`.
    pub fn from_config(identifier: impl Into<String>, config: &Config) -> Self {
        Self {
            identifier: identifier.into(),
            cache_key: None,
            use_cache: config.use_cache,
            target_size: config.target_size,
            loop_count: config.loop_count,
            reduce_level: config.reduce_level,
            mode: config.delivery_mode,
            filter_method: config.filter_method,
        }
    }

    /// Key the result is cached under.
    pub fn key(&self) -> &str {
        self.cache_key.as_deref().unwrap_or(&self.identifier)
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    pub key: String,
    pub frame_count: usize,
    pub mode: DeliveryMode,
    /// The result came from the cache without touching the byte source.
    pub from_cache: bool,
}

enum Payload {
    Frames(FrameSequence),
    Composite(Arc<AnimatedImage>),
}

type Completion = (u64, Result<Payload, Error>);
type ReadyCallback = Box<dyn FnOnce(Result<Ready, Error>)>;

struct Ticket {
    generation: u64,
    key: String,
    loop_count: u32,
    mode: DeliveryMode,
}

struct Pending {
    ticket: Ticket,
    on_ready: ReadyCallback,
}

struct CompositePlayback {
    animation: Arc<AnimatedImage>,
    playing: bool,
}

struct ViewInner<T: TickSource> {
    driver: PlaybackDriver<T>,
    generation: u64,
    pending: Option<Pending>,
    composite: Option<CompositePlayback>,
}

impl<T: TickSource> ViewInner<T> {
    fn apply(
        &mut self,
        payload: Payload,
        ticket: &Ticket,
        from_cache: bool,
    ) -> Result<Ready, Error> {
        self.composite = None;

        let (frame_count, bytes) = match payload {
            Payload::Frames(frames) => {
                let counts = (frames.len(), frames.byte_size());
                self.driver.load(frames, ticket.loop_count);
                self.driver.start()?;
                counts
            }
            Payload::Composite(animation) => {
                self.driver.clear();
                let counts = (animation.frame_count(), animation.byte_size());
                self.driver.with_sink(|sink| sink.present_animation(&animation));
                self.composite = Some(CompositePlayback {
                    animation,
                    playing: true,
                });
                counts
            }
        };

        info!(
            key = %ticket.key,
            frames = frame_count,
            bytes,
            mode = ?ticket.mode,
            from_cache,
            "animation ready"
        );
        Ok(Ready {
            key: ticket.key.clone(),
            frame_count,
            mode: ticket.mode,
            from_cache,
        })
    }
}

fn complete<T: TickSource>(
    inner: &RefCell<ViewInner<T>>,
    generation: u64,
    result: Result<Payload, Error>,
) {
    let (on_ready, outcome) = {
        let mut inner = inner.borrow_mut();
        let Some(pending) = inner.pending.take_if(|p| p.ticket.generation == generation) else {
            debug!(generation, "dropping stale load completion");
            return;
        };

        let outcome = match result {
            Ok(payload) => inner.apply(payload, &pending.ticket, false),
            Err(err) => {
                error!(key = %pending.ticket.key, "load failed: {err}");
                Err(err)
            }
        };
        (pending.on_ready, outcome)
    };

    on_ready(outcome);
}

/// Fetch, decode, reduce and cache on a worker thread.
fn run_pipeline(
    source: &dyn ByteSource,
    request: &LoadRequest,
    cache: &FrameCache,
) -> Result<Payload, Error> {
    let span = tracing::debug_span!("load", key = request.key());
    let _handle = span.enter();

    let bytes = source.fetch(&request.identifier)?;
    let options = DecodeOptions {
        target_size: request.target_size,
        filter: request.filter_method,
        ..DecodeOptions::default()
    };
    let animation = decode_animation(&bytes, &options)?;
    let frames = reduce(&animation.frames, request.reduce_level);

    match request.mode {
        DeliveryMode::Frames => {
            if request.use_cache {
                cache.frames().put(request.key(), frames.clone());
            }
            Ok(Payload::Frames(frames))
        }
        DeliveryMode::Composited => {
            let composite = AnimatedImage::compose(&frames).ok_or(DecodeError::NoFrames)?;
            let composite = Arc::new(composite);
            if request.use_cache {
                cache.composites().put(request.key(), Arc::clone(&composite));
            }
            Ok(Payload::Composite(composite))
        }
    }
}

/// An animated image bound to a calloop event loop.
///
/// Not `Send`: all control calls happen on the event loop thread.
pub struct AnimatedView<D: 'static, T: TickSource + 'static> {
    inner: Rc<RefCell<ViewInner<T>>>,
    cache: Arc<FrameCache>,
    sender: channel::Sender<Completion>,
    handle: LoopHandle<'static, D>,
    token: RegistrationToken,
}

impl<D: 'static, T: TickSource + 'static> AnimatedView<D, T> {
    pub fn new(
        handle: LoopHandle<'static, D>,
        ticker: T,
        cache: Arc<FrameCache>,
    ) -> Result<Self, Error> {
        let inner = Rc::new(RefCell::new(ViewInner {
            driver: PlaybackDriver::new(ticker),
            generation: 0,
            pending: None,
            composite: None,
        }));

        let (sender, receiver) = channel::channel::<Completion>();
        let weak = Rc::downgrade(&inner);
        let token = handle
            .insert_source(receiver, move |event, _, _: &mut D| {
                if let channel::Event::Msg((generation, result)) = event {
                    if let Some(inner) = weak.upgrade() {
                        complete(&inner, generation, result);
                    }
                }
            })
            .map_err(|err| Error::EventLoop(err.to_string()))?;

        Ok(Self {
            inner,
            cache,
            sender,
            handle,
            token,
        })
    }

    /// Register the sink receiving frames, replacing any previous one.
    pub fn set_sink(&mut self, sink: impl FrameSink + 'static) {
        self.inner.borrow_mut().driver.set_sink(Box::new(sink));
    }

    pub fn set_tick_rate(&mut self, hz: u32) {
        self.inner.borrow_mut().driver.set_tick_rate(hz);
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    /// Load `request` and start playback once it is ready.
    ///
    /// A cache hit never touches `source` and calls `on_ready` before this
    /// returns. Otherwise the pipeline runs on the rayon pool and `on_ready` is
    /// called from the event loop. A load superseded by another `setup` or by
    /// [`Self::clear`] never calls its `on_ready`.
    pub fn setup(
        &mut self,
        source: Arc<dyn ByteSource>,
        request: LoadRequest,
        on_ready: impl FnOnce(Result<Ready, Error>) + 'static,
    ) {
        let ticket = {
            let mut inner = self.inner.borrow_mut();
            inner.generation += 1;
            inner.pending = None;
            inner.driver.stop();
            Ticket {
                generation: inner.generation,
                key: request.key().to_owned(),
                loop_count: request.loop_count,
                mode: request.mode,
            }
        };

        if request.use_cache {
            if let Some(payload) = self.cached(&request) {
                let outcome = self
                    .inner
                    .borrow_mut()
                    .apply(payload, &ticket, true);
                on_ready(outcome);
                return;
            }
        }

        info!(key = %ticket.key, identifier = %request.identifier, "loading animation");
        let generation = ticket.generation;
        self.inner.borrow_mut().pending = Some(Pending {
            ticket,
            on_ready: Box::new(on_ready),
        });

        let sender = self.sender.clone();
        let cache = Arc::clone(&self.cache);
        rayon::spawn(move || {
            let result = run_pipeline(source.as_ref(), &request, &cache);
            if sender.send((generation, result)).is_err() {
                debug!(generation, "view dropped before load finished");
            }
        });
    }

    fn cached(&self, request: &LoadRequest) -> Option<Payload> {
        let key = request.key();
        match request.mode {
            DeliveryMode::Frames => self.cache.frames().get(key).ok().map(Payload::Frames),
            DeliveryMode::Composited => self
                .cache
                .composites()
                .get(key)
                .ok()
                .map(Payload::Composite),
        }
    }

    /// Resume playback without reloading.
    pub fn start(&mut self) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        match inner.composite.as_mut() {
            Some(composite) => composite.playing = true,
            None => inner.driver.start()?,
        }
        Ok(())
    }

    /// Pause playback, keeping the current frame.
    pub fn stop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        match inner.composite.as_mut() {
            Some(composite) => composite.playing = false,
            None => inner.driver.stop(),
        }
    }

    /// Drop any pending load and playback state.
    ///
    /// Ticks are detached before `on_complete` runs.
    pub fn clear(&mut self, on_complete: impl FnOnce()) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.generation += 1;
            inner.pending = None;
            inner.composite = None;
            inner.driver.clear();
        }
        on_complete();
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        let inner = self.inner.borrow();
        match &inner.composite {
            Some(composite) if composite.playing => PlaybackStatus::Playing,
            Some(_) => PlaybackStatus::Paused,
            None => inner.driver.status(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.inner.borrow().driver.state()
    }

    /// Frame currently shown by tick-driven playback.
    #[must_use]
    pub fn current_frame(&self) -> Frame {
        self.inner.borrow().driver.current_frame()
    }

    /// The composited animation, when one is loaded.
    #[must_use]
    pub fn animation(&self) -> Option<Arc<AnimatedImage>> {
        self.inner
            .borrow()
            .composite
            .as_ref()
            .map(|c| Arc::clone(&c.animation))
    }

    /// Whether a load is still running in the background.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }
}

impl<D: 'static, T: TickSource + 'static> Drop for AnimatedView<D, T> {
    fn drop(&mut self) {
        self.handle.remove(self.token);
    }
}
