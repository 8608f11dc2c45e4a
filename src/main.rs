// SPDX-License-Identifier: MPL-2.0

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
    sync::Arc,
    time::{Duration, Instant},
};

use calloop::{
    EventLoop,
    signals::{Signal, Signals},
};
use clap::Parser;
use eyre::{WrapErr, bail};
use gifloop::{
    AnimatedView, Error, FrameCache, LoadRequest, Ready,
    animated::{
        AnimatedImage, Frame, FrameSink, PlaybackStatus,
        detection::{is_gif_file, is_remote},
    },
    config::{Config, DeliveryMode, ReduceLevel, TargetSize},
    source::{AssetDir, ByteSource},
    ticker::{LoopTicker, TickSource},
};
use tracing_subscriber::EnvFilter;

/// Play an animated GIF on an event loop, logging every presented frame.
#[derive(Debug, Parser)]
#[command(name = "gifloop", version)]
struct Args {
    /// GIF file, directory of GIFs, or http(s) URL
    source: String,
    /// Loops before playback stops; 0 loops forever
    #[arg(long)]
    loops: Option<u32>,
    /// Frame reduction: keep, half or third
    #[arg(long)]
    reduce: Option<ReduceLevel>,
    /// Bounding box frames are shrunk into, e.g. 320x240
    #[arg(long)]
    size: Option<TargetSize>,
    /// Bypass the frame cache
    #[arg(long)]
    no_cache: bool,
    /// Deliver one composited animation instead of timed frames
    #[arg(long)]
    composite: bool,
    /// Tick rate in hertz
    #[arg(long)]
    rate: Option<u32>,
    /// Configuration file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(loops) = self.loops {
            config.loop_count = loops;
        }
        if let Some(reduce) = self.reduce {
            config.reduce_level = reduce;
        }
        if let Some(size) = self.size {
            config.target_size = Some(size);
        }
        if self.no_cache {
            config.use_cache = false;
        }
        if self.composite {
            config.delivery_mode = DeliveryMode::Composited;
        }
        if let Some(rate) = self.rate {
            config.tick_rate = rate;
        }
        config
    }
}

#[derive(Default)]
struct State {
    quit: bool,
}

/// Sink that logs frames instead of drawing them.
#[derive(Default)]
struct LogSink {
    presented: u64,
}

impl FrameSink for LogSink {
    fn present(&mut self, frame: &Frame) {
        self.presented += 1;
        tracing::info!(
            frame = self.presented,
            width = frame.width(),
            height = frame.height(),
            duration = ?frame.duration,
            "present"
        );
    }

    fn present_animation(&mut self, animation: &Arc<AnimatedImage>) {
        tracing::info!(
            frames = animation.frame_count(),
            interval = ?animation.frame_interval(),
            duration = ?animation.duration(),
            "present composited animation"
        );
    }

    fn frame_missing(&mut self, index: usize) {
        tracing::warn!(index, "frame missing");
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Config file error, falling back to defaults: {err}");
            Config::default()
        }
    };
    let config = args.apply(config);
    tracing::debug!(?config, "effective configuration");

    let (source, identifier) = resolve_source(&args.source)?;

    let mut event_loop: EventLoop<'static, State> =
        EventLoop::try_new().wrap_err("failed to create event loop")?;

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])?;
    event_loop
        .handle()
        .insert_source(signals, |event, _, state: &mut State| {
            tracing::info!(signal = ?event.signal(), "shutting down");
            state.quit = true;
        })
        .map_err(|err| eyre::eyre!("{}", err))?;

    let cache = Arc::new(FrameCache::with_capacities(
        config.frame_cache_capacity,
        config.composite_cache_capacity,
    ));
    let mut ticker = LoopTicker::new(event_loop.handle());
    ticker.set_rate(config.tick_rate);

    let mut view = AnimatedView::new(event_loop.handle(), ticker, cache)?;
    view.set_sink(LogSink::default());

    let outcome: Rc<RefCell<Option<Result<Ready, Error>>>> = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&outcome);
    view.setup(
        source,
        LoadRequest::from_config(identifier, &config),
        move |result| *slot.borrow_mut() = Some(result),
    );

    let mut state = State::default();
    let mut composite_deadline = None;
    loop {
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut state)
            .wrap_err("event loop dispatch failed")?;

        if state.quit {
            break;
        }

        match outcome.borrow_mut().take() {
            Some(Err(err)) => return Err(err).wrap_err("failed to load animation"),
            Some(Ok(ready)) => {
                tracing::info!(frames = ready.frame_count, from_cache = ready.from_cache, "playing");
                if let Some(animation) = view.animation() {
                    if config.loop_count != 0 {
                        composite_deadline =
                            Some(Instant::now() + animation.duration() * config.loop_count);
                    }
                }
            }
            None => {}
        }

        if composite_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if view.animation().is_none() && view.status() == PlaybackStatus::Paused {
            let loops = view.state().completed_loops;
            tracing::info!(loops, "playback finished");
            break;
        }
    }

    let cache = view.cache();
    for (name, stats) in [
        ("frames", cache.frames().stats()),
        ("composites", cache.composites().stats()),
    ] {
        tracing::debug!(
            cache = name,
            hits = stats.hits(),
            misses = stats.misses(),
            hit_rate = stats.hit_rate(),
            "cache statistics"
        );
    }

    view.clear(|| tracing::debug!("view cleared"));
    Ok(())
}

/// Pick the byte source and identifier for a command line source argument.
fn resolve_source(source: &str) -> eyre::Result<(Arc<dyn ByteSource>, String)> {
    if is_remote(source) {
        #[cfg(feature = "http")]
        return Ok((
            Arc::new(gifloop::source::HttpSource::default()),
            source.to_owned(),
        ));
        #[cfg(not(feature = "http"))]
        bail!("{source} is a URL, but gifloop was built without the `http` feature");
    }

    let path = Path::new(source);
    if path.is_dir() {
        let assets = AssetDir::new(path);
        let Some(first) = assets.entries().into_iter().next() else {
            bail!("no GIF files found in {}", path.display());
        };
        let identifier = first
            .strip_prefix(path)
            .unwrap_or(&first)
            .to_string_lossy()
            .into_owned();
        return Ok((Arc::new(assets), identifier));
    }

    if path.is_file() {
        if !is_gif_file(path) {
            tracing::warn!(path = %path.display(), "file does not have a .gif extension");
        }
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let Some(name) = path.file_name() else {
            bail!("invalid path {}", path.display());
        };
        return Ok((
            Arc::new(AssetDir::new(parent)),
            name.to_string_lossy().into_owned(),
        ));
    }

    bail!("{} does not exist", path.display())
}
