// SPDX-License-Identifier: MPL-2.0

//! Error types shared by the decode, cache, source and playback layers.

/// Failure to turn container bytes into a frame sequence.
///
/// Decoding is all-or-nothing: any of these aborts the whole load.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The bytes do not start with a GIF signature.
    #[error("data is not a GIF container")]
    NotGif,
    /// The container header or block structure could not be parsed.
    #[error("malformed GIF container: {0}")]
    Container(#[source] gif::DecodingError),
    /// The container parsed but holds no frames.
    #[error("GIF container holds no frames")]
    NoFrames,
    /// A single frame could not be extracted.
    #[error("failed to decode frame {index}: {source}")]
    Frame {
        index: usize,
        #[source]
        source: gif::DecodingError,
    },
    /// A frame bitmap could not be built from decoded pixel data.
    #[error("frame {index} has an invalid pixel buffer")]
    Bitmap { index: usize },
    /// The logical screen is larger than a canvas may be.
    #[error("GIF canvas {width}x{height} is too large")]
    TooLarge { width: u32, height: u32 },
    /// The decoded frames would exceed the memory limit.
    #[error("{frames} decoded frames exceed the {limit} byte limit")]
    MemoryLimit { frames: usize, limit: u64 },
    /// Downscaling a frame to the target size failed.
    #[error("failed to resize frame {index}: {reason}")]
    Resize { index: usize, reason: String },
}

/// The requested key is not resident in the cache.
///
/// A miss is expected; callers fall back to decoding from source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no cached entry for `{0}`")]
pub struct CacheMiss(pub String);

/// Failure of a byte source to supply container bytes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),
    #[error("source returned no data")]
    NoData,
    #[error("invalid response (status {0})")]
    InvalidResponse(u16),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("resource `{0}` not found")]
    ResourceNotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to attach to a tick source.
#[derive(Debug, thiserror::Error)]
#[error("failed to subscribe to tick source: {0}")]
pub struct TickError(pub String);

/// Any failure reported through a view's completion callback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    CacheMiss(#[from] CacheMiss),
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error("failed to register with the event loop: {0}")]
    EventLoop(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
