// SPDX-License-Identifier: MPL-2.0

//! Byte sources supplying container data to views.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use tracing::debug;
use walkdir::WalkDir;

use crate::{animated::detection::is_gif_file, error::SourceError};

/// Something that can produce the bytes of a named container.
///
/// Called from worker threads; implementations may block.
pub trait ByteSource: Send + Sync {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError>;
}

fn non_empty(identifier: &str, bytes: Vec<u8>) -> Result<Vec<u8>, SourceError> {
    if bytes.is_empty() {
        debug!(identifier, "source returned no bytes");
        return Err(SourceError::NoData);
    }
    Ok(bytes)
}

/// Named assets held in memory.
#[derive(Debug, Default, Clone)]
pub struct BundledSource {
    assets: HashMap<String, Arc<[u8]>>,
}

impl BundledSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.assets.insert(name.into(), bytes.into());
    }
}

impl ByteSource for BundledSource {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let bytes = self
            .assets
            .get(identifier)
            .ok_or_else(|| SourceError::ResourceNotFound(identifier.to_owned()))?;
        non_empty(identifier, bytes.to_vec())
    }
}

/// GIF files below a directory.
///
/// An identifier is either a path relative to the root or the file stem of a
/// GIF anywhere below it. Stem matches resolve to the alphanumerically first
/// path.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All GIF files below the root, sorted by path.
    pub fn entries(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_gif_file(e.path()))
            .map(|e| e.into_path())
            .collect();
        entries.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
        entries
    }

    /// Resolve `identifier` to a file path.
    pub fn resolve(&self, identifier: &str) -> Option<PathBuf> {
        let relative = Path::new(identifier);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if contained && !identifier.is_empty() {
            let candidate = self.root.join(relative);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        self.entries().into_iter().find(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem == identifier)
        })
    }
}

impl ByteSource for AssetDir {
    fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
        let path = self
            .resolve(identifier)
            .ok_or_else(|| SourceError::ResourceNotFound(identifier.to_owned()))?;

        debug!(path = %path.display(), "reading asset");
        let bytes = std::fs::read(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        non_empty(identifier, bytes)
    }
}

#[cfg(feature = "http")]
pub use http::HttpSource;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use ureq::Agent;

    use super::{ByteSource, non_empty};
    use crate::{animated::detection::is_remote, error::SourceError};

    /// Largest body accepted from a server.
    const MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

    /// Fetches containers over HTTP(S).
    #[derive(Clone)]
    pub struct HttpSource {
        agent: Agent,
    }

    impl Default for HttpSource {
        fn default() -> Self {
            Self::new(Duration::from_secs(30))
        }
    }

    impl HttpSource {
        pub fn new(timeout: Duration) -> Self {
            let config = Agent::config_builder()
                .timeout_global(Some(timeout))
                .build();
            Self {
                agent: Agent::new_with_config(config),
            }
        }
    }

    impl ByteSource for HttpSource {
        fn fetch(&self, identifier: &str) -> Result<Vec<u8>, SourceError> {
            if !is_remote(identifier) {
                return Err(SourceError::InvalidUrl(identifier.to_owned()));
            }

            tracing::info!(url = identifier, "fetching");
            let mut response = self.agent.get(identifier).call().map_err(|err| match err {
                ureq::Error::StatusCode(status) => SourceError::InvalidResponse(status),
                ureq::Error::BadUri(_) | ureq::Error::Http(_) => {
                    SourceError::InvalidUrl(identifier.to_owned())
                }
                other => SourceError::RequestFailed(other.to_string()),
            })?;

            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_SIZE)
                .read_to_vec()
                .map_err(|err| SourceError::RequestFailed(err.to_string()))?;
            non_empty(identifier, bytes)
        }
    }
}
