// SPDX-License-Identifier: MPL-2.0-only

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const NAME: &str = "gifloop";
pub const CONFIG_FILE: &str = "config.ron";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this system")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),
}

/// Frame-count reduction applied after decoding.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReduceLevel {
    /// keep every frame
    #[default]
    Keep,
    /// keep every other frame
    Half,
    /// keep every third frame
    Third,
}

impl ReduceLevel {
    /// Stride used to sample the frame sequence.
    #[must_use]
    pub fn factor(self) -> usize {
        match self {
            ReduceLevel::Keep => 1,
            ReduceLevel::Half => 2,
            ReduceLevel::Third => 3,
        }
    }
}

impl std::str::FromStr for ReduceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" | "1" | "1x" => Ok(ReduceLevel::Keep),
            "half" | "2" | "2x" => Ok(ReduceLevel::Half),
            "third" | "3" | "3x" => Ok(ReduceLevel::Third),
            other => Err(format!("unknown reduce level `{other}`")),
        }
    }
}

/// Image filtering method
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMethod {
    // nearest neighbor filtering
    Nearest,
    // linear filtering
    Linear,
    // lanczos filtering with window 3
    #[default]
    Lanczos,
}

#[cfg(feature = "scaler")]
impl From<FilterMethod> for fast_image_resize::ResizeAlg {
    fn from(method: FilterMethod) -> Self {
        use fast_image_resize::{FilterType, ResizeAlg};
        match method {
            FilterMethod::Nearest => ResizeAlg::Nearest,
            FilterMethod::Linear => ResizeAlg::Convolution(FilterType::Bilinear),
            FilterMethod::Lanczos => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// How decoded frames reach the display.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Individually timed frames, driven by the tick source.
    #[default]
    Frames,
    /// One composited looping image handed to the sink once.
    Composited,
}

/// Bounding box for decoded frames.
///
/// Frames are shrunk until their longest side fits `max(width, height)`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Longest side a decoded frame may have.
    #[must_use]
    pub fn max_pixel(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl std::str::FromStr for TargetSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
        let width = w.trim().parse().map_err(|e| format!("invalid width: {e}"))?;
        let height = h.trim().parse().map_err(|e| format!("invalid height: {e}"))?;
        Ok(Self { width, height })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct Config {
    /// number of loops before playback pauses, 0 loops forever
    pub loop_count: u32,
    /// frame-count reduction applied after decode
    pub reduce_level: ReduceLevel,
    /// optional bounding box decoded frames are shrunk into
    #[setters(strip_option)]
    pub target_size: Option<TargetSize>,
    /// whether decoded sequences are looked up and stored in the cache
    pub use_cache: bool,
    /// filter used to scale frames
    pub filter_method: FilterMethod,
    /// delivery mode for decoded frames
    pub delivery_mode: DeliveryMode,
    /// tick rate of the playback timer in hertz
    pub tick_rate: u32,
    /// number of frame sequences kept in memory
    pub frame_cache_capacity: usize,
    /// number of composited images kept in memory
    pub composite_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_count: 0,
            reduce_level: ReduceLevel::default(),
            target_size: None,
            use_cache: true,
            filter_method: FilterMethod::default(),
            delivery_mode: DeliveryMode::default(),
            tick_rate: 60,
            frame_cache_capacity: 3,
            composite_cache_capacity: 40,
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the platform has no configuration directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(NAME).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load the configuration from its default location.
    ///
    /// A missing file is not an error and yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load the configuration from a RON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    /// Parse a configuration from RON text.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a valid configuration.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize the configuration as pretty RON.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_ron()?).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cache_and_timer_expectations() {
        let config = Config::default();
        assert_eq!(config.loop_count, 0);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.frame_cache_capacity, 3);
        assert_eq!(config.composite_cache_capacity, 40);
        assert!(config.use_cache);
        assert_eq!(config.reduce_level, ReduceLevel::Keep);
    }

    #[test]
    fn ron_round_trip_preserves_settings() {
        let config = Config::default()
            .loop_count(2)
            .reduce_level(ReduceLevel::Third)
            .target_size(TargetSize::new(320, 200))
            .delivery_mode(DeliveryMode::Composited);

        let text = config.to_ron().unwrap();
        assert_eq!(Config::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config = Config::from_ron("(loop_count: 5, reduce_level: Half)").unwrap();
        assert_eq!(config.loop_count, 5);
        assert_eq!(config.reduce_level, ReduceLevel::Half);
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_ron("(rotation_frequency: 900)").is_err());
    }

    #[test]
    fn reduce_level_parsing() {
        assert_eq!("half".parse::<ReduceLevel>(), Ok(ReduceLevel::Half));
        assert_eq!("3x".parse::<ReduceLevel>(), Ok(ReduceLevel::Third));
        assert_eq!("Keep".parse::<ReduceLevel>(), Ok(ReduceLevel::Keep));
        assert!("quarter".parse::<ReduceLevel>().is_err());
        assert_eq!(ReduceLevel::Third.factor(), 3);
    }

    #[test]
    fn target_size_parsing() {
        let size: TargetSize = "640x480".parse().unwrap();
        assert_eq!(size, TargetSize::new(640, 480));
        assert_eq!(size.max_pixel(), 640);
        assert!("640".parse::<TargetSize>().is_err());
        assert!("axb".parse::<TargetSize>().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(NAME).join(CONFIG_FILE);
        let config = Config::default().use_cache(false).tick_rate(30);
        config.save(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
