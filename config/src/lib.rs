// SPDX-License-Identifier: MPL-2.0-only

mod mode;
mod rect;

pub use mode::DrawMode;
pub use rect::Rect;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const NAME: &str = "loopwall";
pub const CONFIG_FILE: &str = "config.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown draw mode `{0}`, expected monitor=<index>, area=<w>x<h>+<x>+<y>, stretch or each")]
    InvalidMode(String),
    #[error("malformed area `{0}`, expected <w>x<h>+<x>+<y>")]
    MalformedArea(String),
    #[error("area {0} has no width or height")]
    EmptyArea(Rect),
    #[error("monitor index {index} is out of range, {count} monitor(s) connected")]
    MonitorOutOfRange { index: usize, count: usize },
    #[error("draw mode `{0}` does not cover any connected monitor")]
    NothingVisible(DrawMode),
    #[error("frame rate must be greater than zero")]
    ZeroFrameRate,
    #[error("no video source given")]
    MissingSource,
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Playback configuration, read from `$XDG_CONFIG_HOME/loopwall/config.ron`.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Setters)]
#[serde(default, deny_unknown_fields)]
#[setters(strip_option)]
#[must_use]
pub struct Config {
    /// the video to play
    pub source: Option<PathBuf>,
    /// where the video is drawn
    pub mode: DrawMode,
    /// overrides the frame rate reported by the container
    pub frame_rate: Option<u32>,
    /// stops frame preparation after this many frames
    pub max_frames: Option<usize>,
}

impl Config {
    /// Location of the default configuration file.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(NAME).join(CONFIG_FILE))
    }

    /// Load the default configuration file, if there is one.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => {
                tracing::debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "loading configuration");

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = ron::from_str("()").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mode, DrawMode::SingleMonitor(0));
    }

    #[test]
    fn parses_all_fields() {
        let config: Config = ron::from_str(
            r#"(
                source: Some("/home/user/loop.mp4"),
                mode: "area=800x600+100+50",
                frame_rate: Some(30),
                max_frames: Some(600),
            )"#,
        )
        .unwrap();

        assert_eq!(config.source, Some(PathBuf::from("/home/user/loop.mp4")));
        assert_eq!(config.mode, DrawMode::Area(Rect::new(100, 50, 800, 600)));
        assert_eq!(config.frame_rate, Some(30));
        assert_eq!(config.max_frames, Some(600));
    }

    #[test]
    fn rejects_bad_mode_and_unknown_fields() {
        assert!(ron::from_str::<Config>(r#"(mode: "sideways")"#).is_err());
        assert!(ron::from_str::<Config>("(rotation_frequency: 900)").is_err());
    }

    #[test]
    fn setters_override_fields() {
        let config = Config::default()
            .mode(DrawMode::EachMonitor)
            .frame_rate(24);

        assert_eq!(config.mode, DrawMode::EachMonitor);
        assert_eq!(config.frame_rate, Some(24));
        assert_eq!(config.source, None);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load_from(Path::new("/nonexistent/loopwall.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn serializes_mode_as_string() {
        let config = Config::default().mode(DrawMode::Stretch);
        let text = ron::to_string(&config).unwrap();
        assert!(text.contains("\"stretch\""), "{text}");
    }
}
