// SPDX-License-Identifier: MPL-2.0-only

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Rect};

/// Which part of the desktop receives the video.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum DrawMode {
    /// A single monitor, by enumeration index.
    SingleMonitor(usize),
    /// A literal rectangle, not constrained to monitor bounds.
    Area(Rect),
    /// The bounding box of every monitor.
    Stretch,
    /// A full copy of the video on every monitor.
    EachMonitor,
}

impl Default for DrawMode {
    fn default() -> Self {
        DrawMode::SingleMonitor(0)
    }
}

impl FromStr for DrawMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        match s {
            "stretch" => return Ok(DrawMode::Stretch),
            "each" => return Ok(DrawMode::EachMonitor),
            _ => (),
        }

        match s.split_once('=') {
            Some(("monitor", index)) => index
                .parse()
                .map(DrawMode::SingleMonitor)
                .map_err(|_| ConfigError::InvalidMode(s.to_owned())),
            Some(("area", geometry)) => parse_geometry(geometry).map(DrawMode::Area),
            _ => Err(ConfigError::InvalidMode(s.to_owned())),
        }
    }
}

impl fmt::Display for DrawMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawMode::SingleMonitor(index) => write!(f, "monitor={index}"),
            DrawMode::Area(rect) => write!(f, "area={rect}"),
            DrawMode::Stretch => f.write_str("stretch"),
            DrawMode::EachMonitor => f.write_str("each"),
        }
    }
}

impl TryFrom<String> for DrawMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DrawMode> for String {
    fn from(mode: DrawMode) -> Self {
        mode.to_string()
    }
}

/// Parses `<w>x<h>+<x>+<y>`, where either offset may be negative.
fn parse_geometry(geometry: &str) -> Result<Rect, ConfigError> {
    let malformed = || ConfigError::MalformedArea(geometry.to_owned());
    let is_sign = |c: char| c == '+' || c == '-';

    let offsets_at = geometry.find(is_sign).ok_or_else(malformed)?;
    let (size, offsets) = geometry.split_at(offsets_at);

    let (width, height) = size.split_once('x').ok_or_else(malformed)?;
    let width: u32 = width.parse().map_err(|_| malformed())?;
    let height: u32 = height.parse().map_err(|_| malformed())?;

    let y_at = offsets[1..].find(is_sign).ok_or_else(malformed)? + 1;
    let (x, y) = offsets.split_at(y_at);
    let x: i32 = x.parse().map_err(|_| malformed())?;
    let y: i32 = y.parse().map_err(|_| malformed())?;

    let rect = Rect::new(x, y, width, height);
    if rect.is_empty() {
        return Err(ConfigError::EmptyArea(rect));
    }

    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode() {
        assert_eq!("monitor=0".parse::<DrawMode>().unwrap(), DrawMode::SingleMonitor(0));
        assert_eq!("monitor=3".parse::<DrawMode>().unwrap(), DrawMode::SingleMonitor(3));
        assert_eq!("stretch".parse::<DrawMode>().unwrap(), DrawMode::Stretch);
        assert_eq!("each".parse::<DrawMode>().unwrap(), DrawMode::EachMonitor);
        assert_eq!(
            "area=1920x1080+0+0".parse::<DrawMode>().unwrap(),
            DrawMode::Area(Rect::new(0, 0, 1920, 1080))
        );
    }

    #[test]
    fn area_offsets_may_be_negative() {
        assert_eq!(
            "area=10x10-5+3".parse::<DrawMode>().unwrap(),
            DrawMode::Area(Rect::new(-5, 3, 10, 10))
        );
        assert_eq!(
            "area=640x480+100-20".parse::<DrawMode>().unwrap(),
            DrawMode::Area(Rect::new(100, -20, 640, 480))
        );
    }

    #[test]
    fn rejects_malformed_modes() {
        assert!(matches!(
            "monitor=x".parse::<DrawMode>(),
            Err(ConfigError::InvalidMode(_))
        ));
        assert!(matches!(
            "fullscreen".parse::<DrawMode>(),
            Err(ConfigError::InvalidMode(_))
        ));
        assert!(matches!(
            "monitor=-1".parse::<DrawMode>(),
            Err(ConfigError::InvalidMode(_))
        ));

        for geometry in ["area=1920x1080", "area=1920+0+0", "area=ax10+0+0", "area=10x10+0", "area="] {
            assert!(
                matches!(geometry.parse::<DrawMode>(), Err(ConfigError::MalformedArea(_))),
                "{geometry} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_area() {
        assert!(matches!(
            "area=0x1080+0+0".parse::<DrawMode>(),
            Err(ConfigError::EmptyArea(_))
        ));
    }

    #[test]
    fn display_parses_back() {
        let modes = [
            DrawMode::SingleMonitor(1),
            DrawMode::Area(Rect::new(-5, 3, 10, 10)),
            DrawMode::Stretch,
            DrawMode::EachMonitor,
        ];

        for mode in modes {
            assert_eq!(mode.to_string().parse::<DrawMode>().unwrap(), mode);
        }
    }

    #[test]
    fn default_is_first_monitor() {
        assert_eq!(DrawMode::default(), DrawMode::SingleMonitor(0));
    }
}
