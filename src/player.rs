// SPDX-License-Identifier: MPL-2.0

//! Frame cadence and looping.

use std::time::Duration;

use loopwall_config::ConfigError;

/// Picks the playback frame rate, preferring a configured override.
pub fn frame_rate(native: u32, configured: Option<u32>) -> Result<u32, ConfigError> {
    match configured.unwrap_or(native) {
        0 => Err(ConfigError::ZeroFrameRate),
        fps => Ok(fps),
    }
}

/// Time each frame stays on screen: `1000 / fps` whole milliseconds.
///
/// Rates that do not divide 1000 drift slightly fast; 30 fps plays at 33 ms.
pub fn frame_delay(fps: u32) -> Result<Duration, ConfigError> {
    if fps == 0 {
        return Err(ConfigError::ZeroFrameRate);
    }
    Ok(Duration::from_millis(u64::from(1000 / fps)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Stopped,
}

/// Cycles through frame indices forever until stopped.
#[derive(Debug)]
pub struct Player {
    frame_count: usize,
    next: usize,
    delay: Duration,
    state: PlaybackState,
}

impl Player {
    /// Starts playing at frame 0.
    ///
    /// `frame_count` must be at least one.
    pub fn new(frame_count: usize, fps: u32) -> Result<Self, ConfigError> {
        debug_assert!(frame_count > 0);

        Ok(Self {
            frame_count,
            next: 0,
            delay: frame_delay(fps)?,
            state: PlaybackState::Playing,
        })
    }

    /// The frame to present now, advancing to the one after it.
    ///
    /// Wraps to frame 0 after the last frame. `None` once stopped.
    pub fn tick(&mut self) -> Option<usize> {
        if self.state == PlaybackState::Stopped {
            return None;
        }

        let current = self.next;
        self.next = (current + 1) % self.frame_count;
        Some(current)
    }

    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            tracing::debug!(next_frame = self.next, "playback stopped");
        }
        self.state = PlaybackState::Stopped;
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
