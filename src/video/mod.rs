// SPDX-License-Identifier: MPL-2.0

//! Frame preparation: every frame of the video is decoded, converted and
//! uploaded before playback starts.
//!
//! ```text
//! Decoder ──SourceFrame (BGR)──► convert ──ConvertedBuffer (RGB)──► Materializer ──► Texture
//! ```
//!
//! The whole [`PreparedVideo`] stays resident for the lifetime of the process,
//! so memory grows with `frames * width * height * 3`. This keeps playback free
//! of decode stalls and makes looping trivial, at the cost of only suiting
//! short clips.

mod convert;
mod decoder;
mod texture;

pub use convert::{ConvertedBuffer, Swizzle, convert, convert_with};
pub use decoder::Decoder;
pub use texture::{Materializer, ShmLayout, Texture};

use loopwall_config::ConfigError;
use tracing::{debug, info, warn};

use crate::error::{Error, FrameError};

/// Resident size above which preparing a video logs a warning.
const MEMORY_WARNING_BYTES: u64 = 1 << 30;

/// Stream properties reported once the source is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel in decoder order.
    pub channel_count: u32,
    /// Whole frames per second; 0 when unknown.
    pub frame_rate: u32,
    /// Total frames, if the container reports a duration.
    pub frame_count: Option<u64>,
}

/// One decoded image, rows packed with a stride of `width * channel_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    pub channel_count: u32,
    pub data: Vec<u8>,
}

/// A forward-only, finite sequence of decoded frames.
pub trait FrameSource {
    fn info(&self) -> &StreamInfo;

    /// The next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<Result<SourceFrame, FrameError>>;
}

/// Every frame of a video, ready to present.
#[derive(Debug)]
pub struct PreparedVideo<T = Texture> {
    textures: Vec<T>,
    frame_rate: u32,
    size: (u32, u32),
}

impl<T> PreparedVideo<T> {
    /// Fails with [`Error::NoFrames`] if `textures` is empty.
    pub fn new(textures: Vec<T>, frame_rate: u32, size: (u32, u32)) -> Result<Self, Error> {
        if textures.is_empty() {
            return Err(Error::NoFrames);
        }
        if frame_rate == 0 {
            return Err(ConfigError::ZeroFrameRate.into());
        }

        Ok(Self {
            textures,
            frame_rate,
            size,
        })
    }

    /// Always at least one.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> &T {
        &self.textures[index]
    }

    #[must_use]
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Native frame size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// Drains `source`, converting each frame and handing it to `materialize`.
///
/// Frames that fail to decode, convert or materialize are skipped with a
/// warning. A stream whose frames do not have three channels is rejected
/// outright.
pub fn prepare<S, T, F>(
    source: &mut S,
    frame_rate: u32,
    max_frames: Option<usize>,
    mut materialize: F,
) -> Result<PreparedVideo<T>, Error>
where
    S: FrameSource,
    F: FnMut(&ConvertedBuffer) -> Result<T, FrameError>,
{
    let info = source.info().clone();

    if info.channel_count != 3 {
        return Err(FrameError::ChannelCount(info.channel_count).into());
    }

    if let Some(frames) = info.frame_count {
        let bytes = frames * u64::from(info.width) * u64::from(info.height) * 3;
        if bytes > MEMORY_WARNING_BYTES {
            warn!(
                frames,
                mib = bytes >> 20,
                "video is long; every frame is kept in memory"
            );
        } else {
            debug!(frames, mib = bytes >> 20, "estimated video memory");
        }
    }

    let limit = max_frames.unwrap_or(usize::MAX);
    let capacity = info.frame_count.map_or(0, |n| n.min(limit as u64) as usize);
    let mut textures = Vec::with_capacity(capacity);
    let mut index: u64 = 0;

    while textures.len() < limit {
        let Some(frame) = source.next_frame() else {
            break;
        };

        let current = index;
        index += 1;

        if let Some(total) = info.frame_count.filter(|&n| n > 0) {
            debug!(
                frame = current,
                percent = (current + 1) * 100 / total,
                "preparing frame"
            );
        }

        let frame = match frame {
            Ok(frame) => frame,
            Err(why) => {
                warn!(frame = current, %why, "skipping frame");
                continue;
            }
        };

        if (frame.width, frame.height) != (info.width, info.height) {
            warn!(
                frame = current,
                width = frame.width,
                height = frame.height,
                "skipping frame with a different size than the stream"
            );
            continue;
        }

        let converted = match convert(&frame) {
            Ok(converted) => converted,
            Err(FrameError::ChannelCount(channels)) => {
                return Err(FrameError::ChannelCount(channels).into());
            }
            Err(why) => {
                warn!(frame = current, %why, "skipping frame");
                continue;
            }
        };
        drop(frame);

        match materialize(&converted) {
            Ok(texture) => textures.push(texture),
            Err(why) => warn!(frame = current, %why, "skipping frame"),
        }
    }

    if textures.len() == limit {
        info!(limit, "frame limit reached");
    }

    info!(
        frames = textures.len(),
        fps = frame_rate,
        width = info.width,
        height = info.height,
        "video prepared"
    );

    PreparedVideo::new(textures, frame_rate, (info.width, info.height))
}

#[cfg(test)]
mod tests;
