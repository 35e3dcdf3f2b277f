// SPDX-License-Identifier: MPL-2.0

//! Channel reordering from decoder order into the order textures expect.

use rayon::prelude::*;

use super::SourceFrame;
use crate::error::FrameError;

/// A reordering of the three channels of a pixel: `dest[i] = src[self.0[i]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swizzle([usize; 3]);

impl Swizzle {
    pub const IDENTITY: Self = Self([0, 1, 2]);

    /// Decoder BGR to destination RGB: channels 0 and 2 trade places.
    pub const BGR_TO_RGB: Self = Self([2, 1, 0]);

    /// `None` unless `order` contains each of 0, 1 and 2 exactly once.
    #[must_use]
    pub fn new(order: [usize; 3]) -> Option<Self> {
        let mut seen = [false; 3];
        for &channel in &order {
            if channel > 2 || std::mem::replace(&mut seen[channel], true) {
                return None;
            }
        }
        Some(Self(order))
    }

    /// The swizzle that undoes this one.
    #[must_use]
    pub fn inverse(self) -> Self {
        let mut inverse = [0; 3];
        for (dest, &src) in self.0.iter().enumerate() {
            inverse[src] = dest;
        }
        Self(inverse)
    }

    #[inline]
    fn apply(self, src: &[u8], dest: &mut [u8]) {
        dest[0] = src[self.0[0]];
        dest[1] = src[self.0[1]];
        dest[2] = src[self.0[2]];
    }
}

/// Tightly packed RGB pixels, `width * height * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ConvertedBuffer {
    /// Row length in bytes.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * 3
    }

    /// Copies the pixels into an image for saving to disk.
    #[must_use]
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

impl From<ConvertedBuffer> for SourceFrame {
    fn from(buffer: ConvertedBuffer) -> Self {
        Self {
            width: buffer.width,
            height: buffer.height,
            channel_count: 3,
            data: buffer.data,
        }
    }
}

/// Converts a decoded BGR frame to RGB.
pub fn convert(frame: &SourceFrame) -> Result<ConvertedBuffer, FrameError> {
    convert_with(frame, Swizzle::BGR_TO_RGB)
}

/// Reorders the channels of every pixel of `frame` with `swizzle`.
///
/// Rows are converted in parallel. Only three-channel frames are accepted,
/// and bytes past `width * height * 3` are ignored.
pub fn convert_with(frame: &SourceFrame, swizzle: Swizzle) -> Result<ConvertedBuffer, FrameError> {
    if frame.channel_count != 3 {
        return Err(FrameError::ChannelCount(frame.channel_count));
    }

    if frame.width == 0 || frame.height == 0 {
        return Err(FrameError::Empty);
    }

    let stride = frame.width as usize * 3;
    let expected = stride * frame.height as usize;
    if frame.data.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            actual: frame.data.len(),
        });
    }

    let mut data = vec![0; expected];
    data.par_chunks_exact_mut(stride)
        .zip(frame.data[..expected].par_chunks_exact(stride))
        .for_each(|(dest_row, src_row)| {
            for (dest, src) in dest_row
                .chunks_exact_mut(3)
                .zip(src_row.chunks_exact(3))
            {
                swizzle.apply(src, dest);
            }
        });

    Ok(ConvertedBuffer {
        width: frame.width,
        height: frame.height,
        data,
    })
}
