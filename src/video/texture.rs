// SPDX-License-Identifier: MPL-2.0

//! Immutable `wl_buffer`s holding prepared frames.

use sctk::{
    reexports::client::{
        Dispatch, QueueHandle,
        protocol::{wl_buffer::WlBuffer, wl_shm},
    },
    shm::{Shm, raw::RawPool},
};

use super::ConvertedBuffer;
use crate::{draw, error::FrameError};

/// Upper bound of a single `wl_shm_pool`.
const POOL_CHUNK: usize = 256 << 20;

/// Start of every buffer within a pool is aligned to this.
const BUFFER_ALIGN: usize = 64;

/// Pixel layout of texture memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmLayout {
    /// Three bytes per pixel in R, G, B memory order.
    Bgr888,
    /// Four bytes per pixel in B, G, R, X memory order.
    Xrgb8888,
}

impl ShmLayout {
    /// Prefers the packed 3-byte format when the compositor supports it and
    /// rows of `width` pixels keep 4-byte alignment.
    #[must_use]
    pub fn select(formats: &[wl_shm::Format], width: u32) -> Self {
        if formats.contains(&wl_shm::Format::Bgr888) && (width as usize * 3) % 4 == 0 {
            Self::Bgr888
        } else {
            Self::Xrgb8888
        }
    }

    #[must_use]
    pub fn wl_format(self) -> wl_shm::Format {
        match self {
            Self::Bgr888 => wl_shm::Format::Bgr888,
            Self::Xrgb8888 => wl_shm::Format::Xrgb8888,
        }
    }

    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr888 => 3,
            Self::Xrgb8888 => 4,
        }
    }

    fn draw(self, canvas: &mut [u8], buffer: &ConvertedBuffer) {
        match self {
            Self::Bgr888 => draw::bgr888_canvas(canvas, buffer),
            Self::Xrgb8888 => draw::xrgb8888_canvas(canvas, buffer),
        }
    }
}

/// A frame resident in shared memory. Destroyed on drop.
#[derive(Debug)]
pub struct Texture {
    buffer: WlBuffer,
    width: u32,
    height: u32,
}

impl Texture {
    #[must_use]
    pub fn wl_buffer(&self) -> &WlBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

#[derive(Debug)]
struct ArenaPool {
    pool: RawPool,
    len: usize,
    used: usize,
}

/// Uploads converted frames into a growing set of shm pools.
///
/// Buffers stay valid after the materializer and its pools are dropped.
#[derive(Debug)]
pub struct Materializer<'a> {
    shm: &'a Shm,
    layout: ShmLayout,
    pools: Vec<ArenaPool>,
}

impl<'a> Materializer<'a> {
    /// `width` is the frame width all uploads will share.
    #[must_use]
    pub fn new(shm: &'a Shm, width: u32) -> Self {
        let layout = ShmLayout::select(shm.formats(), width);
        tracing::debug!(?layout, "texture pixel format");

        Self {
            shm,
            layout,
            pools: Vec::new(),
        }
    }

    /// Copies `buffer` into shared memory and wraps it in a `wl_buffer`.
    pub fn materialize<D>(
        &mut self,
        buffer: &ConvertedBuffer,
        qh: &QueueHandle<D>,
    ) -> Result<Texture, FrameError>
    where
        D: Dispatch<WlBuffer, ()> + 'static,
    {
        self.upload(self.layout, buffer, qh)
    }

    /// A single opaque pixel, meant to be stretched with a viewport.
    pub fn solid<D>(&mut self, rgb: [u8; 3], qh: &QueueHandle<D>) -> Result<Texture, FrameError>
    where
        D: Dispatch<WlBuffer, ()> + 'static,
    {
        let pixel = ConvertedBuffer {
            width: 1,
            height: 1,
            data: rgb.to_vec(),
        };
        self.upload(ShmLayout::Xrgb8888, &pixel, qh)
    }

    fn upload<D>(
        &mut self,
        layout: ShmLayout,
        buffer: &ConvertedBuffer,
        qh: &QueueHandle<D>,
    ) -> Result<Texture, FrameError>
    where
        D: Dispatch<WlBuffer, ()> + 'static,
    {
        let stride = buffer.width as usize * layout.bytes_per_pixel();
        let len = stride * buffer.height as usize;

        let (Ok(width), Ok(height), Ok(stride_i32)) = (
            i32::try_from(buffer.width),
            i32::try_from(buffer.height),
            i32::try_from(stride),
        ) else {
            return Err(FrameError::UploadFailed("frame dimensions overflow".into()));
        };

        let arena = self.allocate(len)?;
        let offset = arena.used;
        arena.used += len.next_multiple_of(BUFFER_ALIGN);

        layout.draw(&mut arena.pool.mmap()[offset..offset + len], buffer);

        let wl_buffer = arena.pool.create_buffer(
            offset as i32,
            width,
            height,
            stride_i32,
            layout.wl_format(),
            (),
            qh,
        );

        Ok(Texture {
            buffer: wl_buffer,
            width: buffer.width,
            height: buffer.height,
        })
    }

    /// A pool with at least `len` free bytes, creating one if needed.
    fn allocate(&mut self, len: usize) -> Result<&mut ArenaPool, FrameError> {
        if len > i32::MAX as usize {
            return Err(FrameError::UploadFailed(format!(
                "{len} byte frame exceeds the wl_shm pool limit"
            )));
        }

        let fits = self
            .pools
            .last()
            .is_some_and(|arena| arena.len.saturating_sub(arena.used) >= len);

        if !fits {
            let pool_len = len.max(POOL_CHUNK);
            let pool = RawPool::new(pool_len, self.shm)
                .map_err(|why| FrameError::UploadFailed(why.to_string()))?;

            tracing::debug!(
                pools = self.pools.len() + 1,
                mib = pool_len >> 20,
                "allocated texture pool"
            );

            self.pools.push(ArenaPool {
                pool,
                len: pool_len,
                used: 0,
            });
        }

        self.pools
            .last_mut()
            .ok_or_else(|| FrameError::UploadFailed("no texture pool".into()))
    }
}
