// SPDX-License-Identifier: MPL-2.0

//! Writing converted pixels into shared memory and putting them on screen.

use sctk::reexports::client::protocol::{wl_buffer::WlBuffer, wl_surface::WlSurface};

use crate::video::ConvertedBuffer;

/// Copies RGB pixels into a `BGR888` canvas, whose memory order is also R, G, B.
pub fn bgr888_canvas(canvas: &mut [u8], buffer: &ConvertedBuffer) {
    canvas[..buffer.data.len()].copy_from_slice(&buffer.data);
}

/// Expands RGB pixels into an 8-bit `XRGB8888` canvas.
pub fn xrgb8888_canvas(canvas: &mut [u8], buffer: &ConvertedBuffer) {
    for (dest, pixel) in canvas
        .chunks_exact_mut(4)
        .zip(buffer.data.chunks_exact(3))
    {
        let r = u32::from(pixel[0]) << 16;
        let g = u32::from(pixel[1]) << 8;
        let b = u32::from(pixel[2]);

        dest.copy_from_slice(&(r | g | b).to_le_bytes());
    }
}

/// Attaches `buffer` to `surface`, damages all of it and commits.
///
/// For a synchronized subsurface the new content only shows once the
/// parent commits.
pub fn surface(wl_surface: &WlSurface, buffer: &WlBuffer, buffer_size: (u32, u32)) {
    wl_surface.attach(Some(buffer), 0, 0);
    wl_surface.damage_buffer(0, 0, buffer_size.0 as i32, buffer_size.1 as i32);
    wl_surface.commit();
}
