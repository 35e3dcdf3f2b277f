// SPDX-License-Identifier: MPL-2.0

//! Background surfaces: one layer surface per output, with one subsurface
//! per placement stacked on top of a black backdrop.

use sctk::{
    compositor::CompositorState,
    reexports::client::{
        QueueHandle,
        protocol::{wl_output::WlOutput, wl_subsurface::WlSubsurface, wl_surface::WlSurface},
    },
    subcompositor::SubcompositorState,
    shell::{
        WaylandSurface,
        wlr_layer::{Anchor, KeyboardInteractivity, Layer, LayerShell, LayerSurface},
    },
};
use wayland_protocols::wp::viewporter::client::{
    wp_viewport::WpViewport, wp_viewporter::WpViewporter,
};

use crate::{
    LoopWall, draw,
    error::SurfaceError,
    router::{Placement, SourceCrop},
    topology::DisplayTopology,
    video::Texture,
};

/// Smallest crop edge a viewport accepts, one `wl_fixed` step.
const MIN_CROP: f64 = 1.0 / 256.0;

/// Bound globals needed to build surfaces.
pub struct Shell<'a> {
    pub compositor: &'a CompositorState,
    pub subcompositor: &'a SubcompositorState,
    pub layer_shell: &'a LayerShell,
    pub viewporter: &'a WpViewporter,
}

/// A subsurface showing part of the current frame.
#[derive(Debug)]
struct FrameView {
    subsurface: WlSubsurface,
    surface: WlSurface,
    viewport: WpViewport,
}

impl Drop for FrameView {
    fn drop(&mut self) {
        self.viewport.destroy();
        self.subsurface.destroy();
        self.surface.destroy();
    }
}

#[derive(Debug)]
struct OutputSurface {
    layer: LayerSurface,
    viewport: WpViewport,
    views: Vec<FrameView>,
    /// Logical size of the output, used until the compositor configures us.
    size: (u32, u32),
    configured: bool,
}

impl Drop for OutputSurface {
    fn drop(&mut self) {
        self.views.clear();
        self.viewport.destroy();
    }
}

/// Everything needed to put frames on screen.
#[derive(Debug)]
pub struct RenderContext {
    topology: DisplayTopology,
    surfaces: Vec<OutputSurface>,
    backdrop: Texture,
}

impl RenderContext {
    /// Creates surfaces for every output that has at least one placement.
    ///
    /// `outputs` is indexed like the topology's monitors. `frame_size` is
    /// the size of every texture that will be presented.
    pub fn new(
        topology: DisplayTopology,
        outputs: &[WlOutput],
        placements: &[Placement],
        frame_size: (u32, u32),
        backdrop: Texture,
        shell: &Shell<'_>,
        qh: &QueueHandle<LoopWall>,
    ) -> Result<Self, SurfaceError> {
        let mut surfaces = Vec::new();

        for (index, monitor) in topology.monitors().iter().enumerate() {
            let mut placed = placements.iter().filter(|p| p.output == index).peekable();
            if placed.peek().is_none() {
                continue;
            }

            let wl_output = outputs.get(index).ok_or_else(|| {
                SurfaceError::Surface(format!("no wl_output for monitor {index}"))
            })?;

            let surface = shell.compositor.create_surface(qh);
            let layer = shell.layer_shell.create_layer_surface(
                qh,
                surface,
                Layer::Background,
                Some("wallpaper"),
                Some(wl_output),
            );

            layer.set_anchor(Anchor::all());
            layer.set_exclusive_zone(-1);
            layer.set_keyboard_interactivity(KeyboardInteractivity::None);
            layer.set_size(0, 0);

            let viewport = shell.viewporter.get_viewport(layer.wl_surface(), qh, ());

            let views = placed
                .map(|placement| FrameView::new(&layer, placement, frame_size, shell, qh))
                .collect();

            layer.commit();

            tracing::debug!(output = monitor.name, "created background surface");

            surfaces.push(OutputSurface {
                layer,
                viewport,
                views,
                size: (monitor.rect.width, monitor.rect.height),
                configured: false,
            });
        }

        if surfaces.is_empty() {
            return Err(SurfaceError::Surface("no output has anything to show".into()));
        }

        Ok(Self {
            topology,
            surfaces,
            backdrop,
        })
    }

    #[must_use]
    pub fn topology(&self) -> &DisplayTopology {
        &self.topology
    }

    /// Handles the compositor's configure for `layer`.
    ///
    /// Returns false if `layer` is not one of ours.
    pub fn configure(&mut self, layer: &LayerSurface, new_size: (u32, u32)) -> bool {
        let Some(output) = self.surfaces.iter_mut().find(|s| &s.layer == layer) else {
            return false;
        };

        if new_size.0 > 0 && new_size.1 > 0 {
            output.size = new_size;
        }

        output
            .viewport
            .set_destination(output.size.0 as i32, output.size.1 as i32);
        draw::surface(
            output.layer.wl_surface(),
            self.backdrop.wl_buffer(),
            self.backdrop.size(),
        );

        if !output.configured {
            tracing::debug!(size = ?output.size, "background surface configured");
        }
        output.configured = true;
        true
    }

    /// Shows `texture` in every placement and commits each output atomically.
    pub fn present(&self, texture: &Texture) {
        for output in self.surfaces.iter().filter(|s| s.configured) {
            for view in &output.views {
                draw::surface(&view.surface, texture.wl_buffer(), texture.size());
            }
            output.layer.wl_surface().commit();
        }
    }
}

impl FrameView {
    fn new(
        layer: &LayerSurface,
        placement: &Placement,
        frame_size: (u32, u32),
        shell: &Shell<'_>,
        qh: &QueueHandle<LoopWall>,
    ) -> Self {
        let (subsurface, surface) = shell
            .subcompositor
            .create_subsurface(layer.wl_surface().clone(), qh);

        subsurface.set_position(placement.position.0, placement.position.1);

        let viewport = shell.viewporter.get_viewport(&surface, qh, ());
        let crop = clamp_crop(placement.source, frame_size);
        viewport.set_source(crop.x, crop.y, crop.width, crop.height);
        viewport.set_destination(placement.size.0 as i32, placement.size.1 as i32);

        Self {
            subsurface,
            surface,
            viewport,
        }
    }
}

/// Keeps a crop inside the frame and large enough for the viewport.
fn clamp_crop(crop: SourceCrop, frame_size: (u32, u32)) -> SourceCrop {
    let clamp_axis = |start: f64, len: f64, limit: u32| {
        let limit = f64::from(limit);
        let len = len.clamp(MIN_CROP, limit);
        let start = start.clamp(0.0, limit - len);
        (start, len)
    };

    let (x, width) = clamp_axis(crop.x, crop.width, frame_size.0);
    let (y, height) = clamp_axis(crop.y, crop.height, frame_size.1);

    SourceCrop {
        x,
        y,
        width,
        height,
    }
}
