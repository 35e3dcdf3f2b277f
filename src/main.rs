// SPDX-License-Identifier: MPL-2.0

mod cli;
mod draw;
mod error;
mod player;
mod router;
mod surface;
mod topology;
mod video;

use std::path::Path;

use calloop::signals::{Signal, Signals};
use clap::Parser;
use loopwall_config::ConfigError;
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    subcompositor::SubcompositorState,
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    delegate_subcompositor,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{
            EventLoop,
            timer::{TimeoutAction, Timer},
        },
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, QueueHandle, delegate_noop,
            globals::registry_queue_init,
            protocol::{wl_buffer::WlBuffer, wl_output, wl_surface},
        },
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::wlr_layer::{LayerShell, LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
    shm::{Shm, ShmHandler},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wayland_protocols::wp::viewporter::client::{
    wp_viewport::WpViewport, wp_viewporter::WpViewporter,
};

use crate::{
    error::{Error, SurfaceError},
    player::Player,
    surface::{RenderContext, Shell},
    topology::DisplayTopology,
    video::{ConvertedBuffer, Decoder, FrameSource, Materializer},
};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    run(&args)?;

    Ok(())
}

fn run(args: &cli::Args) -> Result<(), Error> {
    let config = args.config()?;

    let mut event_loop: EventLoop<LoopWall> =
        EventLoop::try_new().map_err(|why| SurfaceError::EventLoop(why.to_string()))?;

    // Blocks the signals on this thread, so it must happen before GStreamer
    // and rayon spawn theirs.
    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .map_err(|why| SurfaceError::EventLoop(why.to_string()))?;

    let conn = Connection::connect_to_env().map_err(SurfaceError::from)?;
    let (globals, mut event_queue) = registry_queue_init(&conn).map_err(SurfaceError::from)?;
    let qh = event_queue.handle();

    let compositor_state = CompositorState::bind(&globals, &qh).map_err(SurfaceError::from)?;
    let subcompositor_state =
        SubcompositorState::bind(compositor_state.wl_compositor().clone(), &globals, &qh)
            .map_err(SurfaceError::from)?;

    let mut state = LoopWall {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        compositor_state,
        subcompositor_state,
        shm: Shm::bind(&globals, &qh).map_err(SurfaceError::from)?,
        layer_shell: LayerShell::bind(&globals, &qh).map_err(SurfaceError::from)?,
        viewporter: globals
            .bind::<WpViewporter, _, _>(&qh, 1..=1, ())
            .map_err(SurfaceError::from)?,
        render: None,
        player: None,
        exit: false,
    };

    // outputs first, then their geometry
    for _ in 0..2 {
        event_queue
            .roundtrip(&mut state)
            .map_err(SurfaceError::from)?;
    }

    let (topology, outputs) = topology::resolve(&state.output_state)?;

    if args.list_monitors {
        print_monitors(&topology);
        return Ok(());
    }

    router::validate(&config.mode, &topology)?;

    let source = config.source.as_deref().ok_or(ConfigError::MissingSource)?;
    let mut decoder = Decoder::open(source)?;
    let fps = player::frame_rate(decoder.info().frame_rate, config.frame_rate)?;

    let frame_size = (decoder.info().width, decoder.info().height);
    let destinations = router::route(&config.mode, &topology);
    let placements = router::placements(&destinations, &topology, frame_size);
    if placements.is_empty() {
        return Err(ConfigError::NothingVisible(config.mode).into());
    }

    let mut materializer = Materializer::new(&state.shm, frame_size.0);

    let video = {
        let _span = tracing::info_span!("prepare", path = %source.display()).entered();

        let mut dump_to = args.dump_frame.as_deref();
        video::prepare(&mut decoder, fps, config.max_frames, |buffer| {
            if let Some(path) = dump_to.take() {
                dump_frame(path, buffer);
            }
            materializer.materialize(buffer, &qh)
        })?
    };
    drop(decoder);

    let backdrop = materializer.solid([0, 0, 0], &qh)?;
    drop(materializer);

    let render = RenderContext::new(
        topology,
        &outputs,
        &placements,
        video.size(),
        backdrop,
        &Shell {
            compositor: &state.compositor_state,
            subcompositor: &state.subcompositor_state,
            layer_shell: &state.layer_shell,
            viewporter: &state.viewporter,
        },
        &qh,
    )?;

    info!(
        mode = %config.mode,
        placements = placements.len(),
        monitors = render.topology().monitors().len(),
        "drawing"
    );

    state.render = Some(render);
    state.player = Some(Player::new(video.frame_count(), video.frame_rate())?);

    let handle = event_loop.handle();

    WaylandSource::new(conn.clone(), event_queue)
        .insert(handle.clone())
        .map_err(|why| SurfaceError::EventLoop(why.error.to_string()))?;

    handle
        .insert_source(signals, |event, _, state| {
            info!(signal = ?event.signal(), "received termination signal");
            state.stop();
        })
        .map_err(|why| SurfaceError::EventLoop(why.error.to_string()))?;

    handle
        .insert_source(Timer::immediate(), move |_, _, state| {
            let Some(player) = state.player.as_mut() else {
                return TimeoutAction::Drop;
            };
            let Some(index) = player.tick() else {
                return TimeoutAction::Drop;
            };
            let delay = player.delay();

            if let Some(render) = &state.render {
                render.present(video.frame(index));
            }

            if let Err(why) = conn.flush() {
                warn!(%why, "failed to flush the Wayland connection");
                state.stop();
                return TimeoutAction::Drop;
            }

            TimeoutAction::ToDuration(delay)
        })
        .map_err(|why| SurfaceError::EventLoop(why.error.to_string()))?;

    while !state.exit {
        event_loop
            .dispatch(None, &mut state)
            .map_err(|why| SurfaceError::EventLoop(why.to_string()))?;
    }

    info!(playback = ?state.player.as_ref().map(Player::state), "exiting");

    Ok(())
}

fn print_monitors(topology: &DisplayTopology) {
    for (index, monitor) in topology.monitors().iter().enumerate() {
        println!("{index}: {} {}", monitor.name, monitor.rect);
    }
    println!("root: {}", topology.root());
}

fn dump_frame(path: &Path, buffer: &ConvertedBuffer) {
    let Some(image) = buffer.to_rgb_image() else {
        warn!("first frame does not form a complete image");
        return;
    };

    match image.save(path) {
        Ok(()) => info!(path = %path.display(), "saved first frame"),
        Err(why) => warn!(path = %path.display(), %why, "failed to save first frame"),
    }
}

#[derive(Debug)]
pub struct LoopWall {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    subcompositor_state: SubcompositorState,
    shm: Shm,
    layer_shell: LayerShell,
    viewporter: WpViewporter,

    render: Option<RenderContext>,
    player: Option<Player>,
    exit: bool,
}

impl LoopWall {
    fn stop(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        self.exit = true;
    }
}

impl CompositorHandler for LoopWall {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        // viewports scale our buffers
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for LoopWall {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        if self.render.is_some() {
            let name = self.output_state.info(&output).and_then(|info| info.name);
            info!(?name, "ignoring output connected after startup");
        }
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let name = self.output_state.info(&output).and_then(|info| info.name);
        warn!(?name, "output disconnected; monitor indices are not recomputed");
    }
}

impl LayerShellHandler for LoopWall {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        info!("compositor closed a background surface");
        self.stop();
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let configured = self
            .render
            .as_mut()
            .is_some_and(|render| render.configure(layer, configure.new_size));

        if !configured {
            debug!("configure for an unknown layer surface");
        }
    }
}

impl ShmHandler for LoopWall {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

delegate_compositor!(LoopWall);
delegate_subcompositor!(LoopWall);
delegate_output!(LoopWall);
delegate_shm!(LoopWall);

delegate_layer!(LoopWall);

delegate_registry!(LoopWall);

delegate_noop!(LoopWall: ignore WlBuffer);
delegate_noop!(LoopWall: ignore WpViewporter);
delegate_noop!(LoopWall: ignore WpViewport);

impl ProvidesRegistryState for LoopWall {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}
