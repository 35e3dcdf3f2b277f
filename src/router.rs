// SPDX-License-Identifier: MPL-2.0

//! Maps a draw mode onto screen rectangles, and those rectangles onto outputs.

use loopwall_config::{ConfigError, DrawMode, Rect};

use crate::topology::DisplayTopology;

/// Rejects modes that cannot be drawn on `topology`.
pub fn validate(mode: &DrawMode, topology: &DisplayTopology) -> Result<(), ConfigError> {
    match *mode {
        DrawMode::SingleMonitor(index) if index >= topology.monitors().len() => {
            Err(ConfigError::MonitorOutOfRange {
                index,
                count: topology.monitors().len(),
            })
        }
        DrawMode::Area(rect) if rect.is_empty() => Err(ConfigError::EmptyArea(rect)),
        _ => Ok(()),
    }
}

/// Destination rectangles for `mode`, in desktop coordinates.
///
/// `mode` must have passed [`validate`].
#[must_use]
pub fn route(mode: &DrawMode, topology: &DisplayTopology) -> Vec<Rect> {
    match *mode {
        DrawMode::SingleMonitor(index) => vec![topology.monitors()[index].rect],
        DrawMode::Area(rect) => vec![rect],
        DrawMode::Stretch => vec![topology.root()],
        DrawMode::EachMonitor => topology.monitors().iter().map(|m| m.rect).collect(),
    }
}

/// Region of the frame texture, in buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The part of one destination that falls on one output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Index into the topology's monitors.
    pub output: usize,
    /// Offset from the output's top-left corner.
    pub position: (i32, i32),
    /// Size on screen, in logical pixels.
    pub size: (u32, u32),
    /// Part of the frame shown at `position`.
    pub source: SourceCrop,
}

/// Splits each destination along output boundaries.
///
/// The frame is stretched over the whole destination, so a destination
/// spanning two outputs shows the left part of the frame on one and the
/// right part on the other.
#[must_use]
pub fn placements(
    destinations: &[Rect],
    topology: &DisplayTopology,
    frame_size: (u32, u32),
) -> Vec<Placement> {
    let mut placements: Vec<Placement> = Vec::new();

    for (output, monitor) in topology.monitors().iter().enumerate() {
        for destination in destinations.iter().filter(|d| !d.is_empty()) {
            let Some(visible) = destination.intersection(&monitor.rect) else {
                continue;
            };

            let scale_x = f64::from(frame_size.0) / f64::from(destination.width);
            let scale_y = f64::from(frame_size.1) / f64::from(destination.height);

            let placement = Placement {
                output,
                position: (visible.x - monitor.rect.x, visible.y - monitor.rect.y),
                size: (visible.width, visible.height),
                source: SourceCrop {
                    x: f64::from(visible.x - destination.x) * scale_x,
                    y: f64::from(visible.y - destination.y) * scale_y,
                    width: f64::from(visible.width) * scale_x,
                    height: f64::from(visible.height) * scale_y,
                },
            };

            // mirrored outputs route the same rectangle twice
            if !placements.contains(&placement) {
                placements.push(placement);
            }
        }
    }

    for destination in destinations {
        if topology
            .monitors()
            .iter()
            .all(|m| destination.intersection(&m.rect).is_none())
        {
            tracing::warn!(%destination, "destination is not on any monitor");
        }
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Monitor;

    fn side_by_side() -> DisplayTopology {
        DisplayTopology::new(vec![
            Monitor {
                name: "DP-1".into(),
                rect: Rect::new(0, 0, 1920, 1080),
            },
            Monitor {
                name: "DP-2".into(),
                rect: Rect::new(1920, 0, 1920, 1080),
            },
        ])
        .unwrap()
    }

    #[test]
    fn single_monitor_routes_to_that_monitor() {
        let topology = side_by_side();
        for (index, monitor) in topology.monitors().iter().enumerate() {
            let mode = DrawMode::SingleMonitor(index);
            assert!(validate(&mode, &topology).is_ok());
            assert_eq!(route(&mode, &topology), vec![monitor.rect]);
        }
    }

    #[test]
    fn monitor_index_out_of_range() {
        let err = validate(&DrawMode::SingleMonitor(5), &side_by_side()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MonitorOutOfRange { index: 5, count: 2 }
        ));
    }

    #[test]
    fn area_is_taken_literally() {
        let area = Rect::new(-100, 500, 5000, 200);
        assert_eq!(route(&DrawMode::Area(area), &side_by_side()), vec![area]);
    }

    #[test]
    fn stretch_routes_to_root() {
        assert_eq!(
            route(&DrawMode::Stretch, &side_by_side()),
            vec![Rect::new(0, 0, 3840, 1080)]
        );
    }

    #[test]
    fn each_monitor_follows_topology_order() {
        let topology = side_by_side();
        let routed = route(&DrawMode::EachMonitor, &topology);
        assert_eq!(routed.len(), topology.monitors().len());
        assert_eq!(routed, vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
    }

    #[test]
    fn stretch_splits_frame_between_outputs() {
        let topology = side_by_side();
        let destinations = route(&DrawMode::Stretch, &topology);
        let placed = placements(&destinations, &topology, (1280, 720));

        assert_eq!(placed.len(), 2);

        assert_eq!(placed[0].output, 0);
        assert_eq!(placed[0].position, (0, 0));
        assert_eq!(placed[0].size, (1920, 1080));
        assert_eq!(
            placed[0].source,
            SourceCrop {
                x: 0.0,
                y: 0.0,
                width: 640.0,
                height: 720.0
            }
        );

        assert_eq!(placed[1].output, 1);
        assert_eq!(placed[1].position, (0, 0));
        assert_eq!(placed[1].source.x, 640.0);
        assert_eq!(placed[1].source.x + placed[1].source.width, 1280.0);
    }

    #[test]
    fn each_monitor_shows_whole_frame_everywhere() {
        let topology = side_by_side();
        let destinations = route(&DrawMode::EachMonitor, &topology);
        let placed = placements(&destinations, &topology, (640, 360));

        assert_eq!(placed.len(), 2);
        for placement in placed {
            assert_eq!(placement.position, (0, 0));
            assert_eq!(placement.size, (1920, 1080));
            assert_eq!(
                placement.source,
                SourceCrop {
                    x: 0.0,
                    y: 0.0,
                    width: 640.0,
                    height: 360.0
                }
            );
        }
    }

    #[test]
    fn area_is_clipped_to_monitors() {
        let topology = side_by_side();
        let area = Rect::new(1820, -100, 200, 200);
        let placed = placements(&[area], &topology, (200, 200));

        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].position, (1820, 0));
        assert_eq!(placed[0].size, (100, 100));
        assert_eq!(
            placed[0].source,
            SourceCrop {
                x: 0.0,
                y: 100.0,
                width: 100.0,
                height: 100.0
            }
        );
        assert_eq!(placed[1].position, (0, 0));
        assert_eq!(placed[1].source.x, 100.0);
    }

    #[test]
    fn offscreen_area_has_no_placements() {
        let area = Rect::new(10_000, 10_000, 100, 100);
        assert!(placements(&[area], &side_by_side(), (100, 100)).is_empty());
    }
}
