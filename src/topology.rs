// SPDX-License-Identifier: MPL-2.0

//! Monitor geometry as reported by the compositor.

use loopwall_config::Rect;
use sctk::{
    output::{OutputInfo, OutputState},
    reexports::client::protocol::wl_output::WlOutput,
};

use crate::error::SurfaceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub name: String,
    pub rect: Rect,
}

/// Monitors in the compositor's enumeration order, plus their bounding box.
///
/// Indices are stable for the lifetime of the process; hotplugged outputs
/// are not added after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTopology {
    monitors: Vec<Monitor>,
    root: Rect,
}

impl DisplayTopology {
    /// Returns `None` when there are no monitors.
    #[must_use]
    pub fn new(monitors: Vec<Monitor>) -> Option<Self> {
        let root = monitors
            .iter()
            .map(|m| m.rect)
            .reduce(|bounds, rect| bounds.union(&rect))?;

        Some(Self { monitors, root })
    }

    #[must_use]
    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    /// Bounding rectangle of the whole desktop.
    #[must_use]
    pub fn root(&self) -> Rect {
        self.root
    }
}

/// Reads the geometry of every output known to `output_state`.
///
/// The returned outputs are in the same order as the topology's monitors.
pub fn resolve(output_state: &OutputState) -> Result<(DisplayTopology, Vec<WlOutput>), SurfaceError> {
    let mut monitors = Vec::new();
    let mut outputs = Vec::new();

    for output in output_state.outputs() {
        let Some(info) = output_state.info(&output) else {
            continue;
        };

        let rect = logical_rect(&info);
        let name = info
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {}", info.make, info.model));

        if rect.is_empty() {
            tracing::warn!(output = name, "ignoring output without a size");
            continue;
        }

        tracing::info!(
            index = monitors.len(),
            output = name,
            geometry = %rect,
            "found monitor"
        );

        monitors.push(Monitor { name, rect });
        outputs.push(output);
    }

    let topology = DisplayTopology::new(monitors).ok_or(SurfaceError::NoMonitors)?;
    tracing::debug!(root = %topology.root(), "desktop bounds");

    Ok((topology, outputs))
}

fn logical_rect(info: &OutputInfo) -> Rect {
    let (x, y) = info.logical_position.unwrap_or(info.location);

    let (width, height) = info.logical_size.unwrap_or_else(|| {
        let scale = info.scale_factor.max(1);
        info.modes
            .iter()
            .find(|mode| mode.current)
            .map_or((0, 0), |mode| {
                (mode.dimensions.0 / scale, mode.dimensions.1 / scale)
            })
    });

    Rect::new(x, y, width.max(0) as u32, height.max(0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(name: &str, rect: Rect) -> Monitor {
        Monitor {
            name: name.to_owned(),
            rect,
        }
    }

    #[test]
    fn root_is_the_union_of_monitors() {
        let topology = DisplayTopology::new(vec![
            monitor("DP-1", Rect::new(0, 0, 2560, 1440)),
            monitor("HDMI-A-1", Rect::new(2560, 360, 1920, 1080)),
        ])
        .unwrap();

        assert_eq!(topology.root(), Rect::new(0, 0, 4480, 1440));
    }

    #[test]
    fn keeps_enumeration_order() {
        let topology = DisplayTopology::new(vec![
            monitor("HDMI-A-1", Rect::new(1920, 0, 1920, 1080)),
            monitor("DP-1", Rect::new(0, 0, 1920, 1080)),
        ])
        .unwrap();

        let names: Vec<_> = topology.monitors().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["HDMI-A-1", "DP-1"]);
    }

    #[test]
    fn empty_topology_is_rejected() {
        assert_eq!(DisplayTopology::new(Vec::new()), None);
    }
}
