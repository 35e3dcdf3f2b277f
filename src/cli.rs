// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::Parser;
use loopwall_config::{Config, ConfigError, DrawMode};

#[derive(Debug, Parser)]
#[command(name = "loopwall")]
#[command(about = "Play a video as a looping desktop background", long_about = None)]
#[command(version)]
pub struct Args {
    /// Video file to play
    pub video: Option<PathBuf>,

    /// Where to draw: monitor=<index>, area=<w>x<h>+<x>+<y>, stretch or each
    #[arg(short, long)]
    pub mode: Option<DrawMode>,

    /// Frame rate override, in frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Stop preparing after this many frames
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// Save the first converted frame to this image file (PNG or BMP)
    #[arg(long, value_name = "PATH")]
    pub dump_frame: Option<PathBuf>,

    /// Configuration file to use instead of the default one
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the detected monitors and exit
    #[arg(long)]
    pub list_monitors: bool,
}

impl Args {
    /// Reads the configuration file and applies the command line on top.
    pub fn config(&self) -> Result<Config, ConfigError> {
        let file = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        Ok(self.apply(file))
    }

    /// Command line values win over `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(video) = &self.video {
            config = config.source(video.clone());
        }
        if let Some(mode) = self.mode {
            config = config.mode(mode);
        }
        if let Some(fps) = self.fps {
            config = config.frame_rate(fps);
        }
        if let Some(max_frames) = self.max_frames {
            config = config.max_frames(max_frames);
        }
        config
    }
}
