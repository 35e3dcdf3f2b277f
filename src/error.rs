// SPDX-License-Identifier: MPL-2.0

//! Error kinds, from recoverable per-frame failures up to fatal setup errors.

use std::path::PathBuf;

use loopwall_config::ConfigError;
use sctk::reexports::client::{
    ConnectError, DispatchError,
    globals::{BindError, GlobalError},
};

/// The video could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("video file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unsupported video {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("failed to initialize GStreamer")]
    Init(#[from] gstreamer::glib::Error),
    #[error("failed to build decode pipeline: {0}")]
    Pipeline(String),
}

/// A single frame failed somewhere between decode and upload.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame {index} could not be decoded: {reason}")]
    Decode { index: u64, reason: String },
    #[error("frames with {0} channels are not supported, expected 3")]
    ChannelCount(u32),
    #[error("frame has no pixels")]
    Empty,
    #[error("frame data too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("texture upload failed: {0}")]
    UploadFailed(String),
}

/// The compositor or one of its globals is unavailable.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("failed to connect to the Wayland compositor")]
    Connect(#[from] ConnectError),
    #[error("failed to read the Wayland registry")]
    Registry(#[from] GlobalError),
    #[error("required Wayland global is missing")]
    Global(#[from] BindError),
    #[error("Wayland dispatch failed")]
    Dispatch(#[from] DispatchError),
    #[error("the compositor reports no monitors")]
    NoMonitors,
    #[error("failed to create background surfaces: {0}")]
    Surface(String),
    #[error("event loop failure: {0}")]
    EventLoop(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no frames could be prepared for playback")]
    NoFrames,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}
