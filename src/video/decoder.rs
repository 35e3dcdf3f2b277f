// SPDX-License-Identifier: MPL-2.0

//! GStreamer decoding into packed BGR frames.

use std::path::{Path, PathBuf};

use gstreamer::{ClockTime, MessageView, State, prelude::*};
use tracing::{debug, info, warn};

use super::{FrameSource, SourceFrame, StreamInfo};
use crate::error::{FrameError, SourceError};

/// Preroll must finish within this time, or the file is considered unplayable.
const PREROLL_TIMEOUT_SECS: u64 = 10;

/// Decodes a local video file front to back, one frame per call.
///
/// The pipeline runs unsynchronized, so frames are produced as fast as the
/// decoder allows. Once the stream ends the decoder stays exhausted.
pub struct Decoder {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    info: StreamInfo,
    path: PathBuf,
    produced: u64,
    finished: bool,
}

impl Decoder {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }

        gstreamer::init()?;

        let path_str = path.to_str().ok_or_else(|| SourceError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".into(),
        })?;

        let escaped_path = path_str.replace('\\', "\\\\").replace('"', "\\\"");
        let pipeline_str = format!(
            concat!(
                "filesrc location=\"{path}\" ! ",
                "decodebin ! ",
                "videoconvert ! ",
                "video/x-raw,format=BGR ! ",
                "appsink name=sink sync=false max-buffers=8"
            ),
            path = escaped_path,
        );

        debug!(pipeline = %pipeline_str, "creating GStreamer pipeline");

        let pipeline = gstreamer::parse::launch(&pipeline_str)
            .map_err(|why| SourceError::Pipeline(why.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| SourceError::Pipeline("launch did not produce a pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| SourceError::Pipeline("pipeline has no appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| SourceError::Pipeline("element 'sink' is not an AppSink".into()))?;

        let mut decoder = Self {
            pipeline,
            appsink,
            info: StreamInfo {
                width: 0,
                height: 0,
                channel_count: 0,
                frame_rate: 0,
                frame_count: None,
            },
            path: path.to_path_buf(),
            produced: 0,
            finished: false,
        };

        decoder.info = decoder.preroll()?;

        info!(
            path = %path.display(),
            width = decoder.info.width,
            height = decoder.info.height,
            fps = decoder.info.frame_rate,
            frames = ?decoder.info.frame_count,
            "opened video"
        );

        decoder
            .pipeline
            .set_state(State::Playing)
            .map_err(|why| SourceError::Pipeline(format!("failed to start decoding: {why}")))?;

        Ok(decoder)
    }

    /// Pauses the pipeline until caps are negotiated and reads the stream
    /// properties from them.
    fn preroll(&self) -> Result<StreamInfo, SourceError> {
        let unsupported = |reason: String| SourceError::UnsupportedFormat {
            path: self.path.clone(),
            reason,
        };

        let paused = self.pipeline.set_state(State::Paused);
        let (result, _, _) = self
            .pipeline
            .state(ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
        if paused.is_err() || result.is_err() {
            return Err(unsupported(
                self.bus_error()
                    .unwrap_or_else(|| "pipeline failed to preroll".into()),
            ));
        }

        let caps = self
            .appsink
            .static_pad("sink")
            .and_then(|pad| pad.current_caps())
            .ok_or_else(|| unsupported("no video stream found".into()))?;

        debug!(caps = %caps, "negotiated caps");

        let video_info = gstreamer_video::VideoInfo::from_caps(&caps)
            .map_err(|why| unsupported(format!("unusable caps: {why}")))?;

        let fps = video_info.fps();
        let frame_rate = integer_fps(fps.numer(), fps.denom());

        let frame_count = self
            .pipeline
            .query_duration::<ClockTime>()
            .and_then(|duration| {
                frame_count_from_duration(duration.nseconds(), fps.numer(), fps.denom())
            });

        let channel_count = video_info
            .format_info()
            .pixel_stride()
            .first()
            .map_or(0, |&stride| stride.max(0) as u32);

        Ok(StreamInfo {
            width: video_info.width(),
            height: video_info.height(),
            channel_count,
            frame_rate,
            frame_count,
        })
    }

    /// Drains the bus, logging anything noteworthy, and returns the first
    /// error message found.
    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let mut first_error = None;

        while let Some(msg) = bus.pop() {
            match msg.view() {
                MessageView::Error(err) => {
                    warn!(
                        src = ?err.src().map(|s| s.path_string()),
                        error = %err.error(),
                        debug = ?err.debug(),
                        "GStreamer pipeline error"
                    );
                    first_error.get_or_insert_with(|| err.error().to_string());
                }
                MessageView::Warning(warning) => {
                    warn!(
                        src = ?warning.src().map(|s| s.path_string()),
                        error = %warning.error(),
                        "GStreamer pipeline warning"
                    );
                }
                _ => {}
            }
        }

        first_error
    }

    fn finish(&mut self) {
        self.finished = true;

        if let Some(reason) = self.bus_error() {
            warn!(frame = self.produced, %reason, "decoding stopped early");
        }

        match self.info.frame_count {
            Some(expected) if self.produced < expected => warn!(
                decoded = self.produced,
                expected, "stream ended before the announced frame count"
            ),
            _ => debug!(decoded = self.produced, "end of stream"),
        }
    }

    fn read_sample(&self, sample: &gstreamer::Sample, index: u64) -> Result<SourceFrame, FrameError> {
        let decode_error = |reason: &str| FrameError::Decode {
            index,
            reason: reason.to_owned(),
        };

        let buffer = sample.buffer().ok_or_else(|| decode_error("sample has no buffer"))?;
        let caps = sample.caps().ok_or_else(|| decode_error("sample has no caps"))?;
        let video_info = gstreamer_video::VideoInfo::from_caps(caps)
            .map_err(|_| decode_error("sample caps are not raw video"))?;

        let (offset, stride) = match buffer.meta::<gstreamer_video::VideoMeta>() {
            Some(meta) => (
                meta.offset().first().copied(),
                meta.stride().first().copied(),
            ),
            None => (
                video_info.offset().first().copied(),
                video_info.stride().first().copied(),
            ),
        };
        let offset = offset.unwrap_or(0);
        let stride = stride
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(|| decode_error("negative row stride"))?;

        let map = buffer
            .map_readable()
            .map_err(|_| decode_error("buffer could not be mapped"))?;

        let channel_count = self.info.channel_count;
        let row_bytes = video_info.width() as usize * channel_count as usize;
        let data = pack_rows(
            map.as_slice(),
            offset,
            stride,
            row_bytes,
            video_info.height() as usize,
        )?;

        Ok(SourceFrame {
            width: video_info.width(),
            height: video_info.height(),
            channel_count,
            data,
        })
    }
}

impl FrameSource for Decoder {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Result<SourceFrame, FrameError>> {
        if self.finished {
            return None;
        }

        let Ok(sample) = self.appsink.pull_sample() else {
            self.finish();
            return None;
        };

        let index = self.produced;
        self.produced += 1;

        Some(self.read_sample(&sample, index))
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        if let Err(why) = self.pipeline.set_state(State::Null) {
            warn!(?why, "failed to stop video pipeline");
        }
    }
}

/// Rounds a GStreamer frame rate to whole frames per second.
///
/// Unknown or variable rates (`0/1`) give 0.
pub(crate) fn integer_fps(numer: i32, denom: i32) -> u32 {
    if numer <= 0 || denom <= 0 {
        return 0;
    }

    let (numer, denom) = (i64::from(numer), i64::from(denom));
    u32::try_from((numer + denom / 2) / denom).unwrap_or(u32::MAX)
}

/// Number of frames in a stream of `duration_ns`, rounded to the nearest frame.
pub(crate) fn frame_count_from_duration(duration_ns: u64, numer: i32, denom: i32) -> Option<u64> {
    if numer <= 0 || denom <= 0 {
        return None;
    }

    let numerator = u128::from(duration_ns) * numer as u128;
    let denominator = denom as u128 * 1_000_000_000;
    u64::try_from((numerator + denominator / 2) / denominator).ok()
}

/// Copies `height` rows of `row_bytes` out of a padded plane into one
/// contiguous buffer.
pub(crate) fn pack_rows(
    plane: &[u8],
    offset: usize,
    stride: usize,
    row_bytes: usize,
    height: usize,
) -> Result<Vec<u8>, FrameError> {
    let expected = row_bytes * height;

    if stride < row_bytes {
        return Err(FrameError::Truncated {
            expected,
            actual: stride * height,
        });
    }

    let needed = match height {
        0 => offset,
        _ => offset + stride * (height - 1) + row_bytes,
    };
    if plane.len() < needed {
        return Err(FrameError::Truncated {
            expected: needed,
            actual: plane.len(),
        });
    }

    if stride == row_bytes {
        return Ok(plane[offset..offset + expected].to_vec());
    }

    let mut packed = Vec::with_capacity(expected);
    for row in 0..height {
        let start = offset + row * stride;
        packed.extend_from_slice(&plane[start..start + row_bytes]);
    }

    Ok(packed)
}
