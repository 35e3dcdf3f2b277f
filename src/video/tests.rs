// SPDX-License-Identifier: MPL-2.0

//! Preparation tests against an in-memory frame source.

use std::collections::VecDeque;

use super::*;

struct FakeSource {
    info: StreamInfo,
    frames: VecDeque<Result<SourceFrame, FrameError>>,
}

impl FakeSource {
    fn new(width: u32, height: u32, announced: Option<u64>) -> Self {
        Self {
            info: StreamInfo {
                width,
                height,
                channel_count: 3,
                frame_rate: 25,
                frame_count: announced,
            },
            frames: VecDeque::new(),
        }
    }

    /// Adds a frame whose every pixel is `(b, g, r)`.
    fn push_solid(&mut self, bgr: [u8; 3]) -> &mut Self {
        let pixels = (self.info.width * self.info.height) as usize;
        self.frames.push_back(Ok(SourceFrame {
            width: self.info.width,
            height: self.info.height,
            channel_count: 3,
            data: bgr.repeat(pixels),
        }));
        self
    }

    fn push(&mut self, frame: Result<SourceFrame, FrameError>) -> &mut Self {
        self.frames.push_back(frame);
        self
    }
}

impl FrameSource for FakeSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Result<SourceFrame, FrameError>> {
        self.frames.pop_front()
    }
}

fn keep(buffer: &ConvertedBuffer) -> Result<ConvertedBuffer, FrameError> {
    Ok(buffer.clone())
}

#[test]
fn three_frames_in_order() {
    let mut source = FakeSource::new(2, 2, Some(3));
    source
        .push_solid([10, 20, 30])
        .push_solid([40, 50, 60])
        .push_solid([70, 80, 90]);

    let video = prepare(&mut source, 25, None, keep).unwrap();

    assert_eq!(video.frame_count(), 3);
    assert_eq!(video.frame_rate(), 25);
    assert_eq!(video.size(), (2, 2));
    assert_eq!(&video.frame(0).data[..3], &[30, 20, 10]);
    assert_eq!(&video.frame(1).data[..3], &[60, 50, 40]);
    assert_eq!(&video.frame(2).data[..3], &[90, 80, 70]);
    for index in 0..3 {
        assert_eq!(video.frame(index).data.len(), 2 * 2 * 3);
    }
}

#[test]
fn partial_decode_is_not_an_error() {
    let mut source = FakeSource::new(1, 1, Some(10));
    source.push_solid([1, 2, 3]).push_solid([4, 5, 6]);

    let video = prepare(&mut source, 25, None, keep).unwrap();
    assert_eq!(video.frame_count(), 2);
}

#[test]
fn empty_stream_has_no_frames() {
    let mut source = FakeSource::new(4, 4, None);
    let err = prepare(&mut source, 25, None, keep).unwrap_err();
    assert!(matches!(err, Error::NoFrames));
}

#[test]
fn bad_frames_are_skipped() {
    let mut source = FakeSource::new(1, 1, Some(4));
    source
        .push_solid([1, 1, 1])
        .push(Err(FrameError::Decode {
            index: 1,
            reason: "corrupt".into(),
        }))
        .push(Ok(SourceFrame {
            width: 1,
            height: 1,
            channel_count: 3,
            data: vec![0; 2],
        }))
        .push_solid([2, 2, 2]);

    let video = prepare(&mut source, 25, None, keep).unwrap();
    assert_eq!(video.frame_count(), 2);
    assert_eq!(video.frame(1).data, [2, 2, 2]);
}

#[test]
fn failed_uploads_are_skipped() {
    let mut source = FakeSource::new(1, 1, None);
    source.push_solid([1, 1, 1]).push_solid([2, 2, 2]);

    let mut uploads = 0;
    let video = prepare(&mut source, 25, None, |buffer| {
        uploads += 1;
        match uploads {
            1 => Err(FrameError::UploadFailed("out of memory".into())),
            _ => keep(buffer),
        }
    })
    .unwrap();

    assert_eq!(video.frame_count(), 1);
    assert_eq!(video.frame(0).data, [2, 2, 2]);
}

#[test]
fn all_uploads_failing_has_no_frames() {
    let mut source = FakeSource::new(1, 1, None);
    source.push_solid([1, 1, 1]);

    let err = prepare(&mut source, 25, None, |_| {
        Err::<ConvertedBuffer, _>(FrameError::UploadFailed("denied".into()))
    })
    .unwrap_err();
    assert!(matches!(err, Error::NoFrames));
}

#[test]
fn four_channel_stream_is_fatal() {
    let mut source = FakeSource::new(1, 1, None);
    source.info.channel_count = 4;

    let err = prepare(&mut source, 25, None, keep).unwrap_err();
    assert!(matches!(err, Error::Frame(FrameError::ChannelCount(4))));
}

#[test]
fn four_channel_frame_is_fatal() {
    let mut source = FakeSource::new(1, 1, None);
    source.push_solid([1, 2, 3]).push(Ok(SourceFrame {
        width: 1,
        height: 1,
        channel_count: 4,
        data: vec![1, 2, 3, 4],
    }));

    let err = prepare(&mut source, 25, None, keep).unwrap_err();
    assert!(matches!(err, Error::Frame(FrameError::ChannelCount(4))));
}

#[test]
fn resized_frames_are_skipped() {
    let mut source = FakeSource::new(2, 1, None);
    source
        .push(Ok(SourceFrame {
            width: 1,
            height: 1,
            channel_count: 3,
            data: vec![1, 2, 3],
        }))
        .push_solid([4, 5, 6]);

    let video = prepare(&mut source, 25, None, keep).unwrap();
    assert_eq!(video.frame_count(), 1);
    assert_eq!(video.frame(0).data, [6, 5, 4, 6, 5, 4]);
}

#[test]
fn stops_at_frame_limit() {
    let mut source = FakeSource::new(1, 1, Some(5));
    for value in 0..5 {
        source.push_solid([value; 3]);
    }

    let video = prepare(&mut source, 25, Some(2), keep).unwrap();
    assert_eq!(video.frame_count(), 2);
    assert_eq!(source.frames.len(), 3);
}

#[test]
fn zero_frame_rate_is_rejected() {
    let err = PreparedVideo::new(vec![()], 0, (1, 1)).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(loopwall_config::ConfigError::ZeroFrameRate)
    ));
}
