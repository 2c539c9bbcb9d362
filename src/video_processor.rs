// src/video_processor.rs
//
// OpenCV-backed frame source for the command-line binary.

use crate::types::{Frame, StreamInfo};
use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst},
};
use std::path::Path;
use tracing::info;

pub struct VideoReader {
    cap: VideoCapture,
    info: StreamInfo,
    next_index: u64,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .with_context(|| format!("non UTF-8 video path {}", path.display()))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .with_context(|| format!("failed to open video {}", path.display()))?;

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open video file {}", path.display());
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)?;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)?;

        let info = StreamInfo {
            fps,
            total_frames: total_frames.max(0.0) as u64,
            width: width.max(0.0) as usize,
            height: height.max(0.0) as usize,
        };
        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames ({:.1}s)",
            info.width,
            info.height,
            info.fps,
            info.total_frames,
            info.duration_secs()
        );

        Ok(Self {
            cap,
            info,
            next_index: 0,
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Next decoded frame as RGB with its index, or None at end of stream.
    /// A frame that fails to decode is an error; the following call moves on.
    pub fn read_frame(&mut self) -> Result<Option<(u64, Frame)>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();
        let index = self.next_index;
        let grabbed = VideoCaptureTrait::read(&mut self.cap, &mut mat);
        if matches!(grabbed, Ok(false)) || (grabbed.is_ok() && mat.empty()) {
            return Ok(None);
        }
        // A failed decode still consumes its slot in the stream.
        self.next_index += 1;
        grabbed.with_context(|| format!("failed to decode frame {}", index))?;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color_def(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB)
            .with_context(|| format!("failed to convert frame {}", index))?;
        let width = rgb_mat.cols().max(0) as usize;
        let height = rgb_mat.rows().max(0) as usize;
        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some((index, Frame::new(data, width, height))))
    }
}
