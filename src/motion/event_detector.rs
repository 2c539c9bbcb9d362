// src/motion/event_detector.rs
//
// Frame-differencing motion events over the operator area.
//
// Every `frame_skip`-th frame is sampled. Only the top `roi_top_ratio` of the
// frame is analysed (the band where hands work above the bench). The sampled
// ROI is converted to grayscale and compared with the previous sample:
//
//   score = mean |gray_t - gray_{t-1}|   over the ROI
//
// A score above `motion_event_threshold` produces a MotionEvent. The per-pixel
// difference is also thresholded at `motion_threshold`, dilated and split into
// contours so consumers can see where in the ROI the motion was.
//
// State is a single grayscale ROI (the previous sample).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::MotionEvent;

#[cfg(feature = "video")]
use crate::detection::find_regions;
#[cfg(feature = "video")]
use crate::types::{MotionSeverity, StreamInfo};
#[cfg(feature = "video")]
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
#[cfg(feature = "video")]
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Sample frames whose index is a multiple of this
    pub frame_skip: u32,
    /// Fraction of frame height, from the top, that is analysed
    pub roi_top_ratio: f32,
    /// Mean difference above which a sample is a motion event
    pub motion_event_threshold: f32,
    /// Mean difference above which an event is high severity
    pub high_motion_threshold: f32,
    /// Per-pixel difference that counts as moving
    pub motion_threshold: f32,
    /// Moving regions must exceed this many pixels
    pub contour_min_area: f32,
    /// 3x3 dilation passes applied to the per-pixel mask
    pub dilate_iterations: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            frame_skip: 3,
            roi_top_ratio: 0.48,
            motion_event_threshold: 10.0,
            high_motion_threshold: 30.0,
            motion_threshold: 25.0,
            contour_min_area: 1000.0,
            dilate_iterations: 2,
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[cfg(feature = "video")]
pub struct MotionEventDetector {
    config: MotionConfig,
    stream: StreamInfo,
    prev_roi: Option<Mat>,
    dilate_kernel: Mat,
}

#[cfg(feature = "video")]
impl MotionEventDetector {
    pub fn new(config: MotionConfig, stream: StreamInfo) -> opencv::Result<Self> {
        let dilate_kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            core::Size::new(3, 3),
            core::Point::new(-1, -1),
        )?;
        Ok(Self {
            config,
            stream,
            prev_roi: None,
            dilate_kernel,
        })
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn is_sample_frame(&self, frame_index: u64) -> bool {
        frame_index % self.config.frame_skip.max(1) as u64 == 0
    }

    /// Feed one RGB frame. Non-sampled frames are ignored; the first sample
    /// only primes the reference ROI.
    pub fn observe(&mut self, frame_index: u64, frame: &Mat) -> opencv::Result<Option<MotionEvent>> {
        if !self.is_sample_frame(frame_index) {
            return Ok(None);
        }

        let roi = self.gray_roi(frame)?;
        let event = match self.prev_roi.as_ref() {
            Some(prev) if prev.size()? == roi.size()? => self.compare(frame_index, prev, &roi)?,
            Some(_) => {
                debug!("Motion ROI size changed at frame {}, re-priming", frame_index);
                None
            }
            None => None,
        };
        self.prev_roi = Some(roi);
        Ok(event)
    }

    /// Top `roi_top_ratio` rows of the frame in grayscale, at least one row.
    fn gray_roi(&self, frame: &Mat) -> opencv::Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_RGB2GRAY)?;

        let rows = gray.rows();
        let roi_rows = ((rows as f32 * self.config.roi_top_ratio) as i32).clamp(1, rows.max(1));
        let roi = Mat::roi(&gray, core::Rect::new(0, 0, gray.cols(), roi_rows))?;
        roi.try_clone()
    }

    fn compare(
        &self,
        frame_index: u64,
        prev: &Mat,
        roi: &Mat,
    ) -> opencv::Result<Option<MotionEvent>> {
        let mut diff = Mat::default();
        core::absdiff(roi, prev, &mut diff)?;
        let score = core::mean_def(&diff)?[0] as f32;
        if score <= self.config.motion_event_threshold {
            return Ok(None);
        }

        let severity = if score > self.config.high_motion_threshold {
            MotionSeverity::High
        } else {
            MotionSeverity::Moderate
        };

        let mut moving = Mat::default();
        imgproc::threshold(
            &diff,
            &mut moving,
            self.config.motion_threshold as f64,
            255.0,
            imgproc::THRESH_BINARY,
        )?;
        let mut dilated = Mat::default();
        imgproc::dilate(
            &moving,
            &mut dilated,
            &self.dilate_kernel,
            core::Point::new(-1, -1),
            self.config.dilate_iterations as i32,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        let regions: Vec<_> = find_regions(&dilated)?
            .into_iter()
            .filter(|r| r.area as f32 > self.config.contour_min_area)
            .collect();
        let moving_area = regions.iter().map(|r| r.area).sum();

        let timestamp_secs = self.stream.timestamp_of(frame_index);
        debug!(
            "Motion event at frame {} ({:.2}s): score={:.1} {} regions={}",
            frame_index,
            timestamp_secs,
            score,
            severity.as_str(),
            regions.len()
        );

        Ok(Some(MotionEvent {
            frame_index,
            timestamp_secs,
            score,
            severity,
            regions: regions.into_iter().map(|r| r.bbox).collect(),
            moving_area,
        }))
    }

    pub fn reset(&mut self) {
        self.prev_roi = None;
    }
}

/// Up to `max` events with the highest scores, strongest first.
/// Ties keep stream order.
pub fn strongest_events(events: &[MotionEvent], max: usize) -> Vec<&MotionEvent> {
    let mut sorted: Vec<&MotionEvent> = events.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    sorted.truncate(max);
    sorted
}
