// src/types.rs
//
// Shared value types passed between the detection, tracking and motion
// subsystems. Everything here is plain data and serializable so callers can
// dump per-frame snapshots or end-of-stream results without extra mapping.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ============================================================================
// FRAMES
// ============================================================================

/// Decoded frame handed over by the frame source.
/// Row-major interleaved RGB, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Solid-colour frame, mostly useful for synthetic streams.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height)
    }

    /// Paint an axis-aligned rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, rect: BoundingBox, rgb: [u8; 3]) {
        let x0 = rect.x.max(0) as usize;
        let y0 = rect.y.max(0) as usize;
        let x1 = (rect.right().max(0) as usize).min(self.width);
        let y1 = (rect.bottom().max(0) as usize).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = (y * self.width + x) * 3;
                self.data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Reject buffers that cannot be interpreted as a width x height RGB image.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let expected = self.width * self.height * 3;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(AnalysisError::MalformedFrame {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Copy into an 8-bit 3-channel OpenCV matrix. Channel order stays RGB.
    #[cfg(feature = "video")]
    pub fn to_mat(&self) -> opencv::Result<opencv::core::Mat> {
        use opencv::{core::Mat, prelude::*};

        let flat = Mat::from_slice(&self.data)?;
        let mat = flat.reshape(3, self.height as i32)?;
        mat.try_clone()
    }
}

/// Nominal properties of the stream, supplied by the caller up front.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StreamInfo {
    pub fps: f64,
    pub total_frames: u64,
    pub width: usize,
    pub height: usize,
}

impl StreamInfo {
    /// Timestamp in seconds of a frame index; 0 when the frame rate is unusable.
    pub fn timestamp_of(&self, frame_index: u64) -> f64 {
        if self.fps > 0.0 && self.fps.is_finite() {
            frame_index as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.timestamp_of(self.total_frames)
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned box in pixel space: (x, y) is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + self.width as f32 * 0.5,
            self.y as f32 + self.height as f32 * 0.5,
        )
    }

    pub fn area(&self) -> u32 {
        (self.width.max(0) as u32) * (self.height.max(0) as u32)
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height > 0 {
            self.width as f32 / self.height as f32
        } else {
            0.0
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> u32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > left && bottom > top {
            ((right - left) * (bottom - top)) as u32
        } else {
            0
        }
    }

    /// Fraction of this box covered by `other` (intersection / own area).
    pub fn coverage_by(&self, other: &BoundingBox) -> f32 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f32 / area as f32
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// Semantic role of a tracked entity at the workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectRole {
    Dut,
    LeftHand,
    RightHand,
    Conveyor,
    Fixture,
    Unknown,
}

impl ObjectRole {
    pub const ALL: [ObjectRole; 6] = [
        Self::Dut,
        Self::LeftHand,
        Self::RightHand,
        Self::Conveyor,
        Self::Fixture,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dut => "DUT",
            Self::LeftHand => "Left Hand",
            Self::RightHand => "Right Hand",
            Self::Conveyor => "Conveyor Belt",
            Self::Fixture => "Fixture",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_hand(&self) -> bool {
        matches!(self, Self::LeftHand | Self::RightHand)
    }
}

// ============================================================================
// MOTION EVENTS / ACTIVITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionSeverity {
    Moderate,
    High,
}

impl MotionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moderate => "moderate_motion",
            Self::High => "high_motion",
        }
    }
}

/// One sampled frame whose luminance changed noticeably since the previous sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub frame_index: u64,
    pub timestamp_secs: f64,
    /// Mean absolute grayscale difference over the ROI
    pub score: f32,
    pub severity: MotionSeverity,
    /// Thresholded moving sub-regions of the ROI
    pub regions: Vec<BoundingBox>,
    pub moving_area: u32,
}

/// Contiguous run of motion events separated by less than the gap threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPeriod {
    pub start_secs: f64,
    pub end_secs: f64,
    pub duration_secs: f64,
    pub events: Vec<MotionEvent>,
}

impl ActivityPeriod {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn peak_score(&self) -> f32 {
        self.events.iter().map(|e| e.score).fold(0.0, f32::max)
    }
}

// ============================================================================
// INSTRUCTIONS
// ============================================================================

/// Expected assembly step, produced by the instruction analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionStep {
    pub step_number: u32,
    pub title: String,
    #[serde(default)]
    pub parts_used: Vec<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub slide_number: Option<u32>,
}

impl InstructionStep {
    pub fn new(step_number: u32, title: impl Into<String>) -> Self {
        Self {
            step_number,
            title: title.into(),
            parts_used: Vec::new(),
            tools_used: Vec::new(),
            actions: Vec::new(),
            slide_number: None,
        }
    }
}
