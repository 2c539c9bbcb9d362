// src/detection/region_detector.rs
//
// Per-frame candidate extraction: foreground (motion) regions from the
// background model and skin regions from the YCrCb mask. Both masks are
// cleaned with an opening followed by a closing before contours are
// extracted and filtered by area.

use super::background::BackgroundConfig;
use super::contours::Region;
use super::skin::SkinRange;
use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};

#[cfg(feature = "video")]
use super::{background::BackgroundModel, contours::find_regions, skin::skin_mask};
#[cfg(feature = "video")]
use opencv::{
    core::{self, Mat},
    imgproc,
};
#[cfg(feature = "video")]
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Smallest component area (pixels) kept as a region
    pub min_object_area: f32,
    /// Largest component area (pixels) kept as a region
    pub max_object_area: f32,
    /// Skin regions must have width/height within [min, max]
    pub skin_min_aspect_ratio: f32,
    pub skin_max_aspect_ratio: f32,
    /// Side of the square element used to clean the motion mask
    pub motion_kernel_size: usize,
    /// Side of the elliptical element used to clean the skin mask
    pub skin_kernel_size: usize,
    pub skin: SkinRange,
    pub background: BackgroundConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_object_area: 500.0,
            max_object_area: 50_000.0,
            skin_min_aspect_ratio: 0.5,
            skin_max_aspect_ratio: 2.0,
            motion_kernel_size: 5,
            skin_kernel_size: 11,
            skin: SkinRange::default(),
            background: BackgroundConfig::default(),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedRegions {
    /// Foreground contours within the area band, ordered by top-left corner
    pub motion: Vec<Region>,
    /// Hand-shaped skin contours within the area band
    pub skin: Vec<BoundingBox>,
}

// ============================================================================
// DETECTOR
// ============================================================================

#[cfg(feature = "video")]
pub struct RegionDetector {
    config: DetectionConfig,
    background: BackgroundModel,
    motion_kernel: Mat,
    skin_kernel: Mat,
}

#[cfg(feature = "video")]
impl RegionDetector {
    pub fn new(config: DetectionConfig) -> opencv::Result<Self> {
        let motion_kernel = structuring_element(imgproc::MORPH_RECT, config.motion_kernel_size)?;
        let skin_kernel = structuring_element(imgproc::MORPH_ELLIPSE, config.skin_kernel_size)?;
        let background = BackgroundModel::new(config.background.clone())?;
        Ok(Self {
            config,
            background,
            motion_kernel,
            skin_kernel,
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run both detectors on a validated RGB frame. Updates the background model.
    pub fn detect(&mut self, frame: &Mat) -> opencv::Result<DetectedRegions> {
        let fg = self.background.apply(frame)?;
        let fg = open_close(&fg, &self.motion_kernel)?;
        let motion: Vec<Region> = find_regions(&fg)?
            .into_iter()
            .filter(|r| self.area_in_band(r.area))
            .collect();

        let skin_fg = skin_mask(frame, &self.config.skin)?;
        let skin_fg = open_close(&skin_fg, &self.skin_kernel)?;
        let skin: Vec<BoundingBox> = find_regions(&skin_fg)?
            .into_iter()
            .filter(|r| self.area_in_band(r.area) && self.is_hand_shaped(&r.bbox))
            .map(|r| r.bbox)
            .collect();

        if !motion.is_empty() || !skin.is_empty() {
            debug!(
                "Regions: {} motion, {} skin (frame {})",
                motion.len(),
                skin.len(),
                self.background.frames_seen()
            );
        }

        Ok(DetectedRegions { motion, skin })
    }

    pub fn reset(&mut self) -> opencv::Result<()> {
        self.background.reset()
    }

    fn area_in_band(&self, area: u32) -> bool {
        let area = area as f32;
        area >= self.config.min_object_area && area <= self.config.max_object_area
    }

    fn is_hand_shaped(&self, bbox: &BoundingBox) -> bool {
        let aspect = bbox.aspect_ratio();
        aspect >= self.config.skin_min_aspect_ratio && aspect <= self.config.skin_max_aspect_ratio
    }
}

#[cfg(feature = "video")]
fn structuring_element(shape: i32, size: usize) -> opencv::Result<Mat> {
    let side = size.max(1) as i32;
    imgproc::get_structuring_element(
        shape,
        core::Size::new(side, side),
        core::Point::new(-1, -1),
    )
}

/// Opening then closing; pixels outside the image never count as set.
#[cfg(feature = "video")]
fn open_close(mask: &Mat, kernel: &Mat) -> opencv::Result<Mat> {
    let anchor = core::Point::new(-1, -1);
    let border = imgproc::morphology_default_border_value()?;

    let mut opened = Mat::default();
    imgproc::morphology_ex(
        mask,
        &mut opened,
        imgproc::MORPH_OPEN,
        kernel,
        anchor,
        1,
        core::BORDER_CONSTANT,
        border,
    )?;
    let mut closed = Mat::default();
    imgproc::morphology_ex(
        &opened,
        &mut closed,
        imgproc::MORPH_CLOSE,
        kernel,
        anchor,
        1,
        core::BORDER_CONSTANT,
        border,
    )?;
    Ok(closed)
}
