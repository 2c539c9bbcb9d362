// src/detection/skin.rs
//
// Fixed-range skin segmentation in YCrCb space.
//
// Skin tones cluster tightly in the chroma plane regardless of brightness,
// so only Cr and Cb are bounded and luma spans its full range.

use serde::{Deserialize, Serialize};

#[cfg(feature = "video")]
use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Inclusive chroma window accepted as skin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinRange {
    pub cr_min: u8,
    pub cr_max: u8,
    pub cb_min: u8,
    pub cb_max: u8,
}

impl Default for SkinRange {
    fn default() -> Self {
        Self {
            cr_min: 133,
            cr_max: 173,
            cb_min: 77,
            cb_max: 127,
        }
    }
}

#[cfg(feature = "video")]
impl SkinRange {
    /// Lower (Y, Cr, Cb) bound in OpenCV channel order
    fn lower(&self) -> Scalar {
        Scalar::new(0.0, self.cr_min as f64, self.cb_min as f64, 0.0)
    }

    fn upper(&self) -> Scalar {
        Scalar::new(255.0, self.cr_max as f64, self.cb_max as f64, 0.0)
    }
}

// ============================================================================
// MASK
// ============================================================================

/// Raw (uncleaned) skin mask of an RGB frame, CV_8UC1 with 0 or 255.
#[cfg(feature = "video")]
pub fn skin_mask(frame: &Mat, range: &SkinRange) -> opencv::Result<Mat> {
    let mut ycrcb = Mat::default();
    imgproc::cvt_color_def(frame, &mut ycrcb, imgproc::COLOR_RGB2YCrCb)?;

    let mut mask = Mat::default();
    core::in_range(&ycrcb, &range.lower(), &range.upper(), &mut mask)?;
    Ok(mask)
}
