// src/detection/background.rs
//
// Background subtraction for a fixed camera, backed by OpenCV's MOG2.
//
// Shadow detection is off, so the mask holds only 0 and 255. The learning
// rate is fixed rather than MOG2's automatic 1/min(2n, history) ramp, which
// absorbs a part resting on the bench within a few frames. At the default
// rate a new object stays foreground for roughly 50 frames.

use serde::{Deserialize, Serialize};

#[cfg(feature = "video")]
use opencv::{
    core::{self, Mat, Ptr},
    prelude::*,
    video::{self, BackgroundSubtractorMOG2},
};
#[cfg(feature = "video")]
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Number of frames the mixture remembers
    pub history: u32,
    /// Squared Mahalanobis distance threshold for foreground
    pub var_threshold: f32,
    /// Per-frame learning rate in (0, 1]
    pub learning_rate: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            learning_rate: 0.002,
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

#[cfg(feature = "video")]
pub struct BackgroundModel {
    config: BackgroundConfig,
    mog2: Ptr<BackgroundSubtractorMOG2>,
    frames_seen: u64,
}

#[cfg(feature = "video")]
impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> opencv::Result<Self> {
        let mog2 = Self::subtractor(&config)?;
        Ok(Self {
            config,
            mog2,
            frames_seen: 0,
        })
    }

    fn subtractor(config: &BackgroundConfig) -> opencv::Result<Ptr<BackgroundSubtractorMOG2>> {
        video::create_background_subtractor_mog2(
            config.history as i32,
            config.var_threshold as f64,
            false,
        )
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn reset(&mut self) -> opencv::Result<()> {
        self.mog2 = Self::subtractor(&self.config)?;
        self.frames_seen = 0;
        Ok(())
    }

    /// Foreground mask (CV_8UC1, 0 or 255) of an RGB frame; updates the model.
    /// The first frame only seeds the mixture and yields an empty mask.
    pub fn apply(&mut self, frame: &Mat) -> opencv::Result<Mat> {
        let mut fg_mask = Mat::default();
        BackgroundSubtractorTrait::apply(
            &mut self.mog2,
            frame,
            &mut fg_mask,
            self.config.learning_rate,
        )?;
        self.frames_seen += 1;

        if self.frames_seen == 1 {
            debug!("Background model seeded from {}x{} frame", frame.cols(), frame.rows());
            return Mat::new_rows_cols_with_default(
                frame.rows(),
                frame.cols(),
                core::CV_8UC1,
                core::Scalar::all(0.0),
            );
        }
        Ok(fg_mask)
    }
}

#[cfg(all(test, feature = "video"))]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Frame};

    const GRAY: [u8; 3] = [40, 40, 40];
    const GREEN: [u8; 3] = [0, 200, 0];

    fn foreground(model: &mut BackgroundModel, frame: &Frame) -> i32 {
        let mask = model.apply(&frame.to_mat().unwrap()).unwrap();
        core::count_non_zero(&mask).unwrap()
    }

    #[test]
    fn test_first_frame_is_all_background() {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        assert_eq!(foreground(&mut model, &Frame::filled(32, 24, GRAY)), 0);
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn test_static_scene_stays_background() {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        let frame = Frame::filled(32, 24, GRAY);
        for i in 0..20 {
            assert_eq!(foreground(&mut model, &frame), 0, "frame {}", i);
        }
    }

    #[test]
    fn test_new_object_is_foreground() {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        let bg = Frame::filled(64, 48, GRAY);
        for _ in 0..5 {
            foreground(&mut model, &bg);
        }
        let mut frame = bg.clone();
        frame.fill_rect(BoundingBox::new(10, 10, 20, 15), GREEN);
        assert_eq!(foreground(&mut model, &frame), 300);
    }

    #[test]
    fn test_departed_object_leaves_no_ghost() {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        let bg = Frame::filled(64, 48, GRAY);
        for _ in 0..3 {
            foreground(&mut model, &bg);
        }
        let mut frame = bg.clone();
        frame.fill_rect(BoundingBox::new(10, 10, 20, 15), GREEN);
        for _ in 0..10 {
            assert_eq!(foreground(&mut model, &frame), 300);
        }
        assert_eq!(foreground(&mut model, &bg), 0, "bench is still the dominant mode");
    }

    #[test]
    fn test_long_lived_object_is_absorbed() {
        let cfg = BackgroundConfig {
            learning_rate: 0.05,
            ..Default::default()
        };
        let mut model = BackgroundModel::new(cfg).unwrap();
        let bg = Frame::filled(16, 16, GRAY);
        for _ in 0..3 {
            foreground(&mut model, &bg);
        }
        let mut frame = bg.clone();
        frame.fill_rect(BoundingBox::new(2, 2, 4, 4), GREEN);
        assert_eq!(foreground(&mut model, &frame), 16);

        let absorbed = (0..40).any(|_| foreground(&mut model, &frame) == 0);
        assert!(absorbed, "object should become part of the scene");
    }

    #[test]
    fn test_reset_reseeds() {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        let bg = Frame::filled(32, 24, GRAY);
        foreground(&mut model, &bg);
        model.reset().unwrap();
        assert_eq!(model.frames_seen(), 0);

        let mut frame = bg.clone();
        frame.fill_rect(BoundingBox::new(0, 0, 8, 8), GREEN);
        assert_eq!(foreground(&mut model, &frame), 0, "first frame after reset seeds");
    }
}
