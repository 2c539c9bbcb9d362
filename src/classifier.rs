// src/classifier.rs
//
// Rule-based role assignment for motion regions.
//
// Rules are evaluated in a fixed order and the first match wins:
//   1. Skin overlap above threshold     → Left/Right hand (by frame midline)
//   2. Centre inside the bottom band    → Conveyor if large enough, else Unknown
//   3. Very large region                → Fixture if the tracker says it is
//                                         stationary, else Unknown
//   4. Medium-sized region              → DUT
//   5. Anything else                    → Unknown
//
// Stationarity needs motion history, which only the tracker owns. It is
// answered through the read-only `StationarityQuery` trait so the classifier
// never holds a reference into tracker state across frames.

use crate::detection::{DetectedRegions, Region};
use crate::types::{BoundingBox, ObjectRole, Point};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum fraction of a region's box covered by a skin box to call it a hand
    pub hand_detection_threshold: f32,
    /// Regions centred below this fraction of frame height are on the conveyor
    pub conveyor_y_position_ratio: f32,
    pub conveyor_min_area: f32,
    pub fixture_min_area: f32,
    /// DUT area band, exclusive on both ends
    pub dut_min_area: f32,
    pub dut_max_area: f32,
    pub conveyor_confidence: f32,
    pub fixture_confidence: f32,
    pub dut_confidence: f32,
    pub unknown_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hand_detection_threshold: 0.6,
            conveyor_y_position_ratio: 0.7,
            conveyor_min_area: 5000.0,
            fixture_min_area: 10_000.0,
            dut_min_area: 1000.0,
            dut_max_area: 10_000.0,
            conveyor_confidence: 0.7,
            fixture_confidence: 0.6,
            dut_confidence: 0.7,
            unknown_confidence: 0.5,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Read-only motion-history query answered by whoever tracks entities.
pub trait StationarityQuery {
    /// True when the entity nearest to `center` has barely moved recently.
    fn is_region_stationary(&self, center: Point, frame_index: u64) -> bool;
}

/// A motion region with its assigned role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRegion {
    pub bbox: BoundingBox,
    /// Component pixel count
    pub area: u32,
    pub center: Point,
    pub role: ObjectRole,
    pub confidence: f32,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify every motion region of a frame, preserving input order.
    pub fn classify(
        &self,
        regions: &DetectedRegions,
        frame_width: usize,
        frame_height: usize,
        frame_index: u64,
        stationarity: &dyn StationarityQuery,
    ) -> Vec<ClassifiedRegion> {
        regions
            .motion
            .iter()
            .map(|region| {
                let (role, confidence) = self.classify_region(
                    region,
                    &regions.skin,
                    frame_width,
                    frame_height,
                    frame_index,
                    stationarity,
                );
                ClassifiedRegion {
                    bbox: region.bbox,
                    area: region.area,
                    center: region.bbox.center(),
                    role,
                    confidence,
                }
            })
            .collect()
    }

    fn classify_region(
        &self,
        region: &Region,
        skin: &[BoundingBox],
        frame_width: usize,
        frame_height: usize,
        frame_index: u64,
        stationarity: &dyn StationarityQuery,
    ) -> (ObjectRole, f32) {
        let cfg = &self.config;
        let center = region.bbox.center();
        let area = region.area as f32;

        let overlap = skin
            .iter()
            .map(|s| region.bbox.coverage_by(s))
            .fold(0.0f32, f32::max);
        if overlap > cfg.hand_detection_threshold {
            let role = if center.x < frame_width as f32 * 0.5 {
                ObjectRole::LeftHand
            } else {
                ObjectRole::RightHand
            };
            return (role, overlap);
        }

        if center.y > frame_height as f32 * cfg.conveyor_y_position_ratio {
            return if area > cfg.conveyor_min_area {
                (ObjectRole::Conveyor, cfg.conveyor_confidence)
            } else {
                (ObjectRole::Unknown, cfg.unknown_confidence)
            };
        }

        if area > cfg.fixture_min_area {
            return if stationarity.is_region_stationary(center, frame_index) {
                (ObjectRole::Fixture, cfg.fixture_confidence)
            } else {
                (ObjectRole::Unknown, cfg.unknown_confidence)
            };
        }

        if area > cfg.dut_min_area && area < cfg.dut_max_area {
            return (ObjectRole::Dut, cfg.dut_confidence);
        }

        (ObjectRole::Unknown, cfg.unknown_confidence)
    }
}
