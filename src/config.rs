// src/config.rs
//
// Engine configuration. The on-disk format is a flat YAML (or JSON) mapping
// using the historical key names (`min_object_area`, `frame_skip`, ...).
// Keys are overlaid one at a time on top of the defaults, so a single
// malformed value only reverts that field. Unknown keys are ignored.

use crate::classifier::ClassifierConfig;
use crate::comparison::ComparatorConfig;
use crate::detection::DetectionConfig;
use crate::motion::{MotionConfig, SegmenterConfig};
use crate::tracking::TrackerConfig;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub classifier: ClassifierConfig,
    pub tracker: TrackerConfig,
    pub motion: MotionConfig,
    pub segmenter: SegmenterConfig,
    pub comparator: ComparatorConfig,
}

impl EngineConfig {
    /// Load a config file. Only I/O failures are errors; content problems
    /// fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Ok(Self::from_yaml_str(&contents))
    }

    pub fn from_yaml_str(contents: &str) -> Self {
        let mut config = Self::default();
        match serde_yaml::from_str::<Value>(contents) {
            Ok(Value::Mapping(map)) => config.apply_overrides(&map),
            Ok(Value::Null) => debug!("Empty config, using defaults"),
            Ok(_) => warn!("Config root is not a mapping, using defaults"),
            Err(e) => warn!("Config could not be parsed ({}), using defaults", e),
        }
        config.validate();
        config
    }

    fn apply_overrides(&mut self, map: &Mapping) {
        let det = &mut self.detection;
        overlay(map, "min_object_area", &mut det.min_object_area);
        overlay(map, "max_object_area", &mut det.max_object_area);
        overlay(map, "skin_min_aspect_ratio", &mut det.skin_min_aspect_ratio);
        overlay(map, "skin_max_aspect_ratio", &mut det.skin_max_aspect_ratio);
        overlay(map, "var_threshold", &mut det.background.var_threshold);
        overlay(map, "background_history", &mut det.background.history);
        overlay(map, "background_learning_rate", &mut det.background.learning_rate);

        let cls = &mut self.classifier;
        overlay(map, "hand_detection_threshold", &mut cls.hand_detection_threshold);
        overlay(map, "conveyor_y_position_ratio", &mut cls.conveyor_y_position_ratio);
        overlay(map, "conveyor_min_area", &mut cls.conveyor_min_area);
        overlay(map, "fixture_min_area", &mut cls.fixture_min_area);
        overlay(map, "dut_min_area", &mut cls.dut_min_area);
        overlay(map, "dut_max_area", &mut cls.dut_max_area);

        let trk = &mut self.tracker;
        overlay(map, "dut_persistence_frames", &mut trk.dut_persistence_frames);
        overlay(map, "max_distance_threshold", &mut trk.max_distance_threshold);
        overlay(map, "fixture_motion_threshold", &mut trk.fixture_motion_threshold);
        overlay(map, "history_capacity", &mut trk.history_capacity);
        overlay(map, "kalman_process_noise", &mut trk.kalman.process_noise);
        overlay(map, "kalman_measurement_noise", &mut trk.kalman.measurement_noise);

        let mot = &mut self.motion;
        overlay(map, "motion_threshold", &mut mot.motion_threshold);
        overlay(map, "contour_min_area", &mut mot.contour_min_area);
        overlay(map, "frame_skip", &mut mot.frame_skip);
        overlay(map, "roi_top_ratio", &mut mot.roi_top_ratio);
        overlay(map, "motion_event_threshold", &mut mot.motion_event_threshold);
        overlay(map, "high_motion_threshold", &mut mot.high_motion_threshold);

        overlay(map, "activity_gap_seconds", &mut self.segmenter.gap_threshold_secs);
        overlay(map, "min_activity_duration", &mut self.segmenter.min_duration_secs);

        overlay(map, "min_step_seconds", &mut self.comparator.min_step_secs);
        overlay(map, "max_step_seconds", &mut self.comparator.max_step_secs);
    }

    /// Replace values that would disable or invert detection with defaults.
    fn validate(&mut self) {
        let d = Self::default();

        let det = &mut self.detection;
        positive(&mut det.min_object_area, d.detection.min_object_area, "min_object_area");
        positive(&mut det.max_object_area, d.detection.max_object_area, "max_object_area");
        if det.max_object_area <= det.min_object_area {
            warn!(
                "max_object_area ({}) <= min_object_area ({}), reverting both",
                det.max_object_area, det.min_object_area
            );
            det.min_object_area = d.detection.min_object_area;
            det.max_object_area = d.detection.max_object_area;
        }
        positive(&mut det.skin_min_aspect_ratio, d.detection.skin_min_aspect_ratio, "skin_min_aspect_ratio");
        positive(&mut det.skin_max_aspect_ratio, d.detection.skin_max_aspect_ratio, "skin_max_aspect_ratio");
        if det.skin_max_aspect_ratio < det.skin_min_aspect_ratio {
            warn!("skin aspect ratio band is inverted, reverting both");
            det.skin_min_aspect_ratio = d.detection.skin_min_aspect_ratio;
            det.skin_max_aspect_ratio = d.detection.skin_max_aspect_ratio;
        }
        positive(&mut det.background.var_threshold, d.detection.background.var_threshold, "var_threshold");
        nonzero(&mut det.background.history, d.detection.background.history, "background_history");
        positive_f64(&mut det.background.learning_rate, d.detection.background.learning_rate, "background_learning_rate");
        if det.background.learning_rate > 1.0 {
            warn!(
                "'background_learning_rate' must be at most 1 (got {}), using {}",
                det.background.learning_rate, d.detection.background.learning_rate
            );
            det.background.learning_rate = d.detection.background.learning_rate;
        }

        let cls = &mut self.classifier;
        unit_ratio(&mut cls.hand_detection_threshold, d.classifier.hand_detection_threshold, "hand_detection_threshold");
        unit_ratio(&mut cls.conveyor_y_position_ratio, d.classifier.conveyor_y_position_ratio, "conveyor_y_position_ratio");
        positive(&mut cls.conveyor_min_area, d.classifier.conveyor_min_area, "conveyor_min_area");
        positive(&mut cls.fixture_min_area, d.classifier.fixture_min_area, "fixture_min_area");
        positive(&mut cls.dut_min_area, d.classifier.dut_min_area, "dut_min_area");
        positive(&mut cls.dut_max_area, d.classifier.dut_max_area, "dut_max_area");
        if cls.dut_max_area <= cls.dut_min_area {
            warn!("DUT area band is empty, reverting both bounds");
            cls.dut_min_area = d.classifier.dut_min_area;
            cls.dut_max_area = d.classifier.dut_max_area;
        }

        let trk = &mut self.tracker;
        positive(&mut trk.max_distance_threshold, d.tracker.max_distance_threshold, "max_distance_threshold");
        positive(&mut trk.fixture_motion_threshold, d.tracker.fixture_motion_threshold, "fixture_motion_threshold");
        nonzero(&mut trk.history_capacity, d.tracker.history_capacity, "history_capacity");
        positive(&mut trk.kalman.process_noise, d.tracker.kalman.process_noise, "kalman_process_noise");
        positive(&mut trk.kalman.measurement_noise, d.tracker.kalman.measurement_noise, "kalman_measurement_noise");

        let mot = &mut self.motion;
        positive(&mut mot.motion_threshold, d.motion.motion_threshold, "motion_threshold");
        positive(&mut mot.contour_min_area, d.motion.contour_min_area, "contour_min_area");
        nonzero(&mut mot.frame_skip, d.motion.frame_skip, "frame_skip");
        unit_ratio(&mut mot.roi_top_ratio, d.motion.roi_top_ratio, "roi_top_ratio");
        positive(&mut mot.motion_event_threshold, d.motion.motion_event_threshold, "motion_event_threshold");
        positive(&mut mot.high_motion_threshold, d.motion.high_motion_threshold, "high_motion_threshold");
        if mot.high_motion_threshold < mot.motion_event_threshold {
            warn!("high_motion_threshold below motion_event_threshold, reverting both");
            mot.motion_event_threshold = d.motion.motion_event_threshold;
            mot.high_motion_threshold = d.motion.high_motion_threshold;
        }

        let seg = &mut self.segmenter;
        positive_f64(&mut seg.gap_threshold_secs, d.segmenter.gap_threshold_secs, "activity_gap_seconds");
        non_negative_f64(&mut seg.min_duration_secs, d.segmenter.min_duration_secs, "min_activity_duration");

        let cmp = &mut self.comparator;
        non_negative_f64(&mut cmp.min_step_secs, d.comparator.min_step_secs, "min_step_seconds");
        positive_f64(&mut cmp.max_step_secs, d.comparator.max_step_secs, "max_step_seconds");
        if cmp.max_step_secs <= cmp.min_step_secs {
            warn!("max_step_seconds <= min_step_seconds, reverting both");
            cmp.min_step_secs = d.comparator.min_step_secs;
            cmp.max_step_secs = d.comparator.max_step_secs;
        }
    }
}

fn overlay<T: DeserializeOwned>(map: &Mapping, key: &str, slot: &mut T) {
    let Some(value) = map.get(key) else {
        return;
    };
    match serde_yaml::from_value::<T>(value.clone()) {
        Ok(parsed) => *slot = parsed,
        Err(e) => warn!("Ignoring malformed config value for '{}': {}", key, e),
    }
}

fn positive(value: &mut f32, default: f32, key: &str) {
    if !value.is_finite() || *value <= 0.0 {
        warn!("'{}' must be positive (got {}), using {}", key, value, default);
        *value = default;
    }
}

fn positive_f64(value: &mut f64, default: f64, key: &str) {
    if !value.is_finite() || *value <= 0.0 {
        warn!("'{}' must be positive (got {}), using {}", key, value, default);
        *value = default;
    }
}

fn non_negative_f64(value: &mut f64, default: f64, key: &str) {
    if !value.is_finite() || *value < 0.0 {
        warn!("'{}' must be non-negative (got {}), using {}", key, value, default);
        *value = default;
    }
}

fn unit_ratio(value: &mut f32, default: f32, key: &str) {
    if !value.is_finite() || *value <= 0.0 || *value > 1.0 {
        warn!("'{}' must be in (0, 1] (got {}), using {}", key, value, default);
        *value = default;
    }
}

fn nonzero<T: PartialEq + Default + Copy + std::fmt::Display>(value: &mut T, default: T, key: &str) {
    if *value == T::default() {
        warn!("'{}' must be non-zero, using {}", key, default);
        *value = default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.detection.min_object_area, 500.0);
        assert_eq!(cfg.detection.max_object_area, 50_000.0);
        assert_eq!(cfg.classifier.hand_detection_threshold, 0.6);
        assert_eq!(cfg.tracker.dut_persistence_frames, 10);
        assert_eq!(cfg.tracker.max_distance_threshold, 100.0);
        assert_eq!(cfg.classifier.conveyor_y_position_ratio, 0.7);
        assert_eq!(cfg.tracker.fixture_motion_threshold, 5.0);
        assert_eq!(cfg.motion.motion_threshold, 25.0);
        assert_eq!(cfg.motion.contour_min_area, 1000.0);
        assert_eq!(cfg.motion.frame_skip, 3);
        assert_eq!(cfg.motion.roi_top_ratio, 0.48);
    }

    #[test]
    fn test_flat_keys_override_defaults() {
        let cfg = EngineConfig::from_yaml_str(
            "min_object_area: 800\nmax_distance_threshold: 60.5\nframe_skip: 5\nsome_unknown_key: true\n",
        );
        assert_eq!(cfg.detection.min_object_area, 800.0);
        assert_eq!(cfg.tracker.max_distance_threshold, 60.5);
        assert_eq!(cfg.motion.frame_skip, 5);
        // untouched keys keep their defaults
        assert_eq!(cfg.detection.max_object_area, 50_000.0);
    }

    #[test]
    fn test_json_config_is_accepted() {
        let cfg = EngineConfig::from_yaml_str(r#"{"hand_detection_threshold": 0.4, "roi_top_ratio": 1.0}"#);
        assert_eq!(cfg.classifier.hand_detection_threshold, 0.4);
        assert_eq!(cfg.motion.roi_top_ratio, 1.0);
    }

    #[test]
    fn test_malformed_field_reverts_only_that_field() {
        let cfg = EngineConfig::from_yaml_str("frame_skip: \"often\"\ndut_persistence_frames: 20\n");
        assert_eq!(cfg.motion.frame_skip, 3);
        assert_eq!(cfg.tracker.dut_persistence_frames, 20);
    }

    #[test]
    fn test_zero_thresholds_never_survive() {
        let cfg = EngineConfig::from_yaml_str(
            "min_object_area: 0\nmax_distance_threshold: -4\nframe_skip: 0\nhand_detection_threshold: 3.5\n",
        );
        assert_eq!(cfg.detection.min_object_area, 500.0);
        assert_eq!(cfg.tracker.max_distance_threshold, 100.0);
        assert_eq!(cfg.motion.frame_skip, 3);
        assert_eq!(cfg.classifier.hand_detection_threshold, 0.6);
    }

    #[test]
    fn test_background_learning_rate_is_bounded() {
        let cfg = EngineConfig::from_yaml_str("background_learning_rate: 0.01\n");
        assert_eq!(cfg.detection.background.learning_rate, 0.01);

        for bad in ["0", "-0.5", "1.5"] {
            let cfg = EngineConfig::from_yaml_str(&format!("background_learning_rate: {}\n", bad));
            assert_eq!(cfg.detection.background.learning_rate, 0.002, "{} must revert", bad);
        }
    }

    #[test]
    fn test_inverted_area_band_reverts() {
        let cfg = EngineConfig::from_yaml_str("min_object_area: 9000\nmax_object_area: 100\n");
        assert_eq!(cfg.detection.min_object_area, 500.0);
        assert_eq!(cfg.detection.max_object_area, 50_000.0);
    }

    #[test]
    fn test_unparseable_document_falls_back_to_defaults() {
        let cfg = EngineConfig::from_yaml_str("{{{ not yaml");
        assert_eq!(cfg, EngineConfig::default());

        let cfg = EngineConfig::from_yaml_str("- just\n- a list\n");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(EngineConfig::load("/definitely/not/here/config.yaml").is_err());
    }
}
