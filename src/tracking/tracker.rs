// src/tracking/tracker.rs
//
// Identity tracker for workstation entities.
//
// Design:
//   - One constant-velocity Kalman filter per entity, held in a FilterArena
//   - Every live filter predicts exactly once per frame, before matching
//   - Greedy nearest-neighbour matching in region order; an entity is
//     matched at most once per frame; ties go to the lowest id
//   - An entity only accepts regions of its own role, unless it is still
//     Unknown (in which case it is promoted)
//   - Unmatched entities are evicted once they have been unseen for more
//     than `dut_persistence_frames`, and their filter slot is freed in the
//     same step

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::entity::TrackedEntity;
use super::kalman::{ConstantVelocityFilter, FilterArena, KalmanConfig};
use crate::classifier::{ClassifiedRegion, StationarityQuery};
use crate::types::{ObjectRole, Point};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centre distance (px) between a prediction and a region to match
    pub max_distance_threshold: f32,
    /// Frames an unmatched entity survives before eviction
    pub dut_persistence_frames: u32,
    /// Largest per-frame step (px) still considered stationary
    pub fixture_motion_threshold: f32,
    /// Centres kept per entity
    pub history_capacity: usize,
    /// History points required before an entity can be judged stationary
    pub stationary_min_history: usize,
    /// Only entities seen this many frames ago or later answer stationarity queries
    pub stationary_recent_frames: u64,
    pub kalman: KalmanConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance_threshold: 100.0,
            dut_persistence_frames: 10,
            fixture_motion_threshold: 5.0,
            history_capacity: 30,
            stationary_min_history: 6,
            stationary_recent_frames: 5,
            kalman: KalmanConfig::default(),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Snapshot of the live entity population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerStatistics {
    pub total_objects: usize,
    pub by_role: BTreeMap<ObjectRole, usize>,
    /// Mean confidence over live entities, 0 when there are none
    pub average_confidence: f32,
}

/// Lifecycle counters over the whole stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCounters {
    pub created: u64,
    pub evicted: u64,
    pub matches: u64,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct IdentityTracker {
    config: TrackerConfig,
    /// Live entities, ascending id
    entities: Vec<TrackedEntity>,
    filters: FilterArena,
    next_id: u32,
    counters: TrackerCounters,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            entities: Vec::new(),
            filters: FilterArena::new(),
            next_id: 1,
            counters: TrackerCounters::default(),
        }
    }

    /// Fold one frame's classified regions into the entity population.
    pub fn update(&mut self, frame_index: u64, regions: &[ClassifiedRegion]) -> &[TrackedEntity] {
        let predictions = self.filters.predict_all();
        let max_distance = self.config.max_distance_threshold;

        let mut matched = vec![false; self.entities.len()];
        let mut created: Vec<TrackedEntity> = Vec::new();

        // ══════════════════════════════════════════════════════════════════
        // GREEDY NEAREST-NEIGHBOUR MATCHING
        // ══════════════════════════════════════════════════════════════════
        for region in regions {
            let mut best: Option<(usize, f32)> = None;
            for (i, entity) in self.entities.iter().enumerate() {
                if matched[i] {
                    continue;
                }
                if entity.role != region.role && entity.role != ObjectRole::Unknown {
                    continue;
                }
                let anchor = predictions.get(&entity.id).copied().unwrap_or(entity.center);
                let dist = anchor.distance(&region.center);
                if dist >= max_distance {
                    continue;
                }
                // strict comparison keeps the lowest id on ties
                if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                    best = Some((i, dist));
                }
            }

            match best {
                Some((i, _)) => {
                    matched[i] = true;
                    let entity = &mut self.entities[i];
                    entity.apply_match(region, frame_index);
                    if let Some(filter) = self.filters.get_mut(entity.id) {
                        filter.correct(region.center);
                    }
                    self.counters.matches += 1;
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    let entity =
                        TrackedEntity::new(id, region, frame_index, self.config.history_capacity);
                    self.filters.insert(
                        id,
                        ConstantVelocityFilter::new(region.center, &self.config.kalman),
                    );
                    debug!(
                        "New entity E{} ({}) at ({:.0}, {:.0}), frame {}",
                        id,
                        region.role.as_str(),
                        region.center.x,
                        region.center.y,
                        frame_index
                    );
                    self.counters.created += 1;
                    created.push(entity);
                }
            }
        }

        // ══════════════════════════════════════════════════════════════════
        // UNMATCHED ENTITIES → STALE / EVICT
        // ══════════════════════════════════════════════════════════════════
        for (entity, was_matched) in self.entities.iter_mut().zip(&matched) {
            if !was_matched {
                entity.mark_missed();
            }
        }

        let persistence = self.config.dut_persistence_frames as u64;
        let filters = &mut self.filters;
        let counters = &mut self.counters;
        self.entities.retain(|e| {
            let keep = e.frames_since_seen(frame_index) <= persistence;
            if !keep {
                filters.remove(e.id);
                counters.evicted += 1;
                debug!(
                    "Entity E{} ({}) evicted after {} unseen frames (tracked {} frames)",
                    e.id,
                    e.role.as_str(),
                    e.frames_since_seen(frame_index),
                    e.frames_tracked()
                );
            }
            keep
        });

        self.entities.extend(created);
        &self.entities
    }

    pub fn entities(&self) -> &[TrackedEntity] {
        &self.entities
    }

    pub fn get(&self, id: u32) -> Option<&TrackedEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Filtered centre estimate for an entity, if it is live.
    pub fn filtered_position(&self, id: u32) -> Option<Point> {
        self.filters.get(id).map(|f| f.position())
    }

    pub fn counters(&self) -> TrackerCounters {
        self.counters
    }

    pub fn statistics(&self) -> TrackerStatistics {
        let mut by_role = BTreeMap::new();
        for e in &self.entities {
            *by_role.entry(e.role).or_insert(0) += 1;
        }
        let average_confidence = if self.entities.is_empty() {
            0.0
        } else {
            self.entities.iter().map(|e| e.confidence).sum::<f32>() / self.entities.len() as f32
        };
        TrackerStatistics {
            total_objects: self.entities.len(),
            by_role,
            average_confidence,
        }
    }

    pub fn live_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn reset(&mut self) {
        self.entities.clear();
        self.filters = FilterArena::new();
        self.next_id = 1;
        self.counters = TrackerCounters::default();
    }
}

impl StationarityQuery for IdentityTracker {
    fn is_region_stationary(&self, center: Point, frame_index: u64) -> bool {
        let recent = self.config.stationary_recent_frames;
        let nearest = self
            .entities
            .iter()
            .filter(|e| e.frames_since_seen(frame_index) <= recent)
            .map(|e| (e, e.center.distance(&center)))
            .filter(|(_, d)| *d < self.config.max_distance_threshold)
            .fold(None::<(&TrackedEntity, f32)>, |best, cand| match best {
                Some((_, bd)) if bd <= cand.1 => best,
                _ => Some(cand),
            });

        match nearest {
            Some((entity, _)) => {
                entity.history.len() >= self.config.stationary_min_history
                    && entity.max_step() < self.config.fixture_motion_threshold
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::entity::TrackState;
    use crate::types::BoundingBox;

    fn region(cx: i32, cy: i32, role: ObjectRole) -> ClassifiedRegion {
        let bbox = BoundingBox::new(cx - 30, cy - 30, 60, 60);
        ClassifiedRegion {
            bbox,
            area: bbox.area(),
            center: bbox.center(),
            role,
            confidence: 0.7,
        }
    }

    #[test]
    fn test_new_regions_get_increasing_ids() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        let out = tracker.update(0, &[region(100, 100, ObjectRole::Dut), region(400, 100, ObjectRole::Dut)]);
        let ids: Vec<u32> = out.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(out.iter().all(|e| e.state == TrackState::New));
    }

    #[test]
    fn test_moving_region_keeps_identity() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        for f in 0..30u64 {
            tracker.update(f, &[region(100 + 3 * f as i32, 120, ObjectRole::Dut)]);
        }
        let entities = tracker.entities();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, 1);
        assert_eq!(entities[0].first_seen, 0);
        assert_eq!(entities[0].last_seen, 29);
        assert!((entities[0].velocity.0 - 3.0).abs() < 1e-6);
        assert_eq!(tracker.live_filters(), 1);
    }

    #[test]
    fn test_role_gate_prevents_cross_role_match() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(0, &[region(100, 100, ObjectRole::Dut)]);
        let out = tracker.update(1, &[region(105, 100, ObjectRole::LeftHand)]);
        assert_eq!(out.len(), 2, "hand must not steal the DUT identity");
        assert_eq!(out[0].state, TrackState::Stale);
    }

    #[test]
    fn test_unknown_entity_is_promoted() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(0, &[region(100, 100, ObjectRole::Unknown)]);
        let out = tracker.update(1, &[region(104, 100, ObjectRole::Fixture)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, ObjectRole::Fixture);
    }

    #[test]
    fn test_entity_matched_at_most_once_per_frame() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(0, &[region(100, 100, ObjectRole::Dut)]);
        let out = tracker.update(1, &[region(102, 100, ObjectRole::Dut), region(98, 100, ObjectRole::Dut)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].center.x, 102.0, "first region in order wins");
        assert_eq!(out[1].id, 2);
    }

    #[test]
    fn test_tie_goes_to_lowest_id() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(0, &[region(100, 100, ObjectRole::Dut), region(200, 100, ObjectRole::Dut)]);
        let out = tracker.update(1, &[region(150, 100, ObjectRole::Dut)]);
        let matched: Vec<u32> = out.iter().filter(|e| e.last_seen == 1).map(|e| e.id).collect();
        assert_eq!(matched, vec![1]);
    }

    #[test]
    fn test_eviction_after_persistence_window() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(5, &[region(100, 100, ObjectRole::Dut)]);
        tracker.update(15, &[]);
        assert_eq!(tracker.entities().len(), 1, "10 unseen frames is still inside the window");
        tracker.update(16, &[]);
        assert!(tracker.entities().is_empty());
        assert_eq!(tracker.live_filters(), 0, "filter slot freed with the entity");
        assert_eq!(tracker.counters().evicted, 1);

        // ids are never reused
        let out = tracker.update(17, &[region(100, 100, ObjectRole::Dut)]);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn test_far_region_creates_new_entity() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(0, &[region(100, 100, ObjectRole::Dut)]);
        let out = tracker.update(1, &[region(300, 100, ObjectRole::Dut)]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_stationarity_query() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        for f in 0..6u64 {
            tracker.update(f, &[region(200, 150, ObjectRole::Unknown)]);
        }
        assert!(tracker.is_region_stationary(Point::new(202.0, 150.0), 6));
        // too far from any entity
        assert!(!tracker.is_region_stationary(Point::new(500.0, 150.0), 6));
        // entity not seen recently enough
        assert!(!tracker.is_region_stationary(Point::new(200.0, 150.0), 20));

        let mut moving = IdentityTracker::new(TrackerConfig::default());
        for f in 0..8u64 {
            moving.update(f, &[region(100 + 8 * f as i32, 150, ObjectRole::Unknown)]);
        }
        assert!(!moving.is_region_stationary(Point::new(156.0, 150.0), 8));
    }

    #[test]
    fn test_short_history_is_not_stationary() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        for f in 0..5u64 {
            tracker.update(f, &[region(200, 150, ObjectRole::Unknown)]);
        }
        assert!(!tracker.is_region_stationary(Point::new(200.0, 150.0), 5));
    }

    #[test]
    fn test_statistics() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        assert_eq!(tracker.statistics().average_confidence, 0.0);
        let mut hand = region(400, 100, ObjectRole::LeftHand);
        hand.confidence = 0.9;
        tracker.update(0, &[region(100, 100, ObjectRole::Dut), hand]);
        let stats = tracker.statistics();
        assert_eq!(stats.total_objects, 2);
        assert_eq!(stats.by_role.get(&ObjectRole::Dut), Some(&1));
        assert_eq!(stats.by_role.get(&ObjectRole::LeftHand), Some(&1));
        assert!((stats.average_confidence - 0.8).abs() < 1e-6);
    }
}
