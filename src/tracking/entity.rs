// src/tracking/entity.rs

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::classifier::ClassifiedRegion;
use crate::types::{BoundingBox, ObjectRole, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    /// Created this frame, no match yet
    New,
    /// Matched on the most recent frame it was considered
    Tracked,
    /// Missed at least once, still inside the persistence window
    Stale,
}

impl TrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Tracked => "TRACKED",
            Self::Stale => "STALE",
        }
    }
}

/// A persistent physical entity at the workstation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: u32,
    pub role: ObjectRole,
    pub bbox: BoundingBox,
    pub center: Point,
    /// width × height of the current box
    pub area: u32,
    /// Recent centres, oldest first
    pub history: VecDeque<Point>,
    pub confidence: f32,
    /// Pixels per frame
    pub velocity: (f32, f32),
    pub first_seen: u64,
    pub last_seen: u64,
    pub state: TrackState,
    #[serde(skip)]
    history_capacity: usize,
}

impl TrackedEntity {
    pub(crate) fn new(
        id: u32,
        region: &ClassifiedRegion,
        frame_index: u64,
        history_capacity: usize,
    ) -> Self {
        let capacity = history_capacity.max(1);
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(region.center);
        Self {
            id,
            role: region.role,
            bbox: region.bbox,
            center: region.center,
            area: region.bbox.area(),
            history,
            confidence: region.confidence,
            velocity: (0.0, 0.0),
            first_seen: frame_index,
            last_seen: frame_index,
            state: TrackState::New,
            history_capacity: capacity,
        }
    }

    /// Absorb a matched region observed at `frame_index`.
    pub(crate) fn apply_match(&mut self, region: &ClassifiedRegion, frame_index: u64) {
        let elapsed = frame_index.saturating_sub(self.last_seen);
        if elapsed > 0 {
            self.velocity = (
                (region.center.x - self.center.x) / elapsed as f32,
                (region.center.y - self.center.y) / elapsed as f32,
            );
        }

        self.bbox = region.bbox;
        self.center = region.center;
        self.area = region.bbox.area();
        self.confidence = region.confidence;
        self.last_seen = frame_index;
        self.state = TrackState::Tracked;

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(region.center);

        if self.role == ObjectRole::Unknown && region.role != ObjectRole::Unknown {
            debug!(
                "Entity {} promoted: {} -> {}",
                self.id,
                self.role.as_str(),
                region.role.as_str()
            );
            self.role = region.role;
        }
    }

    pub(crate) fn mark_missed(&mut self) {
        self.state = TrackState::Stale;
    }

    pub fn frames_since_seen(&self, frame_index: u64) -> u64 {
        frame_index.saturating_sub(self.last_seen)
    }

    /// Largest step between consecutive history points.
    pub fn max_step(&self) -> f32 {
        self.history
            .iter()
            .zip(self.history.iter().skip(1))
            .map(|(a, b)| a.distance(b))
            .fold(0.0, f32::max)
    }

    pub fn frames_tracked(&self) -> u64 {
        self.last_seen - self.first_seen + 1
    }
}
