// src/pipeline/event_bus.rs
//
// Per-frame notifications. Stages publish what happened instead of callers
// diffing entity lists between frames; the engine drains the bus into each
// FrameResult.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

use crate::types::{ActivityPeriod, MotionEvent, ObjectRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    EntityAppeared {
        id: u32,
        role: ObjectRole,
        frame_index: u64,
    },

    EntitiesEvicted {
        count: u64,
        frame_index: u64,
    },

    MotionDetected(MotionEvent),

    ActivityClosed(ActivityPeriod),
}

pub struct EventBus {
    events: VecDeque<EngineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: EngineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}
