// src/motion/segmenter.rs
//
// Groups motion events into activity periods.
//
// Single streaming pass: an event closer than `gap_threshold_secs` to the
// current period's end extends it, otherwise the period is closed and a new
// one starts. Closed periods are kept only when they last longer than
// `min_duration_secs`. The period still open at end of stream is emitted by
// `finish`; a caller that never finishes discards it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ActivityPeriod, MotionEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Events closer than this extend the current period
    pub gap_threshold_secs: f64,
    /// Periods must last strictly longer than this
    pub min_duration_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: 5.0,
            min_duration_secs: 2.0,
        }
    }
}

pub struct ActivitySegmenter {
    config: SegmenterConfig,
    open: Option<ActivityPeriod>,
    periods: Vec<ActivityPeriod>,
}

impl ActivitySegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            open: None,
            periods: Vec::new(),
        }
    }

    /// Feed the next event (timestamps non-decreasing). Returns the period
    /// this event closed, if that period was long enough to keep.
    pub fn push(&mut self, event: MotionEvent) -> Option<ActivityPeriod> {
        if let Some(open) = self.open.as_mut() {
            if event.timestamp_secs - open.end_secs < self.config.gap_threshold_secs {
                open.end_secs = open.end_secs.max(event.timestamp_secs);
                open.duration_secs = open.end_secs - open.start_secs;
                open.events.push(event);
                return None;
            }
        }

        let closed = self.open.replace(ActivityPeriod {
            start_secs: event.timestamp_secs,
            end_secs: event.timestamp_secs,
            duration_secs: 0.0,
            events: vec![event],
        });
        closed.and_then(|p| self.keep(p))
    }

    /// Close the open period, if any. Returns it when long enough to keep.
    pub fn finish(&mut self) -> Option<ActivityPeriod> {
        self.open.take().and_then(|p| self.keep(p))
    }

    /// Periods kept so far, time-ordered.
    pub fn periods(&self) -> &[ActivityPeriod] {
        &self.periods
    }

    pub fn has_open_period(&self) -> bool {
        self.open.is_some()
    }

    pub fn into_periods(self) -> Vec<ActivityPeriod> {
        self.periods
    }

    fn keep(&mut self, period: ActivityPeriod) -> Option<ActivityPeriod> {
        if period.duration_secs > self.config.min_duration_secs {
            debug!(
                "Activity period {:.1}s-{:.1}s ({} events)",
                period.start_secs,
                period.end_secs,
                period.event_count()
            );
            self.periods.push(period.clone());
            Some(period)
        } else {
            debug!(
                "Dropping short activity burst at {:.1}s ({:.1}s)",
                period.start_secs, period.duration_secs
            );
            None
        }
    }
}

/// Batch helper: segment a complete, time-ordered event list.
pub fn segment(events: &[MotionEvent], config: &SegmenterConfig) -> Vec<ActivityPeriod> {
    let mut segmenter = ActivitySegmenter::new(config.clone());
    for event in events {
        segmenter.push(event.clone());
    }
    segmenter.finish();
    segmenter.into_periods()
}
