// src/pipeline/metrics.rs
//
// Engine observability. Counts what every stage produced and how long the
// per-frame path takes. Counters are shared handles, so a clone can be read
// from a progress reporter while the engine keeps running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub frames_processed: Arc<AtomicU64>,
    pub frames_skipped: Arc<AtomicU64>,
    pub motion_regions: Arc<AtomicU64>,
    pub skin_regions: Arc<AtomicU64>,
    pub entities_created: Arc<AtomicU64>,
    pub entities_evicted: Arc<AtomicU64>,
    pub motion_events: Arc<AtomicU64>,
    pub activity_periods: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            frames_processed: Arc::new(AtomicU64::new(0)),
            frames_skipped: Arc::new(AtomicU64::new(0)),
            motion_regions: Arc::new(AtomicU64::new(0)),
            skin_regions: Arc::new(AtomicU64::new(0)),
            entities_created: Arc::new(AtomicU64::new(0)),
            entities_evicted: Arc::new(AtomicU64::new(0)),
            motion_events: Arc::new(AtomicU64::new(0)),
            activity_periods: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Overwrite a monotonic stage counter with the stage's own running total.
    pub fn set(&self, counter: &AtomicU64, value: u64) {
        counter.store(value, Ordering::Relaxed);
    }

    /// Last per-frame processing time.
    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            fps: self.fps(),
            motion_regions: self.motion_regions.load(Ordering::Relaxed),
            skin_regions: self.skin_regions.load(Ordering::Relaxed),
            entities_created: self.entities_created.load(Ordering::Relaxed),
            entities_evicted: self.entities_evicted.load(Ordering::Relaxed),
            motion_events: self.motion_events.load(Ordering::Relaxed),
            activity_periods: self.activity_periods.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub fps: f64,
    pub motion_regions: u64,
    pub skin_regions: u64,
    pub entities_created: u64,
    pub entities_evicted: u64,
    pub motion_events: u64,
    pub activity_periods: u64,
    pub last_frame_us: u64,
    pub elapsed_secs: f64,
}
