// src/pipeline/engine.rs
//
// Per-stream analysis engine.
//
// One call per decoded frame, in strictly increasing index order:
//
//   Frame ──► RegionDetector ──► Classifier ──► IdentityTracker ──► entity snapshot
//     │                              ▲               │
//     │                              └─ stationarity ┘
//     └────► MotionEventDetector (every frame_skip-th) ──► ActivitySegmenter
//
// Invalid frames are rejected before any stage sees them, so a bad frame
// never perturbs the background model, tracker or motion reference. The frame
// is copied into an OpenCV matrix once and shared by both vision stages.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::event_bus::{EngineEvent, EventBus};
use super::metrics::{EngineMetrics, MetricsSummary};
use crate::classifier::Classifier;
use crate::comparison::{Comparator, ComparisonReport};
use crate::config::EngineConfig;
use crate::detection::{DetectedRegions, RegionDetector};
use crate::error::AnalysisError;
use crate::motion::{strongest_events, ActivitySegmenter, MotionEventDetector};
use crate::tracking::{IdentityTracker, TrackedEntity, TrackerCounters, TrackerStatistics};
use crate::types::{ActivityPeriod, Frame, InstructionStep, MotionEvent, StreamInfo};

/// Highest-scoring motion events kept as key moments of a stream.
pub const KEY_EVENT_LIMIT: usize = 10;

/// Unreadable frames in a row after which a stream is abandoned.
pub const MAX_CONSECUTIVE_READ_FAILURES: usize = 30;

const PROGRESS_INTERVAL: u64 = 900;

const MAX_PENDING_EVENTS: usize = 256;

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub frame_index: u64,
    pub timestamp_secs: f64,
    /// Live entities after this frame, ascending id
    pub entities: Vec<TrackedEntity>,
    pub statistics: TrackerStatistics,
    pub motion_event: Option<MotionEvent>,
    pub events: Vec<EngineEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamAnalysis {
    pub stream: StreamInfo,
    pub duration_secs: f64,
    pub motion_events: Vec<MotionEvent>,
    pub activity_periods: Vec<ActivityPeriod>,
    pub key_events: Vec<MotionEvent>,
    pub tracker: TrackerCounters,
    pub final_statistics: TrackerStatistics,
    pub metrics: MetricsSummary,
    pub comparison: Option<ComparisonReport>,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AnalysisEngine {
    config: EngineConfig,
    stream: StreamInfo,
    detector: RegionDetector,
    classifier: Classifier,
    tracker: IdentityTracker,
    motion: MotionEventDetector,
    segmenter: ActivitySegmenter,
    motion_events: Vec<MotionEvent>,
    bus: EventBus,
    metrics: EngineMetrics,
    last_frame: Option<u64>,
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig, stream: StreamInfo) -> Result<Self, AnalysisError> {
        if stream.width == 0 || stream.height == 0 {
            return Err(AnalysisError::InvalidStream {
                width: stream.width,
                height: stream.height,
            });
        }
        if stream.fps <= 0.0 || !stream.fps.is_finite() {
            warn!(
                "Stream reports unusable frame rate ({}), timestamps will be 0",
                stream.fps
            );
        }

        info!(
            "Engine ready: {}x{} @ {:.1} FPS, {} frames | area=[{}, {}] frame_skip={} roi={:.2}",
            stream.width,
            stream.height,
            stream.fps,
            stream.total_frames,
            config.detection.min_object_area,
            config.detection.max_object_area,
            config.motion.frame_skip,
            config.motion.roi_top_ratio
        );

        Ok(Self {
            detector: RegionDetector::new(config.detection.clone())?,
            classifier: Classifier::new(config.classifier.clone()),
            tracker: IdentityTracker::new(config.tracker.clone()),
            motion: MotionEventDetector::new(config.motion.clone(), stream)?,
            segmenter: ActivitySegmenter::new(config.segmenter.clone()),
            motion_events: Vec::new(),
            bus: EventBus::new(MAX_PENDING_EVENTS),
            metrics: EngineMetrics::new(),
            last_frame: None,
            config,
            stream,
        })
    }

    /// Analyze one frame. A frame that fails validation leaves every stage
    /// untouched and the caller may keep feeding the stream.
    pub fn process_frame(
        &mut self,
        frame_index: u64,
        frame: &Frame,
    ) -> Result<FrameResult, AnalysisError> {
        let started = Instant::now();

        if let Err(e) = self.check_frame(frame_index, frame) {
            warn!("Skipping frame {}: {}", frame_index, e);
            self.metrics.inc(&self.metrics.frames_skipped);
            return Err(e);
        }
        self.last_frame = Some(frame_index);

        // ── Pixel stages (OpenCV) ────────────────────────────────────────
        let (regions, motion_event) = match self.run_vision(frame_index, frame) {
            Ok(out) => out,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame_index, e);
                self.metrics.inc(&self.metrics.frames_skipped);
                return Err(e);
            }
        };

        // ── Regions → roles → identities ─────────────────────────────────
        self.metrics
            .add(&self.metrics.motion_regions, regions.motion.len() as u64);
        self.metrics
            .add(&self.metrics.skin_regions, regions.skin.len() as u64);

        let classified = self.classifier.classify(
            &regions,
            frame.width,
            frame.height,
            frame_index,
            &self.tracker,
        );

        let before = self.tracker.counters();
        self.tracker.update(frame_index, &classified);
        let after = self.tracker.counters();

        for entity in self.tracker.entities() {
            if entity.first_seen == frame_index {
                self.bus.publish(EngineEvent::EntityAppeared {
                    id: entity.id,
                    role: entity.role,
                    frame_index,
                });
            }
        }
        if after.evicted > before.evicted {
            self.bus.publish(EngineEvent::EntitiesEvicted {
                count: after.evicted - before.evicted,
                frame_index,
            });
        }
        self.metrics.set(&self.metrics.entities_created, after.created);
        self.metrics.set(&self.metrics.entities_evicted, after.evicted);

        // ── Stream-level motion ──────────────────────────────────────────
        if let Some(event) = &motion_event {
            self.metrics.inc(&self.metrics.motion_events);
            self.motion_events.push(event.clone());
            self.bus.publish(EngineEvent::MotionDetected(event.clone()));
            if let Some(period) = self.segmenter.push(event.clone()) {
                self.metrics.inc(&self.metrics.activity_periods);
                self.bus.publish(EngineEvent::ActivityClosed(period));
            }
        }

        self.metrics.inc(&self.metrics.frames_processed);
        self.metrics.set_timing(
            &self.metrics.frame_time_us,
            started.elapsed().as_micros() as u64,
        );

        if frame_index > 0 && frame_index % 300 == 0 {
            debug!(
                "Frame {}: {} live entities, {} motion events, {} periods",
                frame_index,
                self.tracker.entities().len(),
                self.motion_events.len(),
                self.segmenter.periods().len()
            );
        }

        Ok(FrameResult {
            frame_index,
            timestamp_secs: self.stream.timestamp_of(frame_index),
            entities: self.tracker.entities().to_vec(),
            statistics: self.tracker.statistics(),
            motion_event,
            events: self.bus.drain(),
        })
    }

    /// Drain a frame source until it reports end of stream.
    ///
    /// A read error skips that frame and is counted in `frames_skipped`; the
    /// stream is only abandoned after `MAX_CONSECUTIVE_READ_FAILURES` errors
    /// in a row. Recoverable engine errors skip the frame as well.
    pub fn process_stream<F>(&mut self, mut next_frame: F) -> anyhow::Result<()>
    where
        F: FnMut() -> anyhow::Result<Option<(u64, Frame)>>,
    {
        let mut consecutive_failures = 0;
        loop {
            let (index, frame) = match next_frame() {
                Ok(Some(read)) => read,
                Ok(None) => break,
                Err(e) => {
                    consecutive_failures += 1;
                    self.metrics.inc(&self.metrics.frames_skipped);
                    if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        return Err(e.context(format!(
                            "giving up after {} consecutive unreadable frames",
                            consecutive_failures
                        )));
                    }
                    warn!("Skipping unreadable frame ({} in a row): {:#}", consecutive_failures, e);
                    continue;
                }
            };
            consecutive_failures = 0;

            if let Err(e) = self.process_frame(index, &frame) {
                if !e.is_recoverable() {
                    return Err(e.into());
                }
                continue;
            }

            if index > 0 && index % PROGRESS_INTERVAL == 0 {
                let progress = if self.stream.total_frames > 0 {
                    (index as f64 / self.stream.total_frames as f64) * 100.0
                } else {
                    0.0
                };
                info!(
                    "Progress {:.1}%: {} live entities, {} motion events",
                    progress,
                    self.tracker.entities().len(),
                    self.motion_events.len()
                );
            }
        }
        Ok(())
    }

    fn run_vision(
        &mut self,
        frame_index: u64,
        frame: &Frame,
    ) -> Result<(DetectedRegions, Option<MotionEvent>), AnalysisError> {
        let mat = frame.to_mat()?;
        let regions = self.detector.detect(&mat)?;
        let motion_event = self.motion.observe(frame_index, &mat)?;
        Ok((regions, motion_event))
    }

    fn check_frame(&self, frame_index: u64, frame: &Frame) -> Result<(), AnalysisError> {
        frame.validate()?;
        if frame.width != self.stream.width || frame.height != self.stream.height {
            return Err(AnalysisError::FrameSizeMismatch {
                width: self.stream.width,
                height: self.stream.height,
                actual_width: frame.width,
                actual_height: frame.height,
            });
        }
        if let Some(previous) = self.last_frame {
            if frame_index <= previous {
                return Err(AnalysisError::OutOfOrder {
                    previous,
                    received: frame_index,
                });
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    pub fn entities(&self) -> &[TrackedEntity] {
        self.tracker.entities()
    }

    pub fn statistics(&self) -> TrackerStatistics {
        self.tracker.statistics()
    }

    pub fn motion_events(&self) -> &[MotionEvent] {
        &self.motion_events
    }

    /// Periods closed so far; the open one is only emitted by `finalize`.
    pub fn activity_periods(&self) -> &[ActivityPeriod] {
        self.segmenter.periods()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// End of stream: close the open activity period and, given instruction
    /// steps, compare them against the observed periods.
    pub fn finalize(mut self, steps: Option<&[InstructionStep]>) -> StreamAnalysis {
        if self.segmenter.finish().is_some() {
            self.metrics.inc(&self.metrics.activity_periods);
        }

        let duration_secs = if self.stream.total_frames > 0 {
            self.stream.duration_secs()
        } else {
            self.last_frame
                .map(|f| self.stream.timestamp_of(f + 1))
                .unwrap_or(0.0)
        };

        let key_events: Vec<MotionEvent> = strongest_events(&self.motion_events, KEY_EVENT_LIMIT)
            .into_iter()
            .cloned()
            .collect();
        let tracker = self.tracker.counters();
        let final_statistics = self.tracker.statistics();
        let metrics = self.metrics.summary();
        let activity_periods = self.segmenter.into_periods();

        let comparison = steps.map(|steps| {
            Comparator::new(self.config.comparator.clone()).compare(steps, &activity_periods)
        });

        info!(
            "Stream done: {} frames ({} skipped), {} motion events, {} activity periods, {} entities created",
            metrics.frames_processed,
            metrics.frames_skipped,
            self.motion_events.len(),
            activity_periods.len(),
            tracker.created
        );
        if let Some(report) = &comparison {
            info!(
                "Coverage {:.1}% ({} of {} steps), {} timing deltas",
                report.coverage.percentage(),
                report.mappings.len(),
                report.coverage.total_instruction_steps,
                report.timing_deltas.len()
            );
        }

        StreamAnalysis {
            stream: self.stream,
            duration_secs,
            motion_events: self.motion_events,
            activity_periods,
            key_events,
            tracker,
            final_statistics,
            metrics,
            comparison,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::TimingIssue;
    use crate::types::{BoundingBox, MotionSeverity, ObjectRole};

    const GRAY: [u8; 3] = [40, 40, 40];
    const GREEN: [u8; 3] = [0, 200, 0];
    const DARK: [u8; 3] = [0, 0, 0];
    const BRIGHT: [u8; 3] = [200, 200, 200];

    fn stream(width: usize, height: usize, fps: f64, total_frames: u64) -> StreamInfo {
        StreamInfo {
            fps,
            total_frames,
            width,
            height,
        }
    }

    /// 320x240 gray bench; a 60x60 green part slides right 2 px/frame over
    /// frames 10..=40 and a second part appears at frames 55..=60.
    fn bench_frame(i: u64) -> Frame {
        let mut frame = Frame::filled(320, 240, GRAY);
        if (10..=40).contains(&i) {
            let x = 40 + 2 * (i as i32 - 10);
            frame.fill_rect(BoundingBox::new(x, 90, 60, 60), GREEN);
        }
        if (55..=60).contains(&i) {
            frame.fill_rect(BoundingBox::new(220, 30, 60, 60), GREEN);
        }
        frame
    }

    fn flashing(i: u64, active: &[(u64, u64)]) -> Frame {
        let on = active.iter().any(|&(a, b)| (a..=b).contains(&i)) && (i / 3) % 2 == 1;
        Frame::filled(16, 12, if on { BRIGHT } else { DARK })
    }

    fn steps(n: u32) -> Vec<InstructionStep> {
        (1..=n)
            .map(|i| InstructionStep::new(i, format!("Mount part {}", i)))
            .collect()
    }

    #[test]
    fn test_zero_sized_stream_is_rejected() {
        let err = AnalysisEngine::new(EngineConfig::default(), stream(0, 240, 30.0, 10)).err();
        assert_eq!(
            err,
            Some(AnalysisError::InvalidStream {
                width: 0,
                height: 240
            })
        );
    }

    #[test]
    fn test_moving_part_keeps_one_identity() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(320, 240, 30.0, 61)).unwrap();

        let mut appeared = Vec::new();
        for i in 0..=40 {
            let result = engine.process_frame(i, &bench_frame(i)).unwrap();
            for ev in &result.events {
                if let EngineEvent::EntityAppeared { id, role, frame_index } = ev {
                    appeared.push((*id, *role, *frame_index));
                }
            }
        }
        assert_eq!(appeared, vec![(1, ObjectRole::Dut, 10)], "one part, one identity");

        let entities = engine.entities();
        assert_eq!(entities.len(), 1);
        let part = &entities[0];
        assert_eq!(part.id, 1);
        assert_eq!(part.role, ObjectRole::Dut);
        assert_eq!(part.first_seen, 10);
        assert_eq!(part.last_seen, 40);
        assert_eq!(part.area, 3600);
        assert!((part.center.x - 130.0).abs() < 1e-3, "center x = {}", part.center.x);
        assert!(part.velocity.0 > 0.0, "moving right");

        let stats = engine.statistics();
        assert_eq!(stats.total_objects, 1);
        assert_eq!(stats.by_role.get(&ObjectRole::Dut), Some(&1));

        for i in 41..=50 {
            engine.process_frame(i, &bench_frame(i)).unwrap();
        }
        assert_eq!(engine.entities().len(), 1, "still within persistence at frame 50");

        let result = engine.process_frame(51, &bench_frame(51)).unwrap();
        assert!(result.entities.is_empty(), "evicted at frame 51");
        assert!(result
            .events
            .contains(&EngineEvent::EntitiesEvicted { count: 1, frame_index: 51 }));

        let analysis = engine.finalize(None);
        assert_eq!(analysis.tracker.created, 1);
        assert_eq!(analysis.tracker.evicted, 1);
        assert!(analysis.motion_events.is_empty(), "part is too small to move the ROI mean");
        assert!(analysis.comparison.is_none());
    }

    #[test]
    fn test_static_part_is_promoted_to_fixture() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(320, 240, 30.0, 20)).unwrap();

        let mut roles = Vec::new();
        for i in 0..=12 {
            let mut frame = Frame::filled(320, 240, GRAY);
            if i >= 5 {
                frame.fill_rect(BoundingBox::new(80, 40, 150, 100), GREEN);
            }
            let result = engine.process_frame(i, &frame).unwrap();
            roles.push(
                result
                    .entities
                    .iter()
                    .map(|e| (e.id, e.role))
                    .collect::<Vec<_>>(),
            );
        }

        for (i, seen) in roles.iter().enumerate().take(5) {
            assert!(seen.is_empty(), "nothing on the bench at frame {}", i);
        }
        for (i, seen) in roles.iter().enumerate().take(11).skip(5) {
            assert_eq!(
                seen,
                &vec![(1, ObjectRole::Unknown)],
                "too little history to call it stationary at frame {}",
                i
            );
        }
        assert_eq!(roles[11], vec![(1, ObjectRole::Fixture)], "six still frames make a fixture");
        assert_eq!(roles[12], vec![(1, ObjectRole::Fixture)]);
        assert_eq!(engine.statistics().by_role.get(&ObjectRole::Fixture), Some(&1));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(320, 240, 30.0, 61)).unwrap();
        let mut ids = Vec::new();
        for i in 0..=60 {
            let result = engine.process_frame(i, &bench_frame(i)).unwrap();
            for ev in result.events {
                if let EngineEvent::EntityAppeared { id, .. } = ev {
                    ids.push(id);
                }
            }
        }
        assert_eq!(ids, vec![1, 2], "second part gets a fresh id after the first is evicted");
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reruns_are_deterministic() {
        let run = || {
            let mut engine =
                AnalysisEngine::new(EngineConfig::default(), stream(320, 240, 30.0, 61)).unwrap();
            (0..=60)
                .map(|i| {
                    let r = engine.process_frame(i, &bench_frame(i)).unwrap();
                    serde_json::to_string(&r.entities).unwrap()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_bad_frames_leave_state_untouched() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(320, 240, 30.0, 61)).unwrap();
        for i in 0..=12 {
            engine.process_frame(i, &bench_frame(i)).unwrap();
        }
        let before = serde_json::to_string(engine.entities()).unwrap();

        let replay = engine.process_frame(12, &bench_frame(12));
        assert_eq!(
            replay.err(),
            Some(AnalysisError::OutOfOrder {
                previous: 12,
                received: 12
            })
        );
        let wrong_size = engine.process_frame(13, &Frame::filled(160, 120, GRAY));
        assert!(matches!(
            wrong_size,
            Err(AnalysisError::FrameSizeMismatch { actual_width: 160, .. })
        ));
        let truncated = engine.process_frame(13, &Frame::new(vec![0; 100], 320, 240));
        assert!(matches!(truncated, Err(AnalysisError::MalformedFrame { .. })));

        assert_eq!(serde_json::to_string(engine.entities()).unwrap(), before);
        let summary = engine.metrics().summary();
        assert_eq!(summary.frames_skipped, 3);
        assert_eq!(summary.frames_processed, 13);

        // the stream continues after rejected frames
        assert!(engine.process_frame(13, &bench_frame(13)).is_ok());
    }

    /// Frame source over a script: `Ok(i)` yields frame `i`, `Err` a read failure.
    fn scripted(
        script: Vec<Result<u64, &'static str>>,
    ) -> impl FnMut() -> anyhow::Result<Option<(u64, Frame)>> {
        let mut reads = script.into_iter();
        move || match reads.next() {
            Some(Ok(i)) => Ok(Some((i, Frame::filled(16, 12, GRAY)))),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
            None => Ok(None),
        }
    }

    #[test]
    fn test_unreadable_frames_are_skipped() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 30.0, 10)).unwrap();
        let script = vec![
            Ok(0),
            Ok(1),
            Err("corrupt packet"),
            Err("corrupt packet"),
            Ok(4),
            Ok(5),
            Err("corrupt packet"),
            Ok(7),
        ];
        engine.process_stream(scripted(script)).unwrap();

        let summary = engine.metrics().summary();
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.frames_skipped, 3);
    }

    #[test]
    fn test_failure_run_is_reset_by_a_good_frame() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 30.0, 100)).unwrap();
        let mut script = vec![Ok(0)];
        script.extend((0..MAX_CONSECUTIVE_READ_FAILURES - 1).map(|_| Err("decoder hiccup")));
        script.push(Ok(40));
        script.extend((0..MAX_CONSECUTIVE_READ_FAILURES - 1).map(|_| Err("decoder hiccup")));
        script.push(Ok(80));

        assert!(engine.process_stream(scripted(script)).is_ok());
        assert_eq!(engine.metrics().summary().frames_processed, 3);
    }

    #[test]
    fn test_persistent_read_failure_abandons_stream() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 30.0, 100)).unwrap();
        let mut calls = 0;
        let result = engine.process_stream(|| {
            calls += 1;
            Err(anyhow::anyhow!("capture device gone"))
        });

        let err = result.expect_err("stream must be abandoned");
        assert!(format!("{:#}", err).contains("capture device gone"));
        assert_eq!(calls, MAX_CONSECUTIVE_READ_FAILURES, "no reads after the limit");
        assert_eq!(
            engine.metrics().summary().frames_skipped,
            MAX_CONSECUTIVE_READ_FAILURES as u64
        );
    }

    #[test]
    fn test_static_stream_has_no_activity() {
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 30.0, 30)).unwrap();
        for i in 0..30 {
            let r = engine.process_frame(i, &Frame::filled(16, 12, GRAY)).unwrap();
            assert!(r.motion_event.is_none());
        }
        let steps = steps(5);
        let analysis = engine.finalize(Some(&steps));
        assert!(analysis.motion_events.is_empty());
        assert!(analysis.activity_periods.is_empty());
        assert!(analysis.key_events.is_empty());
        let report = analysis.comparison.expect("steps were given");
        assert_eq!(report.coverage.estimated_coverage, 0.0);
        assert_eq!(report.coverage.missing_steps, 5);
        assert!((analysis.duration_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_bursts_cover_two_of_five_steps() {
        let active = [(0, 30), (60, 90)];
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 1.0, 100)).unwrap();
        let mut closed = Vec::new();
        for i in 0..100 {
            let r = engine.process_frame(i, &flashing(i, &active)).unwrap();
            if let Some(ev) = &r.motion_event {
                assert_eq!(ev.severity, MotionSeverity::High);
            }
            for ev in r.events {
                if let EngineEvent::ActivityClosed(p) = ev {
                    closed.push(p);
                }
            }
        }
        assert_eq!(closed.len(), 1, "first burst closes when the second starts");
        assert_eq!(closed[0].start_secs, 3.0);
        assert_eq!(closed[0].end_secs, 30.0);
        assert_eq!(engine.activity_periods().len(), 1);

        let steps = steps(5);
        let analysis = engine.finalize(Some(&steps));
        assert_eq!(analysis.activity_periods.len(), 2, "finalize emits the open burst");
        assert_eq!(analysis.activity_periods[1].start_secs, 63.0);
        assert_eq!(analysis.activity_periods[1].end_secs, 90.0);
        assert_eq!(analysis.motion_events.len(), 20);
        assert_eq!(analysis.key_events.len(), KEY_EVENT_LIMIT);

        let report = analysis.comparison.expect("steps were given");
        assert!((report.coverage.percentage() - 40.0).abs() < 1e-9);
        assert_eq!(report.coverage.missing_steps, 3);
        assert!(report.timing_deltas.is_empty());
        assert_eq!(analysis.metrics.activity_periods, 2);
    }

    #[test]
    fn test_long_burst_is_flagged_too_slow() {
        let active = [(0, 405)];
        let mut engine =
            AnalysisEngine::new(EngineConfig::default(), stream(16, 12, 1.0, 406)).unwrap();
        for i in 0..406 {
            engine.process_frame(i, &flashing(i, &active)).unwrap();
        }
        let steps = steps(1);
        let analysis = engine.finalize(Some(&steps));
        assert_eq!(analysis.activity_periods.len(), 1);
        assert_eq!(analysis.activity_periods[0].duration_secs, 402.0);

        let report = analysis.comparison.expect("steps were given");
        assert_eq!(report.timing_deltas.len(), 1);
        assert_eq!(report.timing_deltas[0].issue, TimingIssue::TooSlow);
        assert!(report.coverage_deltas.is_empty());
    }
}
