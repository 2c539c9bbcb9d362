// src/motion/mod.rs
//
// Stream-level motion analysis, independent of entity tracking.
//
//   Frame (every frame_skip-th) → event_detector → MotionEvent → segmenter → ActivityPeriod

pub mod event_detector;
pub mod segmenter;

#[cfg(feature = "video")]
pub use event_detector::MotionEventDetector;
pub use event_detector::{strongest_events, MotionConfig};
pub use segmenter::{segment, ActivitySegmenter, SegmenterConfig};
