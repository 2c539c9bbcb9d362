// src/lib.rs
//
// Workstation activity analysis for fixed-camera assembly recordings.
//
//   detection   → candidate regions (background subtraction + skin mask)
//   classifier  → workstation roles (DUT, hands, conveyor, fixture)
//   tracking    → persistent identities (Kalman + greedy matching)
//   motion      → ROI motion events → activity periods
//   comparison  → activity periods vs expected assembly steps
//   pipeline    → the per-frame engine wiring all of the above
//
// Pixel work (background subtraction, colour conversion, morphology,
// contours) runs on OpenCV behind the `video` feature. Classification,
// tracking, segmentation and comparison are plain Rust.

pub mod batch;
pub mod classifier;
pub mod comparison;
pub mod config;
pub mod detection;
pub mod error;
pub mod instructions;
pub mod motion;
pub mod pipeline;
pub mod tracking;
pub mod types;

#[cfg(feature = "video")]
pub mod video_processor;

pub use config::EngineConfig;
pub use error::AnalysisError;
#[cfg(feature = "video")]
pub use pipeline::{AnalysisEngine, FrameResult, StreamAnalysis};
pub use types::{
    ActivityPeriod, BoundingBox, Frame, InstructionStep, MotionEvent, MotionSeverity, ObjectRole,
    Point, StreamInfo,
};
