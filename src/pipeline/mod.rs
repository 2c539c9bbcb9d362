// src/pipeline/mod.rs

#[cfg(feature = "video")]
pub mod engine;
pub mod event_bus;
pub mod metrics;

#[cfg(feature = "video")]
pub use engine::{
    AnalysisEngine, FrameResult, StreamAnalysis, KEY_EVENT_LIMIT, MAX_CONSECUTIVE_READ_FAILURES,
};
pub use event_bus::{EngineEvent, EventBus};
pub use metrics::{EngineMetrics, MetricsSummary};
