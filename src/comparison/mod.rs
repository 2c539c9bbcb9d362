// src/comparison/mod.rs
//
// Expected assembly steps vs observed activity periods.

pub mod comparator;
pub mod report;

pub use comparator::{
    coverage, map_steps, Comparator, ComparatorConfig, ComparisonReport, CoverageDelta,
    CoverageSummary, MappingConfidence, StepMapping, TimingDelta, TimingIssue,
};
pub use report::{render_markdown, ReportMarkdown};
