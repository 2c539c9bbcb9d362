// src/comparison/comparator.rs
//
// Step ↔ activity-period comparison.
//
// Alignment is positional: the i-th activity period is assumed to be the
// i-th instruction step. That is only a heuristic, so every mapping carries
// Low confidence. Deltas flag mapped steps that were suspiciously quick or
// slow, and a coverage shortfall when fewer periods than steps were seen.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ActivityPeriod, InstructionStep};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Mapped steps shorter than this are flagged as too quick
    pub min_step_secs: f64,
    /// Mapped steps longer than this are flagged as too slow
    pub max_step_secs: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            min_step_secs: 10.0,
            max_step_secs: 300.0,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Positional mapping carries no evidence beyond order, so every mapping is
/// reported with low confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingConfidence {
    Low,
}

impl MappingConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMapping {
    pub step_number: u32,
    pub step_title: String,
    pub video_start_secs: f64,
    pub video_end_secs: f64,
    pub duration_secs: f64,
    pub confidence: MappingConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_instruction_steps: usize,
    pub total_activity_periods: usize,
    /// min(periods / steps, 1), 0 when there are no steps
    pub estimated_coverage: f64,
    pub missing_steps: usize,
}

impl CoverageSummary {
    pub fn percentage(&self) -> f64 {
        self.estimated_coverage * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingIssue {
    TooQuick,
    TooSlow,
}

impl TimingIssue {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::TooQuick => "Step completed too quickly",
            Self::TooSlow => "Step took too long",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingDelta {
    pub step_number: u32,
    pub issue: TimingIssue,
    /// The bound that was violated (minimum for TooQuick, maximum for TooSlow)
    pub expected_secs: f64,
    pub actual_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageDelta {
    pub missing_steps: usize,
    pub coverage_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub mappings: Vec<StepMapping>,
    pub coverage: CoverageSummary,
    pub timing_deltas: Vec<TimingDelta>,
    pub coverage_deltas: Vec<CoverageDelta>,
}

impl ComparisonReport {
    pub fn has_deltas(&self) -> bool {
        !self.timing_deltas.is_empty() || !self.coverage_deltas.is_empty()
    }
}

// ============================================================================
// COMPARATOR
// ============================================================================

pub struct Comparator {
    config: ComparatorConfig,
}

impl Comparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn compare(&self, steps: &[InstructionStep], periods: &[ActivityPeriod]) -> ComparisonReport {
        let mappings = map_steps(steps, periods);
        let coverage = coverage(steps.len(), periods.len());

        let timing_deltas: Vec<TimingDelta> = mappings
            .iter()
            .filter_map(|m| self.timing_delta(m))
            .collect();

        let coverage_deltas = if coverage.missing_steps > 0 {
            vec![CoverageDelta {
                missing_steps: coverage.missing_steps,
                coverage_percentage: coverage.percentage(),
            }]
        } else {
            Vec::new()
        };

        debug!(
            "Compared {} steps with {} periods: coverage {:.1}%, {} timing deltas",
            steps.len(),
            periods.len(),
            coverage.percentage(),
            timing_deltas.len()
        );

        ComparisonReport {
            mappings,
            coverage,
            timing_deltas,
            coverage_deltas,
        }
    }

    fn timing_delta(&self, mapping: &StepMapping) -> Option<TimingDelta> {
        let (issue, expected_secs) = if mapping.duration_secs < self.config.min_step_secs {
            (TimingIssue::TooQuick, self.config.min_step_secs)
        } else if mapping.duration_secs > self.config.max_step_secs {
            (TimingIssue::TooSlow, self.config.max_step_secs)
        } else {
            return None;
        };
        Some(TimingDelta {
            step_number: mapping.step_number,
            issue,
            expected_secs,
            actual_secs: mapping.duration_secs,
        })
    }
}

/// Pair the i-th period with the i-th step, for i < min(steps, periods).
pub fn map_steps(steps: &[InstructionStep], periods: &[ActivityPeriod]) -> Vec<StepMapping> {
    steps
        .iter()
        .zip(periods)
        .map(|(step, period)| StepMapping {
            step_number: step.step_number,
            step_title: step.title.clone(),
            video_start_secs: period.start_secs,
            video_end_secs: period.end_secs,
            duration_secs: period.duration_secs,
            confidence: MappingConfidence::Low,
        })
        .collect()
}

pub fn coverage(step_count: usize, period_count: usize) -> CoverageSummary {
    let estimated_coverage = if step_count > 0 {
        (period_count as f64 / step_count as f64).min(1.0)
    } else {
        0.0
    };
    CoverageSummary {
        total_instruction_steps: step_count,
        total_activity_periods: period_count,
        estimated_coverage,
        missing_steps: step_count.saturating_sub(period_count),
    }
}
