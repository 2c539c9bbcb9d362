// src/comparison/report.rs
//
// Markdown rendering of a ComparisonReport.

use chrono::{DateTime, Local};
use std::fmt;

use super::comparator::ComparisonReport;

impl ComparisonReport {
    /// Render with the current local time as the generation stamp.
    pub fn to_markdown(&self) -> String {
        render_markdown(self, Local::now())
    }
}

pub fn render_markdown(report: &ComparisonReport, generated_at: DateTime<Local>) -> String {
    ReportMarkdown {
        report,
        generated_at,
    }
    .to_string()
}

/// A comparison report formatted as markdown with a fixed generation stamp.
pub struct ReportMarkdown<'a> {
    pub report: &'a ComparisonReport,
    pub generated_at: DateTime<Local>,
}

impl fmt::Display for ReportMarkdown<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let cov = &report.coverage;

        writeln!(out, "# Instruction vs Video Comparison Report\n")?;
        writeln!(out, "Generated: {}\n", self.generated_at.format("%Y-%m-%d %H:%M"))?;

        writeln!(out, "## Summary")?;
        writeln!(out, "- Instruction Steps: {}", cov.total_instruction_steps)?;
        writeln!(out, "- Video Activity Periods: {}", cov.total_activity_periods)?;
        writeln!(out, "- Estimated Coverage: {:.1}%\n", cov.percentage())?;

        writeln!(out, "## Estimated Step Mapping")?;
        if report.mappings.is_empty() {
            writeln!(out, "_No activity periods could be mapped._\n")?;
        }
        for m in &report.mappings {
            writeln!(out, "- **Step {}**: {}", m.step_number, m.step_title)?;
            writeln!(
                out,
                "  - Video Time: {:.1}s - {:.1}s",
                m.video_start_secs, m.video_end_secs
            )?;
            writeln!(out, "  - Duration: {:.1}s", m.duration_secs)?;
            writeln!(out, "  - Confidence: {}\n", m.confidence.as_str())?;
        }

        writeln!(out, "## Identified Deltas")?;
        if !report.has_deltas() {
            writeln!(out, "_None._\n")?;
        }
        if !report.timing_deltas.is_empty() {
            writeln!(out, "### Timing Issues")?;
            for d in &report.timing_deltas {
                writeln!(
                    out,
                    "- Step {}: {} ({:.1}s, bound {:.0}s)",
                    d.step_number,
                    d.issue.describe(),
                    d.actual_secs,
                    d.expected_secs
                )?;
            }
            writeln!(out)?;
        }
        if !report.coverage_deltas.is_empty() {
            writeln!(out, "### Coverage Issues")?;
            for d in &report.coverage_deltas {
                writeln!(
                    out,
                    "- Incomplete coverage: {:.1}% coverage, {} steps missing",
                    d.coverage_percentage, d.missing_steps
                )?;
            }
            writeln!(out)?;
        }

        writeln!(out, "## Recommendations")?;
        if cov.missing_steps > 0 {
            writeln!(
                out,
                "- Record additional {} steps to complete coverage",
                cov.missing_steps
            )?;
        }
        if !report.timing_deltas.is_empty() {
            writeln!(out, "- Review steps with timing issues for efficiency improvements")?;
        }
        if !report.has_deltas() {
            writeln!(out, "- No action needed")?;
        }

        Ok(())
    }
}
