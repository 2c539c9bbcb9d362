// src/batch.rs
//
// Cross-recording analysis.
//
// Each recording is first analyzed on its own and reduced to a VideoSummary.
// The batch pass then derives population statistics over the successful
// recordings (duration, activity-period count, step coverage) and flags the
// outliers: durations beyond two standard deviations and coverage below half
// the batch average.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::comparison::coverage;

pub const DEFAULT_MIN_VIDEO_BYTES: u64 = 5 * 1024 * 1024;

// ============================================================================
// INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub name: String,
    pub duration_secs: f64,
    pub activity_periods: usize,
    pub instruction_steps: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoSummary {
    pub fn analyzed(
        name: impl Into<String>,
        duration_secs: f64,
        activity_periods: usize,
        instruction_steps: usize,
    ) -> Self {
        Self {
            name: name.into(),
            duration_secs,
            activity_periods,
            instruction_steps,
            success: true,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration_secs: 0.0,
            activity_periods: 0,
            instruction_steps: 0,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn coverage_percentage(&self) -> f64 {
        coverage(self.instruction_steps, self.activity_periods).percentage()
    }
}

/// `.mp4` files directly inside `dir` larger than `min_size_bytes`, sorted by
/// file name and capped at `max_videos`.
pub fn find_video_files(
    dir: impl AsRef<Path>,
    min_size_bytes: u64,
    max_videos: usize,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        anyhow::bail!("Recordings directory not found: {}", dir.display());
    }

    let mut videos = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_mp4 = path.extension().and_then(|e| e.to_str()) == Some("mp4");
        if !entry.file_type().is_file() || !is_mp4 {
            continue;
        }
        let size = entry
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        if size > min_size_bytes {
            videos.push(path.to_path_buf());
        } else {
            debug!("Skipping small recording {} ({} bytes)", path.display(), size);
        }
    }

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    info!("Found {} substantial recordings", videos.len());
    if videos.len() > max_videos {
        info!("Limiting to first {} recordings", max_videos);
        videos.truncate(max_videos);
    }
    Ok(videos)
}

// ============================================================================
// PATTERNS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationPatterns {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatterns {
    pub mean: f64,
    pub std: f64,
    /// Most frequent count; ties go to the value seen first
    pub mode: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoveragePatterns {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPatterns {
    pub duration: Option<DurationPatterns>,
    pub activity: Option<ActivityPatterns>,
    pub coverage: Option<CoveragePatterns>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn mode(values: &[usize]) -> usize {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for &v in values {
        match counts.iter_mut().find(|(value, _)| *value == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best = (0, 0);
    for (value, n) in counts {
        if n > best.1 {
            best = (value, n);
        }
    }
    best.0
}

pub fn extract_patterns(videos: &[VideoSummary]) -> BatchPatterns {
    let ok: Vec<&VideoSummary> = videos.iter().filter(|v| v.success).collect();
    if ok.is_empty() {
        return BatchPatterns::default();
    }

    let durations: Vec<f64> = ok.iter().map(|v| v.duration_secs).collect();
    let activity: Vec<usize> = ok.iter().map(|v| v.activity_periods).collect();
    let activity_f: Vec<f64> = activity.iter().map(|&a| a as f64).collect();
    let coverages: Vec<f64> = ok.iter().map(|v| v.coverage_percentage()).collect();

    let d_mean = mean(&durations);
    let (d_min, d_max) = min_max(&durations);
    let a_mean = mean(&activity_f);
    let c_mean = mean(&coverages);
    let (c_min, c_max) = min_max(&coverages);

    BatchPatterns {
        duration: Some(DurationPatterns {
            mean: d_mean,
            std: std_dev(&durations, d_mean),
            min: d_min,
            max: d_max,
            median: median(&durations),
        }),
        activity: Some(ActivityPatterns {
            mean: a_mean,
            std: std_dev(&activity_f, a_mean),
            mode: mode(&activity),
        }),
        coverage: Some(CoveragePatterns {
            mean: c_mean,
            std: std_dev(&coverages, c_mean),
            min: c_min,
            max: c_max,
        }),
    }
}

// ============================================================================
// ANOMALIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    Duration,
    LowCoverage,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duration => "duration_anomaly",
            Self::LowCoverage => "low_coverage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub video: String,
    pub kind: AnomalyKind,
    pub value: f64,
    /// Human-readable expected value or range
    pub expected: String,
    pub severity: AnomalySeverity,
}

pub fn identify_anomalies(videos: &[VideoSummary], patterns: &BatchPatterns) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if let Some(dp) = patterns.duration {
        for v in videos.iter().filter(|v| v.success) {
            let deviation = (v.duration_secs - dp.mean).abs();
            if deviation > 2.0 * dp.std {
                anomalies.push(Anomaly {
                    video: v.name.clone(),
                    kind: AnomalyKind::Duration,
                    value: v.duration_secs,
                    expected: format!(
                        "{:.1} - {:.1}",
                        dp.mean - 2.0 * dp.std,
                        dp.mean + 2.0 * dp.std
                    ),
                    severity: if deviation > 3.0 * dp.std {
                        AnomalySeverity::High
                    } else {
                        AnomalySeverity::Medium
                    },
                });
            }
        }
    }

    if let Some(cp) = patterns.coverage {
        for v in videos.iter().filter(|v| v.success) {
            let cov = v.coverage_percentage();
            if cov < cp.mean * 0.5 {
                anomalies.push(Anomaly {
                    video: v.name.clone(),
                    kind: AnomalyKind::LowCoverage,
                    value: cov,
                    expected: format!("{:.1}", cp.mean),
                    severity: if cov < 10.0 {
                        AnomalySeverity::High
                    } else {
                        AnomalySeverity::Medium
                    },
                });
            }
        }
    }

    anomalies
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub videos: Vec<VideoSummary>,
    pub patterns: BatchPatterns,
    pub anomalies: Vec<Anomaly>,
}

impl BatchReport {
    pub fn analyze(videos: Vec<VideoSummary>) -> Self {
        let patterns = extract_patterns(&videos);
        let anomalies = identify_anomalies(&videos, &patterns);
        info!(
            "Batch of {} recordings: {} successful, {} anomalies",
            videos.len(),
            videos.iter().filter(|v| v.success).count(),
            anomalies.len()
        );
        Self {
            videos,
            patterns,
            anomalies,
        }
    }

    pub fn success_count(&self) -> usize {
        self.videos.iter().filter(|v| v.success).count()
    }

    pub fn to_markdown(&self) -> String {
        self.render_markdown(Local::now())
    }

    pub fn render_markdown(&self, generated_at: DateTime<Local>) -> String {
        BatchMarkdown {
            report: self,
            generated_at,
        }
        .to_string()
    }
}

/// A batch report formatted as markdown with a fixed generation stamp.
pub struct BatchMarkdown<'a> {
    pub report: &'a BatchReport,
    pub generated_at: DateTime<Local>,
}

impl fmt::Display for BatchMarkdown<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let total = report.videos.len();
        let ok = report.success_count();
        let rate = if total > 0 {
            ok as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        writeln!(out, "# Comprehensive Video Recording Analysis Report\n")?;
        writeln!(out, "Generated: {}\n", self.generated_at.format("%Y-%m-%d %H:%M"))?;

        writeln!(out, "## Executive Summary")?;
        writeln!(out, "- **Total Videos Analyzed**: {}", total)?;
        writeln!(out, "- **Successful Analyses**: {}", ok)?;
        writeln!(out, "- **Success Rate**: {:.1}%\n", rate)?;

        if report.patterns.duration.is_some() || report.patterns.coverage.is_some() {
            writeln!(out, "## Identified Patterns")?;
        }
        if let Some(dp) = report.patterns.duration {
            writeln!(out, "### Duration Patterns")?;
            writeln!(out, "- **Average Duration**: {:.1} ± {:.1} seconds", dp.mean, dp.std)?;
            writeln!(out, "- **Range**: {:.1} - {:.1} seconds", dp.min, dp.max)?;
            writeln!(out, "- **Median**: {:.1} seconds\n", dp.median)?;
        }
        if let Some(cp) = report.patterns.coverage {
            writeln!(out, "### Coverage Patterns")?;
            writeln!(out, "- **Average Coverage**: {:.1}%", cp.mean)?;
            writeln!(out, "- **Coverage Range**: {:.1}% - {:.1}%", cp.min, cp.max)?;
            writeln!(out, "- **Coverage Consistency**: ±{:.1}%\n", cp.std)?;
        }

        if !report.anomalies.is_empty() {
            writeln!(out, "## Identified Anomalies")?;
            for (severity, heading) in [
                (AnomalySeverity::High, "### High Severity Issues"),
                (AnomalySeverity::Medium, "### Medium Severity Issues"),
            ] {
                let group: Vec<&Anomaly> =
                    report.anomalies.iter().filter(|a| a.severity == severity).collect();
                if group.is_empty() {
                    continue;
                }
                writeln!(out, "{}", heading)?;
                for a in group {
                    writeln!(out, "- **{}**: {} - {:.1}", a.video, a.kind.as_str(), a.value)?;
                }
                writeln!(out)?;
            }
        }

        writeln!(out, "## Detailed Video Analysis")?;
        for v in &report.videos {
            writeln!(out, "### {}", v.name)?;
            if v.success {
                writeln!(out, "- **Duration**: {:.1} seconds", v.duration_secs)?;
                writeln!(out, "- **Activity Periods**: {}", v.activity_periods)?;
                writeln!(out, "- **Coverage**: {:.1}%", v.coverage_percentage())?;
                writeln!(out, "- **Status**: Analyzed successfully")?;
            } else {
                writeln!(
                    out,
                    "- **Status**: Analysis failed - {}",
                    v.error.as_deref().unwrap_or("Unknown error")
                )?;
            }
            writeln!(out)?;
        }

        writeln!(out, "## Recommendations")?;
        let high: Vec<&Anomaly> = report
            .anomalies
            .iter()
            .filter(|a| a.severity == AnomalySeverity::High)
            .collect();
        if !high.is_empty() {
            writeln!(out, "### Immediate Actions Required")?;
            for a in high {
                match a.kind {
                    AnomalyKind::LowCoverage => {
                        writeln!(
                            out,
                            "- Re-record {} - insufficient coverage ({:.1}%)",
                            a.video, a.value
                        )?;
                    }
                    AnomalyKind::Duration => {
                        writeln!(out, "- Review {} - unusual duration ({:.1}s)", a.video, a.value)?;
                    }
                }
            }
            writeln!(out)?;
        }
        if let Some(cp) = report.patterns.coverage {
            if cp.mean < 50.0 {
                writeln!(out, "### Coverage Improvement")?;
                writeln!(out, "- Overall coverage is low ({:.1}%)", cp.mean)?;
                writeln!(
                    out,
                    "- Consider recording longer sessions to capture more assembly steps"
                )?;
                writeln!(out)?;
            }
        }
        writeln!(out, "### Quality Assurance")?;
        writeln!(out, "- Implement consistent recording procedures")?;
        writeln!(out, "- Validate recordings before processing")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn batch() -> Vec<VideoSummary> {
        vec![
            VideoSummary::analyzed("a.mp4", 100.0, 4, 5),
            VideoSummary::analyzed("b.mp4", 100.0, 4, 5),
            VideoSummary::analyzed("c.mp4", 100.0, 5, 5),
            VideoSummary::analyzed("d.mp4", 100.0, 4, 5),
            VideoSummary::analyzed("e.mp4", 1000.0, 0, 5),
            VideoSummary::failed("broken.mp4", "cannot decode"),
        ]
    }

    #[test]
    fn test_patterns_ignore_failed_recordings() {
        let patterns = extract_patterns(&batch());
        let dp = patterns.duration.expect("duration patterns");
        assert!((dp.mean - 280.0).abs() < 1e-9);
        assert!((dp.std - 360.0).abs() < 1e-9, "population std, got {}", dp.std);
        assert_eq!(dp.median, 100.0);
        assert_eq!(dp.max, 1000.0);

        let ap = patterns.activity.expect("activity patterns");
        assert_eq!(ap.mode, 4);
        assert!((ap.mean - 3.4).abs() < 1e-9);

        let cp = patterns.coverage.expect("coverage patterns");
        assert!((cp.mean - 68.0).abs() < 1e-9);
        assert_eq!(cp.min, 0.0);
        assert_eq!(cp.max, 100.0);
    }

    #[test]
    fn test_anomalies() {
        let videos = batch();
        let patterns = extract_patterns(&videos);
        let anomalies = identify_anomalies(&videos, &patterns);

        // |1000 - 280| = 720 = 2σ exactly, so not a duration outlier
        assert!(anomalies.iter().all(|a| a.kind != AnomalyKind::Duration));

        let low: Vec<&Anomaly> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::LowCoverage)
            .collect();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].video, "e.mp4");
        assert_eq!(low[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_duration_outlier_severity() {
        let mut videos: Vec<VideoSummary> = (0..9)
            .map(|i| VideoSummary::analyzed(format!("v{}.mp4", i), 60.0, 3, 3))
            .collect();
        videos.push(VideoSummary::analyzed("long.mp4", 600.0, 3, 3));
        let report = BatchReport::analyze(videos);
        // mean 114, std 162, deviation 486 = 3σ exactly: outside 2σ, not beyond 3σ
        let dur: Vec<&Anomaly> = report
            .anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::Duration)
            .collect();
        assert_eq!(dur.len(), 1);
        assert_eq!(dur[0].video, "long.mp4");
        assert_eq!(dur[0].severity, AnomalySeverity::Medium);
    }

    #[test]
    fn test_empty_batch() {
        let report = BatchReport::analyze(vec![VideoSummary::failed("x.mp4", "boom")]);
        assert_eq!(report.patterns, BatchPatterns::default());
        assert!(report.anomalies.is_empty());
        let md = report.to_markdown();
        assert!(md.contains("- **Success Rate**: 0.0%"));
        assert!(md.contains("Analysis failed - boom"));
    }

    #[test]
    fn test_markdown_report() {
        let md = BatchReport::analyze(batch()).to_markdown();
        assert!(md.starts_with("# Comprehensive Video Recording Analysis Report"));
        assert!(md.contains("- **Total Videos Analyzed**: 6"));
        assert!(md.contains("### High Severity Issues"));
        assert!(md.contains("- Re-record e.mp4 - insufficient coverage (0.0%)"));
    }

    #[test]
    fn test_markdown_report_with_fixed_stamp() {
        use chrono::TimeZone;

        let report = BatchReport::analyze(batch());
        let generated_at = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let md = report.render_markdown(generated_at);
        assert!(md.contains("Generated: 2026-03-01 09:30\n"));
        assert!(md.ends_with("- Validate recordings before processing\n"));
        assert_eq!(md, BatchMarkdown { report: &report, generated_at }.to_string());
    }

    #[test]
    fn test_find_video_files() {
        let dir = std::env::temp_dir().join(format!("assembly_motion_batch_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b.mp4"), vec![0u8; 64]).unwrap();
        fs::write(dir.join("a.mp4"), vec![0u8; 64]).unwrap();
        fs::write(dir.join("c.mp4"), vec![0u8; 64]).unwrap();
        fs::write(dir.join("tiny.mp4"), vec![0u8; 8]).unwrap();
        fs::write(dir.join("notes.txt"), vec![0u8; 64]).unwrap();
        fs::write(dir.join("nested").join("deep.mp4"), vec![0u8; 64]).unwrap();

        let found = find_video_files(&dir, 16, 2).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);

        assert!(find_video_files(dir.join("missing"), 0, 10).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
