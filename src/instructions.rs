// src/instructions.rs
//
// Work-instruction analysis.
//
// Input is the JSON rendering of an instruction slide deck:
//
//   { "metadata": { "title": .. },
//     "slides": [ { "slide_number", "title", "content": [{"content"}],
//                   "tables": [{"content"}], "images": [..] } ] }
//
// Slides titled "Mount ..." become assembly steps, numbered in deck order.
// Part numbers are bracketed codes such as [M-1021] and fastener/tool codes
// start with "F-". Tables are markdown; a parts table is any table that
// mentions a part-code prefix.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::types::InstructionStep;

static PART_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z]-\d+[A-Z0-9-]*)\]").expect("static part pattern"));
static TOOL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"F-\d+[A-Z0-9-]*").expect("static tool pattern"));
static PART_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]-\d+").expect("static part number pattern"));

const ACTION_WORDS: [&str; 7] = ["Mount", "Fasten", "Use", "Add", "Place", "Install", "Connect"];
const TEST_WORDS: [&str; 5] = ["test", "calibration", "cogging", "thermal", "stress"];
const PARTS_TABLE_MARKERS: [&str; 4] = ["M-", "P-", "F-", "CONF"];

// ============================================================================
// INPUT DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextBlock {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Slide {
    pub slide_number: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Vec<TextBlock>,
    #[serde(default)]
    pub tables: Vec<TextBlock>,
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
}

impl Slide {
    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstructionDocument {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub slides: Vec<Slide>,
}

// ============================================================================
// ANALYSIS OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartEntry {
    pub part_number: String,
    pub description: String,
    pub quantity: String,
    pub slide_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestProcedure {
    pub slide_number: u32,
    pub test_name: String,
    pub procedure: Vec<String>,
    /// Raw markdown tables found on the slide
    pub expected_results: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSummary {
    pub total_slides: usize,
    pub total_parts: usize,
    pub total_steps: usize,
    pub total_tests: usize,
    pub tools_required: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionAnalysis {
    pub title: String,
    pub summary: InstructionSummary,
    pub parts_list: Vec<PartEntry>,
    pub assembly_steps: Vec<InstructionStep>,
    pub test_procedures: Vec<TestProcedure>,
    /// De-duplicated, sorted
    pub tools_required: Vec<String>,
}

// ============================================================================
// EXTRACTION
// ============================================================================

impl InstructionDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read instructions {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("invalid instruction document {}", path.display()))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(contents)?;
        debug!("Loaded instruction document with {} slides", doc.slides.len());
        Ok(doc)
    }

    pub fn assembly_steps(&self) -> Vec<InstructionStep> {
        let mut steps = Vec::new();
        for slide in &self.slides {
            if !slide.title().contains("Mount") {
                continue;
            }
            let mut step = InstructionStep::new(steps.len() as u32 + 1, slide.title());
            step.slide_number = Some(slide.slide_number);

            for item in &slide.content {
                let text = &item.content;
                step.parts_used
                    .extend(PART_REF.captures_iter(text).map(|c| c[1].to_string()));
                step.tools_used
                    .extend(TOOL_REF.find_iter(text).map(|m| m.as_str().to_string()));
                if ACTION_WORDS.iter().any(|w| text.contains(w)) {
                    step.actions.push(text.clone());
                }
            }
            steps.push(step);
        }
        steps
    }

    pub fn parts_list(&self) -> Vec<PartEntry> {
        let mut parts = Vec::new();
        for slide in &self.slides {
            for table in &slide.tables {
                let content = &table.content;
                if !PARTS_TABLE_MARKERS.iter().any(|m| content.contains(m)) {
                    continue;
                }
                // header and separator rows come first
                for line in content.lines().skip(2) {
                    if let Some(entry) = parse_part_row(line, slide.slide_number) {
                        parts.push(entry);
                    }
                }
            }
        }
        parts
    }

    pub fn test_procedures(&self) -> Vec<TestProcedure> {
        self.slides
            .iter()
            .filter(|slide| {
                let title = slide.title().to_lowercase();
                TEST_WORDS.iter().any(|w| title.contains(w))
            })
            .map(|slide| TestProcedure {
                slide_number: slide.slide_number,
                test_name: slide.title().to_string(),
                procedure: slide.content.iter().map(|c| c.content.clone()).collect(),
                expected_results: slide.tables.iter().map(|t| t.content.clone()).collect(),
            })
            .collect()
    }

    pub fn analyze(&self) -> InstructionAnalysis {
        let parts_list = self.parts_list();
        let assembly_steps = self.assembly_steps();
        let test_procedures = self.test_procedures();
        let tools_required: Vec<String> = assembly_steps
            .iter()
            .flat_map(|s| s.tools_used.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let summary = InstructionSummary {
            total_slides: self.slides.len(),
            total_parts: parts_list.len(),
            total_steps: assembly_steps.len(),
            total_tests: test_procedures.len(),
            tools_required: tools_required.len(),
        };
        info!(
            "Instructions '{}': {} steps, {} parts, {} tests, {} tools",
            self.metadata.title,
            summary.total_steps,
            summary.total_parts,
            summary.total_tests,
            summary.tools_required
        );

        InstructionAnalysis {
            title: self.metadata.title.clone(),
            summary,
            parts_list,
            assembly_steps,
            test_procedures,
            tools_required,
        }
    }
}

fn parse_part_row(line: &str, slide_number: u32) -> Option<PartEntry> {
    if !line.contains('|') {
        return None;
    }
    let cells: Vec<&str> = line.split('|').map(str::trim).collect();
    // drop the empty cells outside the leading/trailing pipes
    let cells = cells.get(1..cells.len().saturating_sub(1))?;
    if cells.len() < 2 {
        return None;
    }
    let part_number = cells[0];
    if !PART_NUMBER.is_match(part_number) && !part_number.contains("CONF") {
        return None;
    }
    Some(PartEntry {
        part_number: part_number.to_string(),
        description: cells[1].to_string(),
        quantity: cells.get(2).map(|q| q.to_string()).unwrap_or_else(|| "1".to_string()),
        slide_number,
    })
}

// ============================================================================
// CHECKLIST
// ============================================================================

impl InstructionAnalysis {
    pub fn checklist_markdown(&self) -> String {
        ChecklistMarkdown {
            analysis: self,
            generated_at: Local::now(),
        }
        .to_string()
    }
}

/// Assembly checklist formatted as markdown with a fixed generation stamp.
pub struct ChecklistMarkdown<'a> {
    pub analysis: &'a InstructionAnalysis,
    pub generated_at: DateTime<Local>,
}

impl fmt::Display for ChecklistMarkdown<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = self.analysis;
        writeln!(out, "# Assembly Checklist: {}\n", analysis.title)?;
        writeln!(out, "Generated: {}\n", self.generated_at.format("%Y-%m-%d %H:%M"))?;

        writeln!(out, "## Parts Required")?;
        for part in &analysis.parts_list {
            writeln!(
                out,
                "- [ ] {}: {} (Qty: {})",
                part.part_number, part.description, part.quantity
            )?;
        }

        writeln!(out, "\n## Tools Required")?;
        for tool in &analysis.tools_required {
            writeln!(out, "- [ ] {}", tool)?;
        }

        writeln!(out, "\n## Assembly Steps")?;
        for step in &analysis.assembly_steps {
            writeln!(out, "### Step {}: {}", step.step_number, step.title)?;
            for action in &step.actions {
                writeln!(out, "- [ ] {}", action)?;
            }
            writeln!(out)?;
        }

        writeln!(out, "## Test Procedures")?;
        for test in &analysis.test_procedures {
            writeln!(out, "### {}", test.test_name)?;
            for line in &test.procedure {
                writeln!(out, "- [ ] {}", line)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
