//! Core data models used throughout the pipeline.
//!
//! These types represent the chunks, categorized records, and health reports
//! that flow from the filter stage into the verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A bounded, contiguous slice of the merged document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the whole run, starting at 0.
    pub sequence_index: usize,
    /// Byte offset of `raw_text` within the source text.
    pub offset: usize,
    pub raw_text: String,
    /// Length of `raw_text` in characters (not bytes).
    pub char_count: usize,
}

impl Chunk {
    pub fn new(sequence_index: usize, offset: usize, raw_text: &str) -> Self {
        Self {
            sequence_index,
            offset,
            raw_text: raw_text.to_string(),
            char_count: raw_text.chars().count(),
        }
    }
}

/// One label from the closed eight-domain vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Finance,
    Technology,
    Healthcare,
    Environment,
    Infrastructure,
    Legal,
    Education,
    Government,
}

impl Domain {
    /// The full vocabulary in canonical display order.
    pub const ALL: [Domain; 8] = [
        Domain::Finance,
        Domain::Technology,
        Domain::Healthcare,
        Domain::Environment,
        Domain::Infrastructure,
        Domain::Legal,
        Domain::Education,
        Domain::Government,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Finance => "finance",
            Domain::Technology => "technology",
            Domain::Healthcare => "healthcare",
            Domain::Environment => "environment",
            Domain::Infrastructure => "infrastructure",
            Domain::Legal => "legal",
            Domain::Education => "education",
            Domain::Government => "government",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == needle)
            .ok_or_else(|| format!("unknown domain: '{}'", s))
    }
}

/// Which tagging path produced a record's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    RuleBased,
    AiEnhanced,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::RuleBased => "rule_based",
            ProcessingMethod::AiEnhanced => "ai_enhanced",
        }
    }
}

impl fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted output unit: one per chunk, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorizedRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub summary: String,
    pub tags: Vec<Domain>,
    /// Ascending and de-duplicated.
    pub detected_years: Vec<i32>,
    pub sample_text: String,
    pub processing_method: ProcessingMethod,
}

/// Overall pipeline health, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about the merged text artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedOutputStats {
    pub exists: bool,
    pub path: String,
    pub size_bytes: u64,
    pub characters: usize,
    /// Number of `BEGIN FILE` markers in the merged text.
    pub files_processed: usize,
}

/// Statistics recomputed from the record collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiResultsStats {
    pub exists: bool,
    pub path: String,
    pub chunks_processed: usize,
    pub tags_summary: BTreeMap<String, usize>,
    pub years_detected: Vec<i32>,
    /// Number of valid records mentioning each year.
    pub year_counts: BTreeMap<i32, usize>,
    pub processing_methods: BTreeMap<String, usize>,
    pub malformed_records: usize,
}

/// Derived health summary of a pipeline run. Regenerated on every verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub pdf_count: usize,
    pub merged_output: MergedOutputStats,
    pub ai_results: AiResultsStats,
    pub summary: PipelineSummary,
    pub overall_status: OverallStatus,
    /// Anomalies behind a non-healthy status, in detection order.
    pub issues: Vec<String>,
}

/// Headline numbers across all three stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub total_pdfs: usize,
    pub files_processed: usize,
    pub total_characters: usize,
    pub chunks_processed: usize,
    pub unique_tags: usize,
    pub years_detected: usize,
}

impl PipelineSummary {
    pub fn from_stats(pdf_count: usize, merged: &MergedOutputStats, ai: &AiResultsStats) -> Self {
        Self {
            total_pdfs: pdf_count,
            files_processed: merged.files_processed,
            total_characters: merged.characters,
            chunks_processed: ai.chunks_processed,
            unique_tags: ai.tags_summary.len(),
            years_detected: ai.years_detected.len(),
        }
    }
}

/// The reduced view of a [`HealthReport`] used by `verify --health-check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub merged_output_ok: bool,
    pub records_ok: bool,
    pub overall_status: OverallStatus,
}

impl HealthReport {
    pub fn health(&self) -> HealthSummary {
        HealthSummary {
            merged_output_ok: self.merged_output.exists && self.merged_output.characters > 0,
            records_ok: self.ai_results.exists && self.ai_results.chunks_processed > 0,
            overall_status: self.overall_status,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == OverallStatus::Healthy
    }
}
