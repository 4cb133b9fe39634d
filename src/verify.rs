//! Pipeline verification and health reporting.
//!
//! Recomputes every statistic directly from the artifacts on disk: the merged
//! text file, the record collection, and the downloads directory. Nothing is
//! cached between runs and nothing here mutates the record collection.
//!
//! # Status Rules
//!
//! - `unhealthy`: merged text missing or blank, or the record collection is
//!   missing, unparseable, or empty.
//! - `degraded`: artifacts exist but some records are malformed, no tags were
//!   detected at all, or ids are not exactly `1..=N`.
//! - `healthy`: otherwise.

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

use crate::chunk::DOCUMENT_MARKER;
use crate::config::Config;
use crate::error::{PipelineError, RecordError};
use crate::extract::find_documents;
use crate::models::{
    AiResultsStats, CategorizedRecord, HealthReport, MergedOutputStats, OverallStatus,
    PipelineSummary,
};
use crate::years::{max_year, MIN_YEAR};

/// Whether the record collection could be read as a JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionState {
    Missing,
    Unparseable(String),
    Parsed,
}

/// Result of reading and validating the record collection.
#[derive(Debug)]
pub struct RecordsAnalysis {
    pub state: CollectionState,
    pub stats: AiResultsStats,
    /// Ids of records that passed validation, in file order.
    pub ids: Vec<u64>,
    pub errors: Vec<RecordError>,
}

/// Build the health report for the configured artifacts.
pub fn verify(config: &Config) -> HealthReport {
    let pdf_count = count_documents(&config.paths.downloads_dir, &config.extract.include_globs);
    let merged = analyze_merged_output(&config.paths.merged_file);
    let records = analyze_records(&config.paths.records_file);
    build_report(pdf_count, merged, &records)
}

fn count_documents(dir: &Path, include_globs: &[String]) -> usize {
    match find_documents(dir, include_globs) {
        Ok(paths) => paths.len(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not scan downloads directory");
            0
        }
    }
}

pub fn analyze_merged_output(path: &Path) -> MergedOutputStats {
    let mut stats = MergedOutputStats {
        path: path.display().to_string(),
        ..MergedOutputStats::default()
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            if path.exists() {
                warn!(path = %path.display(), error = %e, "merged output unreadable");
            }
            return stats;
        }
    };

    let content = String::from_utf8_lossy(&bytes);
    stats.exists = true;
    stats.size_bytes = bytes.len() as u64;
    stats.characters = content.chars().count();
    stats.files_processed = content.matches(DOCUMENT_MARKER).count();
    if content.trim().is_empty() {
        stats.characters = 0;
    }
    stats
}

pub fn analyze_records(path: &Path) -> RecordsAnalysis {
    let mut analysis = RecordsAnalysis {
        state: CollectionState::Missing,
        stats: AiResultsStats {
            path: path.display().to_string(),
            ..AiResultsStats::default()
        },
        ids: Vec::new(),
        errors: Vec::new(),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if path.exists() {
                analysis.state = CollectionState::Unparseable(e.to_string());
                analysis.stats.exists = true;
            }
            return analysis;
        }
    };
    analysis.stats.exists = true;

    let entries = match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            analysis.state = CollectionState::Unparseable("expected a JSON array".to_string());
            return analysis;
        }
        Err(e) => {
            analysis.state = CollectionState::Unparseable(e.to_string());
            return analysis;
        }
    };
    analysis.state = CollectionState::Parsed;
    analysis.stats.chunks_processed = entries.len();

    let max_year = max_year();
    let mut years = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        match validate_record(index, entry, max_year) {
            Ok(record) => {
                for tag in &record.tags {
                    *analysis
                        .stats
                        .tags_summary
                        .entry(tag.as_str().to_string())
                        .or_insert(0) += 1;
                }
                *analysis
                    .stats
                    .processing_methods
                    .entry(record.processing_method.as_str().to_string())
                    .or_insert(0) += 1;
                for &year in &record.detected_years {
                    *analysis.stats.year_counts.entry(year).or_insert(0) += 1;
                }
                years.extend(record.detected_years.iter().copied());
                analysis.ids.push(record.id);
            }
            Err(e) => {
                warn!(error = %e, "malformed record");
                analysis.errors.push(e);
            }
        }
    }

    analysis.stats.years_detected = years.into_iter().collect();
    analysis.stats.malformed_records = analysis.errors.len();
    analysis
}

/// Check one persisted record against the record schema.
pub fn validate_record(
    index: usize,
    value: &Value,
    max_year: i32,
) -> Result<CategorizedRecord, RecordError> {
    let record: CategorizedRecord =
        serde_json::from_value(value.clone()).map_err(|e| RecordError::Schema {
            index,
            reason: e.to_string(),
        })?;

    if record.id == 0 {
        return Err(RecordError::NonPositiveId { index });
    }

    let mut seen = BTreeSet::new();
    for tag in &record.tags {
        if !seen.insert(*tag) {
            return Err(RecordError::DuplicateTag {
                index,
                tag: tag.as_str().to_string(),
            });
        }
    }

    for &year in &record.detected_years {
        if !(MIN_YEAR..=max_year).contains(&year) {
            return Err(RecordError::YearOutOfRange {
                index,
                year,
                max: max_year,
            });
        }
    }
    if record.detected_years.windows(2).any(|w| w[0] >= w[1]) {
        return Err(RecordError::YearsUnordered { index });
    }

    Ok(record)
}

/// Combine the analyses into a report and decide the overall status.
pub fn build_report(
    pdf_count: usize,
    merged_output: MergedOutputStats,
    records: &RecordsAnalysis,
) -> HealthReport {
    let mut status = OverallStatus::Healthy;
    let mut issues = Vec::new();

    if !merged_output.exists {
        status = OverallStatus::Unhealthy;
        issues.push(format!("merged text not found: {}", merged_output.path));
    } else if merged_output.characters == 0 {
        status = OverallStatus::Unhealthy;
        issues.push(format!("merged text is empty: {}", merged_output.path));
    }

    let stats = &records.stats;
    match &records.state {
        CollectionState::Missing => {
            status = OverallStatus::Unhealthy;
            issues.push(format!("record collection not found: {}", stats.path));
        }
        CollectionState::Unparseable(reason) => {
            status = OverallStatus::Unhealthy;
            issues.push(format!("record collection unparseable: {}", reason));
        }
        CollectionState::Parsed if stats.chunks_processed == 0 => {
            status = OverallStatus::Unhealthy;
            issues.push("record collection is empty".to_string());
        }
        CollectionState::Parsed => {
            if stats.malformed_records > 0 {
                status = status.max(OverallStatus::Degraded);
                issues.push(format!(
                    "{} of {} records are malformed",
                    stats.malformed_records, stats.chunks_processed
                ));
            }
            if stats.tags_summary.is_empty() {
                status = status.max(OverallStatus::Degraded);
                issues.push(format!(
                    "no tags detected across {} records",
                    stats.chunks_processed
                ));
            }
            if stats.malformed_records == 0 && !ids_contiguous(&records.ids) {
                status = status.max(OverallStatus::Degraded);
                issues.push(format!(
                    "record ids are not a contiguous 1..{} sequence",
                    records.ids.len()
                ));
            }
        }
    }

    HealthReport {
        timestamp: Utc::now(),
        pdf_count,
        summary: PipelineSummary::from_stats(pdf_count, &merged_output, stats),
        merged_output,
        ai_results: stats.clone(),
        overall_status: status,
        issues,
    }
}

/// True when the ids are exactly `{1, ..., N}` with no repeats.
fn ids_contiguous(ids: &[u64]) -> bool {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &id)| id == i as u64 + 1)
}

/// Run verification, print the report, and persist it unless `health_check`.
pub fn run_verify(config: &Config, health_check: bool) -> Result<HealthReport> {
    let report = verify(config);

    if !health_check {
        print_report(&report);
        write_report(&config.paths.report_file, &report)?;
        info!(path = %config.paths.report_file.display(), "verification report saved");
        println!();
        println!("  Report saved: {}", config.paths.report_file.display());
    }
    print_health(&report);

    Ok(report)
}

pub fn write_report(path: &Path, report: &HealthReport) -> Result<(), PipelineError> {
    let failure = |reason: String| PipelineError::OutputWriteFailure {
        path: path.to_path_buf(),
        reason,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| failure(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(report).map_err(|e| failure(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| failure(e.to_string()))
}

fn print_report(report: &HealthReport) {
    let merged = &report.merged_output;
    let ai = &report.ai_results;

    println!("Compliance Copilot — Verification Report");
    println!("========================================");
    println!();
    println!("  PDF files:         {}", report.pdf_count);

    if merged.exists {
        println!("  Merged output:     found ({})", merged.path);
        println!("    files processed: {}", merged.files_processed);
        println!("    characters:      {}", merged.characters);
        println!("    size:            {}", format_bytes(merged.size_bytes));
    } else {
        println!("  Merged output:     not found ({})", merged.path);
    }

    println!();
    if ai.exists {
        println!("  Records:           found ({})", ai.path);
        println!("    chunks processed: {}", ai.chunks_processed);
        println!("    malformed:        {}", ai.malformed_records);
        println!("    unique tags:      {}", ai.tags_summary.len());

        let mut tags: Vec<(&String, &usize)> = ai.tags_summary.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (tag, count) in tags {
            println!("      {:<16} {:>6}", tag, count);
        }

        println!("    years detected:   {}", ai.years_detected.len());
        for (year, count) in &ai.year_counts {
            println!("      {:<16} {:>6}", year, count);
        }

        let methods: BTreeMap<&String, &usize> = ai.processing_methods.iter().collect();
        if !methods.is_empty() {
            println!("    processing methods:");
            for (method, count) in methods {
                println!("      {:<16} {:>6}", method, count);
            }
        }
    } else {
        println!("  Records:           not found ({})", ai.path);
    }

    let summary = &report.summary;
    println!();
    println!("Pipeline Summary");
    println!("  total PDFs:        {}", summary.total_pdfs);
    println!("  files processed:   {}", summary.files_processed);
    println!("  total characters:  {}", summary.total_characters);
    println!("  chunks processed:  {}", summary.chunks_processed);
    println!("  unique tags:       {}", summary.unique_tags);
    println!("  years detected:    {}", summary.years_detected);
}

fn print_health(report: &HealthReport) {
    let summary = report.health();
    println!();
    println!("Health check");
    println!(
        "  merged output:  {}",
        if summary.merged_output_ok { "ok" } else { "missing" }
    );
    println!(
        "  records:        {}",
        if summary.records_ok { "ok" } else { "missing" }
    );
    println!("  overall status: {}", summary.overall_status);
    for issue in &report.issues {
        println!("    - {}", issue);
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
