//! PDF text extraction and merging.
//!
//! Produces the merged text artifact consumed by the filter stage: every PDF
//! in the downloads directory is extracted and wrapped in
//! `===== BEGIN FILE: <name> =====` / `===== END FILE: <name> =====` markers.
//! A document that cannot be extracted is kept in the merged text as an
//! `(EXTRACTION FAILED)` block so the file count stays truthful.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::DOCUMENT_MARKER;
use crate::config::Config;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("no text content found")]
    NoText,
}

/// Outcome of extracting one source document.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub name: String,
    pub result: Result<String, ExtractError>,
}

/// Extract plain text from PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(text)
}

/// List the source documents directly inside `dir` whose file names match
/// `include_globs`, sorted by name. A missing directory yields an empty list.
pub fn find_documents(dir: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let include_set = build_globset(include_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if include_set.is_match(&*name) {
            paths.push(entry.path().to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Render extracted documents as one merged text with boundary markers.
pub fn merge_documents(docs: &[ExtractedDocument], generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!("# Merged PDF text generated at {}", generated_at.to_rfc3339()),
        "# Each file is separated by a header marker".to_string(),
        String::new(),
    ];

    for doc in docs {
        match &doc.result {
            Ok(text) => {
                lines.push(format!("{} {} =====", DOCUMENT_MARKER, doc.name));
                lines.push(text.trim().to_string());
                lines.push(format!("===== END FILE: {} =====", doc.name));
            }
            Err(e) => {
                lines.push(format!(
                    "{} {} (EXTRACTION FAILED) =====",
                    DOCUMENT_MARKER, doc.name
                ));
                lines.push(format!("[ERROR: {}]", e));
                lines.push(format!("===== END FILE: {} (EXTRACTION FAILED) =====", doc.name));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Counts reported by [`run_extract`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub found: usize,
    pub extracted: usize,
    pub failed: usize,
    pub written: bool,
}

/// Extract every document in the downloads directory into the merged file.
/// An existing merged file is kept unless `force` is set.
pub fn run_extract(config: &Config, force: bool) -> Result<ExtractSummary> {
    let merged_path = &config.paths.merged_file;
    let mut summary = ExtractSummary::default();

    println!("extract {}", config.paths.downloads_dir.display());

    if merged_path.exists() && !force {
        info!(path = %merged_path.display(), "merged output already exists; skipping extraction");
        println!("  merged output exists: {} (use --force to rebuild)", merged_path.display());
        println!("ok");
        return Ok(summary);
    }

    let paths = find_documents(&config.paths.downloads_dir, &config.extract.include_globs)?;
    summary.found = paths.len();
    if paths.is_empty() {
        warn!(dir = %config.paths.downloads_dir.display(), "no documents found");
        println!("  documents found: 0");
        println!("ok");
        return Ok(summary);
    }

    let mut docs = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let result = std::fs::read(path)
            .map_err(|e| ExtractError::Pdf(e.to_string()))
            .and_then(|bytes| extract_pdf(&bytes));
        match &result {
            Ok(text) => {
                summary.extracted += 1;
                info!(file = %name, chars = text.chars().count(), "extracted");
            }
            Err(e) => {
                summary.failed += 1;
                warn!(file = %name, error = %e, "extraction failed");
            }
        }
        docs.push(ExtractedDocument { name, result });
    }

    let merged = merge_documents(&docs, Utc::now());
    if let Some(parent) = merged_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(merged_path, &merged)
        .with_context(|| format!("Failed to write merged output: {}", merged_path.display()))?;
    summary.written = true;

    println!("  documents found: {}", summary.found);
    println!("  extracted: {}", summary.extracted);
    println!("  failed: {}", summary.failed);
    println!("  merged output: {}", merged_path.display());
    println!("  characters: {}", merged.chars().count());
    println!("ok");

    Ok(summary)
}
