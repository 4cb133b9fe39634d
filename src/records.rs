//! Categorized record construction and persistence.
//!
//! [`RecordBuilder`] owns the run-scoped id counter: ids start at 1 and
//! increase by one per built record, across every document in the run.
//! A fresh builder per run keeps runs independent and reproducible.

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::RecordsConfig;
use crate::error::PipelineError;
use crate::models::{CategorizedRecord, Chunk, Domain, ProcessingMethod};

pub struct RecordBuilder {
    next_id: u64,
    sample_chars: usize,
    summary_chars: usize,
}

impl RecordBuilder {
    pub fn new(sample_chars: usize, summary_chars: usize) -> Self {
        Self {
            next_id: 1,
            sample_chars,
            summary_chars,
        }
    }

    pub fn from_config(config: &RecordsConfig) -> Self {
        Self::new(config.sample_chars, config.summary_chars)
    }

    /// Number of records built so far.
    pub fn built(&self) -> u64 {
        self.next_id - 1
    }

    pub fn build(
        &mut self,
        chunk: &Chunk,
        tags: &[Domain],
        years: &BTreeSet<i32>,
        method: ProcessingMethod,
    ) -> CategorizedRecord {
        let id = self.next_id;
        self.next_id += 1;

        let mut unique_tags = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique_tags.contains(tag) {
                unique_tags.push(*tag);
            }
        }

        CategorizedRecord {
            id,
            created_at: Utc::now(),
            summary: summarize(&chunk.raw_text, self.summary_chars),
            tags: unique_tags,
            detected_years: years.iter().copied().collect(),
            sample_text: chunk.raw_text.chars().take(self.sample_chars).collect(),
            processing_method: method,
        }
    }
}

/// First sentence of `text` if it ends within `max_chars`; otherwise the text
/// cut at the last word boundary before `max_chars`, followed by `...`.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return String::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let limit = chars.len().min(max_chars);

    let sentence_end = (0..limit).find(|&i| {
        matches!(chars[i], '.' | '!' | '?')
            && chars.get(i + 1).map_or(true, |c| c.is_whitespace())
    });
    if let Some(end) = sentence_end {
        return collapse_whitespace(&chars[..=end]);
    }

    if chars.len() <= max_chars {
        return collapse_whitespace(&chars);
    }

    let cut = (1..limit)
        .rev()
        .find(|&i| chars[i].is_whitespace())
        .unwrap_or(limit);
    format!("{}...", collapse_whitespace(&chars[..cut]))
}

fn collapse_whitespace(chars: &[char]) -> String {
    chars
        .iter()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace the record collection at `path` with `records` as a JSON array.
pub fn write_records(path: &Path, records: &[CategorizedRecord]) -> Result<(), PipelineError> {
    let failure = |reason: String| PipelineError::OutputWriteFailure {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| failure(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(records).map_err(|e| failure(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| failure(e.to_string()))
}
