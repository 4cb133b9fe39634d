//! Filter stage orchestration.
//!
//! Coordinates the full categorization flow: merged text → chunking →
//! tag inference + year extraction → record building → record file.
//! Chunks are processed strictly in order so id assignment is reproducible.
//! Capability failures and undecodable chunks are non-fatal.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::error::{ChunkError, PipelineError};
use crate::models::{CategorizedRecord, Chunk, ProcessingMethod};
use crate::records::{write_records, RecordBuilder};
use crate::tagging::{TagInferencer, TagOutcome};
use crate::years::extract_years;

/// Share of replacement characters above which a chunk is treated as undecodable.
const MAX_REPLACEMENT_RATIO: f64 = 0.1;

/// Per-invocation settings, resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub dry_run: bool,
    pub rules_only: bool,
    pub target_size: usize,
    pub max_size: usize,
}

impl FilterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input: config.paths.merged_file.clone(),
            output: config.paths.records_file.clone(),
            dry_run: false,
            rules_only: false,
            target_size: config.chunking.target_size,
            max_size: config.chunking.max_size,
        }
    }
}

/// Run the filter stage and print a summary.
pub async fn run_filter(config: &Config, opts: &FilterOptions) -> Result<Vec<CategorizedRecord>> {
    if opts.max_size < opts.target_size || opts.target_size == 0 {
        anyhow::bail!(
            "invalid chunk sizes: target {} / max {}",
            opts.target_size,
            opts.max_size
        );
    }

    let text = read_merged_text(&opts.input)?;

    let inferencer = if opts.rules_only {
        TagInferencer::rule_based()
    } else {
        TagInferencer::from_config(&config.tagging)?
    };
    info!(
        input = %opts.input.display(),
        capability = inferencer.capability_name(),
        "processing merged text"
    );

    let chunks = chunk_text(&text, opts.target_size, opts.max_size);
    info!(chunks = chunks.len(), "split text into chunks");

    let mut builder = RecordBuilder::from_config(&config.records);
    let records = categorize(&chunks, &inferencer, &mut builder).await;

    let distinct: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.tags.iter().map(|t| t.as_str()))
        .collect();
    let enhanced = records
        .iter()
        .filter(|r| r.processing_method == ProcessingMethod::AiEnhanced)
        .count();

    if opts.dry_run {
        println!("filter {} (dry-run)", opts.input.display());
    } else {
        println!("filter {}", opts.input.display());
    }
    println!("  tagging: {}", inferencer.capability_name());
    println!("  chunks processed: {}", builder.built());
    println!("  ai enhanced: {}", enhanced);
    println!("  distinct tags: {}", distinct.len());
    println!(
        "  tags found: [{}]",
        distinct.iter().copied().collect::<Vec<_>>().join(", ")
    );
    if let Some(first) = records.first() {
        println!("  first record:");
        for line in serde_json::to_string_pretty(first)?.lines() {
            println!("    {}", line);
        }
    }

    if opts.dry_run {
        println!("  records not written (dry-run)");
    } else {
        write_records(&opts.output, &records)?;
        info!(output = %opts.output.display(), records = records.len(), "records written");
        println!("  records written: {}", opts.output.display());
    }
    println!("ok");

    Ok(records)
}

/// Read the merged text artifact. Invalid UTF-8 is replaced rather than fatal;
/// a missing or blank file is [`PipelineError::InputMissing`].
pub fn read_merged_text(path: &Path) -> Result<String, PipelineError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::InputMissing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(PipelineError::InputUnreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.trim().is_empty() {
        return Err(PipelineError::InputMissing(path.to_path_buf()));
    }
    Ok(text)
}

/// Tag every chunk in order and build one record per chunk.
/// A chunk that fails analysis still gets a record, with no tags or years.
pub async fn categorize(
    chunks: &[Chunk],
    inferencer: &TagInferencer,
    builder: &mut RecordBuilder,
) -> Vec<CategorizedRecord> {
    let mut records = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        debug!(
            chunk = chunk.sequence_index + 1,
            total = chunks.len(),
            chars = chunk.char_count,
            "processing chunk"
        );
        let record = match analyze_chunk(chunk, inferencer).await {
            Ok((outcome, years)) => builder.build(chunk, &outcome.tags, &years, outcome.method),
            Err(e) => {
                warn!(error = %e, "chunk recorded without tags");
                builder.build(chunk, &[], &BTreeSet::new(), ProcessingMethod::RuleBased)
            }
        };
        records.push(record);
    }

    records
}

async fn analyze_chunk(
    chunk: &Chunk,
    inferencer: &TagInferencer,
) -> Result<(TagOutcome, BTreeSet<i32>), ChunkError> {
    let replaced = chunk.raw_text.chars().filter(|c| *c == '\u{FFFD}').count();
    if replaced as f64 > chunk.char_count as f64 * MAX_REPLACEMENT_RATIO {
        return Err(ChunkError::Undecodable {
            index: chunk.sequence_index,
            replaced,
            total: chunk.char_count,
        });
    }

    let outcome = inferencer.infer(&chunk.raw_text).await;
    let years = extract_years(&chunk.raw_text);
    Ok((outcome, years))
}
