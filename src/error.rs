//! Error taxonomy for the filter and verify stages.
//!
//! Only [`PipelineError`] is fatal. [`CapabilityError`] is always recovered
//! by the tag inferencer, [`RecordError`] is counted by the verifier, and
//! [`ChunkError`] downgrades a single chunk to an untagged record.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Merged text artifact is absent or contains only whitespace.
    #[error("input missing or empty: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("failed to read input {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination could not be created or written.
    #[error("failed to write output {}: {reason}", path.display())]
    OutputWriteFailure { path: PathBuf, reason: String },
}

/// Failures of the external tagging capability.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("tagging call timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("capability returned no usable tags")]
    Empty,

    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

impl CapabilityError {
    /// Whether a second attempt has any chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            CapabilityError::Timeout(_) | CapabilityError::Transport(_) => true,
            CapabilityError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        CapabilityError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(e: serde_json::Error) -> Self {
        CapabilityError::MalformedResponse(e.to_string())
    }
}

/// A persisted record that violates the record schema.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {index}: {reason}")]
    Schema { index: usize, reason: String },

    #[error("record {index}: id must be positive")]
    NonPositiveId { index: usize },

    #[error("record {index}: duplicate tag '{tag}'")]
    DuplicateTag { index: usize, tag: String },

    #[error("record {index}: year {year} outside [1900, {max}]")]
    YearOutOfRange { index: usize, year: i32, max: i32 },

    #[error("record {index}: detected_years not ascending and unique")]
    YearsUnordered { index: usize },
}

/// Per-chunk failure; never aborts the run.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunk {index} is mostly undecodable ({replaced} of {total} chars replaced)")]
    Undecodable {
        index: usize,
        replaced: usize,
        total: usize,
    },
}
