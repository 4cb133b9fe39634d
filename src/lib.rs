//! # Compliance Copilot
//!
//! Chunking, domain tagging, and verification for text extracted from
//! compliance documents.
//!
//! The pipeline turns a merged text file (one blob with a boundary marker per
//! source PDF) into a JSON collection of categorized records, then checks the
//! artifacts on disk and reports pipeline health.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────────────────────┐   ┌──────────┐
//! │ Extract  │──▶│           Filter            │──▶│  Verify  │
//! │ PDF→text │   │ Chunk → Tag+Years → Record │   │  Report  │
//! └──────────┘   └────────────────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ccp extract                   # merge downloads/*.pdf into merged_output.txt
//! ccp filter --dry-run          # chunk and tag without writing
//! ccp filter                    # write data/ai_filtered_results.json
//! ccp verify                    # full report + health check
//! ccp verify --health-check     # status only
//! ccp run                       # all three stages
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Boundary-aware text chunking |
//! | [`years`] | Year detection |
//! | [`tagging`] | Rule-based and Gemini tagging with fallback |
//! | [`records`] | Record building and persistence |
//! | [`filter`] | Filter stage orchestration |
//! | [`extract`] | PDF extraction and merging |
//! | [`verify`] | Health report |

pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod models;
pub mod records;
pub mod tagging;
pub mod verify;
pub mod years;
