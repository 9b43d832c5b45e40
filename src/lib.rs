//! # treeprint - structural fingerprints for document batches
//!
//! Analyzes large sets of files concurrently, reduces each to the text of its object
//! tree, hashes that text into a fingerprint, and records one row per file together
//! with any embedded scripts and binaries. Per-file failures become diagnostic rows;
//! they never stop the batch.
//!
//! ## Quick Start
//!
//! ```bash
//! # Fingerprint every file in a directory into t-hash-<timestamp>.txt
//! treeprint samples/
//!
//! # Recursive, PDFs only, rows on stdout, with a dedup summary
//! treeprint samples/ --recursive --pattern '*.pdf' -o stdout --summary
//!
//! # Append rows to the configured SQLite database
//! treeprint 'samples/**/*.pdf' -o db
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod summary;

pub use cli::{Cli, Output};
pub use config::TreeprintConfig;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
