//! Error types for treeprint
//!
//! Library components return these typed errors; the CLI wraps them in `anyhow`.
//! Per-file analysis failures are never propagated through the pipeline: workers
//! turn them into diagnostic records.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of the analysis collaborator on a single file
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not in a format the analyzer understands
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// The file was recognised but its structure could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The analyzer panicked while processing the file
    #[error("Analyzer panicked: {0}")]
    Panicked(String),
}

/// Storage sink failure. Fatal for the batch.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open {target}: {reason}")]
    Open { target: String, reason: String },

    #[error("Failed to store record {content_id:?}: {reason}")]
    Store { content_id: String, reason: String },

    /// `store` was called before `open` succeeded
    #[error("Storage sink is not open")]
    NotOpen,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input enumeration failure. Fatal at startup.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unable to find input file/directory: {0}")]
    NotFound(PathBuf),

    #[error("Invalid glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failure of a whole pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Pipeline thread panicked: {0}")]
    ThreadPanic(&'static str),
}
