//! Work items flowing through the pipeline queues

use std::path::{Path, PathBuf};

/// A file to analyze. Identity is the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Job {
    path: PathBuf,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used to label records and progress lines
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Outcome of analyzing one job.
///
/// Every result carries the same fields. A failed analysis leaves the fingerprint
/// and artifacts empty and puts a diagnostic message in `tree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// SHA-256 of the file contents; empty if the file could not be read
    pub content_id: String,
    /// SHA-256 of `tree`; empty on failure
    pub fingerprint: String,
    /// Canonical tree text, or the diagnostic on failure
    pub tree: String,
    pub script: String,
    /// Hex of embedded binaries
    pub binary: String,
    pub file_name: String,
    failed: bool,
}

impl AnalysisResult {
    /// Create a successful result
    pub fn success(
        content_id: String,
        fingerprint: String,
        tree: String,
        script: String,
        binary: String,
        file_name: String,
    ) -> Self {
        Self {
            content_id,
            fingerprint,
            tree,
            script,
            binary,
            file_name,
            failed: false,
        }
    }

    /// Create a failed result carrying a diagnostic
    pub fn failure(content_id: String, file_name: String, diagnostic: String) -> Self {
        Self {
            content_id,
            fingerprint: String::new(),
            tree: diagnostic,
            script: String::new(),
            binary: String::new(),
            file_name,
            failed: true,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failed
    }
}
