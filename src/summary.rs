//! Fingerprint deduplication summary

use crate::pipeline::AnalysisResult;
use std::collections::HashMap;
use std::fmt::Write;

/// Counts stored files per tree fingerprint. Failed records are not tallied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintTally {
    counts: HashMap<String, usize>,
    files: usize,
}

impl FingerprintTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &AnalysisResult) {
        if result.is_failure() || result.fingerprint.is_empty() {
            return;
        }
        self.files += 1;
        *self.counts.entry(result.fingerprint.clone()).or_default() += 1;
    }

    /// Number of successfully fingerprinted files
    pub fn files(&self) -> usize {
        self.files
    }

    /// Number of distinct fingerprints
    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    /// Fingerprints with their file counts, ascending by count then fingerprint
    pub fn entries(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(fingerprint, count)| (fingerprint.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Files: {}", self.files);
        let _ = writeln!(out, "Unique trees: {}", self.unique());
        for (fingerprint, count) in self.entries() {
            let _ = writeln!(out, "{fingerprint} {count}");
        }
        out
    }
}
