//! Job discovery
//!
//! Turns the user's input (a file, a directory, or a glob expression) into the raw
//! candidate list. No validation happens here: directories and dangling entries stay
//! in the listing so the validator decides, and the raw size is only an estimate.
//! Dot-files are skipped unless the pattern itself starts with `.`.

use crate::config::SourceConfig;
use crate::error::SourceError;
use globset::{GlobBuilder, GlobMatcher};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Enumerates candidate jobs from a path, directory, or glob
pub struct JobSource {
    matcher: GlobMatcher,
    include_hidden: bool,
    recursive: bool,
    follow_symlinks: bool,
}

impl JobSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let matcher = GlobBuilder::new(&config.pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| SourceError::Pattern {
                pattern: config.pattern.clone(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            matcher,
            include_hidden: config.pattern.starts_with('.'),
            recursive: config.recursive,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Enumerate the raw candidate list for `input`, sorted for stable ordering
    pub fn discover(&self, input: &Path) -> Result<Vec<PathBuf>, SourceError> {
        let mut candidates = if input.is_dir() {
            self.list_directory(input)?
        } else if input.exists() || input.symlink_metadata().is_ok() {
            vec![input.to_path_buf()]
        } else if is_glob_pattern(&input.to_string_lossy()) {
            expand_glob_pattern(input, self.follow_symlinks)?
        } else {
            return Err(SourceError::NotFound(input.to_path_buf()));
        };

        candidates.sort();
        tracing::info!(
            input = %input.display(),
            candidates = candidates.len(),
            "Enumerated candidate jobs"
        );
        Ok(candidates)
    }

    fn list_directory(&self, dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
        if self.recursive {
            let candidates = WalkDir::new(dir)
                .min_depth(1)
                .follow_links(self.follow_symlinks)
                .into_iter()
                .filter_entry(|entry| self.include_hidden || !is_hidden_below_root(entry))
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Error walking directory: {}", e);
                        None
                    }
                })
                .filter(|entry| !entry.file_type().is_dir())
                .filter(|entry| self.matches(entry.file_name()))
                .map(|entry| entry.into_path())
                .collect();
            return Ok(candidates);
        }

        let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            if self.matches(&entry.file_name()) {
                candidates.push(entry.path());
            }
        }
        Ok(candidates)
    }

    fn matches(&self, name: &OsStr) -> bool {
        (self.include_hidden || !is_hidden(name)) && self.matcher.is_match(name)
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// The walk root itself may be a dot-directory; only what lies under it is filtered
fn is_hidden_below_root(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_hidden(entry.file_name())
}

/// Check if a string contains glob pattern characters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

/// Expand a glob expression such as `samples/**/*.pdf` to the matching paths.
///
/// The walk starts at the longest literal directory prefix of the pattern, which
/// must exist.
pub fn expand_glob_pattern(pattern: &Path, follow_symlinks: bool) -> Result<Vec<PathBuf>, SourceError> {
    let pattern_str = pattern.to_string_lossy();
    let matcher = GlobBuilder::new(&pattern_str)
        .literal_separator(true)
        .build()
        .map_err(|source| SourceError::Pattern {
            pattern: pattern_str.to_string(),
            source,
        })?
        .compile_matcher();

    let base_dir = literal_prefix(pattern);
    if !base_dir.is_dir() {
        return Err(SourceError::NotFound(pattern.to_path_buf()));
    }
    let include_hidden = pattern.file_name().is_some_and(is_hidden);

    let matching_paths = WalkDir::new(&base_dir)
        .min_depth(1)
        .follow_links(follow_symlinks)
        .into_iter()
        .filter_entry(|entry| include_hidden || !is_hidden_below_root(entry))
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| matcher.is_match(path))
        .collect();

    Ok(matching_paths)
}

/// Leading components of `pattern` that contain no glob characters
fn literal_prefix(pattern: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in pattern.components() {
        if let Component::Normal(part) = component
            && is_glob_pattern(&part.to_string_lossy())
        {
            break;
        }
        prefix.push(component);
    }
    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    }
}
