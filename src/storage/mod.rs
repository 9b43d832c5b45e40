//! Result persistence
//!
//! Every backend implements [`Sink`]: opened once by the stasher, fed one
//! [`StorageRecord`] per analyzed job, closed exactly once. [`Destination`] is the
//! closed set of backends the `-o` flag can select.

mod console;
mod database;
mod file;

pub use console::ConsoleSink;
pub use database::DatabaseSink;
pub use file::FileSink;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::pipeline::AnalysisResult;
use chrono::{DateTime, Local};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Tokens selecting the console sink
pub const CONSOLE_TOKENS: &[&str] = &["stdout", "console", "-"];

/// Tokens selecting the database sink
pub const DATABASE_TOKENS: &[&str] = &["db", "database"];

/// A storage backend
pub trait Sink: Send {
    /// Acquire the underlying resource. Called once before any `store`.
    fn open(&mut self) -> Result<(), StorageError>;

    /// Persist one record
    fn store(&mut self, record: &StorageRecord) -> Result<(), StorageError>;

    /// Flush and release the resource. Safe to call when `open` failed.
    fn close(&mut self) -> Result<(), StorageError>;

    /// Human readable target, for status lines
    fn describe(&self) -> String;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn open(&mut self) -> Result<(), StorageError> {
        (**self).open()
    }

    fn store(&mut self, record: &StorageRecord) -> Result<(), StorageError> {
        (**self).store(record)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Column-aligned projection of an [`AnalysisResult`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub content_id: String,
    pub fingerprint: String,
    pub tree: String,
    pub script: String,
    pub binary: String,
    pub file_name: String,
}

impl StorageRecord {
    /// Fixed column order shared by every backend
    pub const COLUMNS: [&'static str; 6] =
        ["content_id", "fingerprint", "tree", "script", "binary", "file_name"];

    /// Field values in [`Self::COLUMNS`] order
    pub fn fields(&self) -> [&str; 6] {
        [
            &self.content_id,
            &self.fingerprint,
            &self.tree,
            &self.script,
            &self.binary,
            &self.file_name,
        ]
    }

    /// One tab-separated line, without the trailing newline
    pub fn to_tsv(&self) -> String {
        self.fields()
            .iter()
            .map(|field| escape_field(field))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

impl From<&AnalysisResult> for StorageRecord {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            content_id: result.content_id.clone(),
            fingerprint: result.fingerprint.clone(),
            tree: result.tree.clone(),
            script: result.script.clone(),
            binary: result.binary.clone(),
            file_name: result.file_name.clone(),
        }
    }
}

/// Escape a field so it cannot break the tab-separated layout
pub fn escape_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Where results go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Console,
    File(PathBuf),
    Database(PathBuf),
}

impl Destination {
    /// Resolve the `-o` argument.
    ///
    /// Returns the destination and, when the token was unusable and the default file
    /// name was substituted, a warning for the user.
    pub fn parse(
        token: Option<&str>,
        config: &StorageConfig,
        now: DateTime<Local>,
    ) -> (Self, Option<String>) {
        let default = || Destination::File(default_output_path(config, now));

        let Some(raw) = token else {
            return (default(), None);
        };
        let trimmed = raw.trim();

        if CONSOLE_TOKENS.contains(&trimmed) {
            return (Destination::Console, None);
        }
        if DATABASE_TOKENS.contains(&trimmed) {
            return (Destination::Database(config.database_path.clone()), None);
        }

        let invalid = if trimmed.is_empty() {
            Some("is empty")
        } else if trimmed.ends_with('/') || trimmed.ends_with(MAIN_SEPARATOR) {
            Some("ends in a path separator")
        } else if Path::new(trimmed).is_dir() {
            Some("names a directory")
        } else {
            None
        };

        match invalid {
            Some(reason) => {
                let fallback = default();
                let warning = format!(
                    "Output {raw:?} {reason}; writing to {} instead",
                    fallback.describe()
                );
                (fallback, Some(warning))
            }
            None => (Destination::File(PathBuf::from(trimmed)), None),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Destination::Console => "stdout".to_string(),
            Destination::File(path) => path.display().to_string(),
            Destination::Database(path) => format!("sqlite:{}", path.display()),
        }
    }

    /// Build the sink for this destination
    pub fn into_sink(self, config: &StorageConfig) -> Box<dyn Sink> {
        match self {
            Destination::Console => Box::new(ConsoleSink::stdout()),
            Destination::File(path) => Box::new(FileSink::new(path)),
            Destination::Database(path) => Box::new(DatabaseSink::new(path, config.table.clone())),
        }
    }
}

/// `<prefix>YYYY-MM-DD_HH-MM-SS.txt` in the working directory
pub fn default_output_path(config: &StorageConfig, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "{}{}.txt",
        config.default_prefix,
        now.format("%Y-%m-%d_%H-%M-%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn default_file() -> Destination {
        Destination::File(PathBuf::from("t-hash-2024-03-09_14-05-07.txt"))
    }

    #[test]
    fn test_default_when_no_token() {
        let (dest, warning) = Destination::parse(None, &StorageConfig::default(), fixed_now());
        assert_eq!(dest, default_file());
        assert!(warning.is_none());
    }

    #[test]
    fn test_keywords() {
        let config = StorageConfig::default();
        for token in ["stdout", "console", "-", " stdout "] {
            assert_eq!(Destination::parse(Some(token), &config, fixed_now()).0, Destination::Console);
        }
        for token in ["db", "database"] {
            assert_eq!(
                Destination::parse(Some(token), &config, fixed_now()).0,
                Destination::Database(PathBuf::from("treeprint.sqlite"))
            );
        }
    }

    #[test]
    fn test_plain_path_is_file() {
        let (dest, warning) =
            Destination::parse(Some("results.tsv"), &StorageConfig::default(), fixed_now());
        assert_eq!(dest, Destination::File(PathBuf::from("results.tsv")));
        assert!(warning.is_none());
    }

    #[test]
    fn test_invalid_tokens_fall_back_with_warning() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_string_lossy().into_owned();
        let config = StorageConfig::default();

        for token in ["", "   ", "out/", dir.as_str()] {
            let (dest, warning) = Destination::parse(Some(token), &config, fixed_now());
            assert_eq!(dest, default_file(), "token {token:?}");
            assert!(warning.is_some(), "token {token:?}");
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a\tb\nc\r\\"), "a\\tb\\nc\\r\\\\");
    }

    #[test]
    fn test_record_tsv_keeps_empty_columns() {
        let result = AnalysisResult::failure(
            "abc".to_string(),
            "b.bin".to_string(),
            "Parse error:\nbad".to_string(),
        );
        let record = StorageRecord::from(&result);
        assert_eq!(record.to_tsv(), "abc\t\tParse error:\\nbad\t\t\tb.bin");
        assert_eq!(record.to_tsv().split('\t').count(), StorageRecord::COLUMNS.len());
    }
}
