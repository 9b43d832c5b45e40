use super::{Sink, StorageRecord};
use crate::error::StorageError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Tab-separated output file, one record per line. Truncated on open.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }
}

impl Sink for FileSink {
    fn open(&mut self) -> Result<(), StorageError> {
        let file = File::create(&self.path).map_err(|e| StorageError::Open {
            target: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %self.path.display(), "Opened output file");
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn store(&mut self, record: &StorageRecord) -> Result<(), StorageError> {
        let writer = self.writer.as_mut().ok_or(StorageError::NotOpen)?;
        writeln!(writer, "{}", record.to_tsv()).map_err(|e| StorageError::Store {
            content_id: record.content_id.clone(),
            reason: e.to_string(),
        })
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::debug!(path = %self.path.display(), "Closed output file");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
