use super::{Sink, StorageRecord};
use crate::error::StorageError;
use std::io::{self, Stdout, Write};

/// Writes tab-separated records to a stream, stdout by default
pub struct ConsoleSink<W: Write + Send = Stdout> {
    out: W,
    opened: bool,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, opened: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn open(&mut self) -> Result<(), StorageError> {
        self.opened = true;
        Ok(())
    }

    fn store(&mut self, record: &StorageRecord) -> Result<(), StorageError> {
        if !self.opened {
            return Err(StorageError::NotOpen);
        }
        writeln!(self.out, "{}", record.to_tsv())?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if std::mem::take(&mut self.opened) {
            self.out.flush()?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}
