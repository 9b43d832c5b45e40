//! Single consumer of the result queue

use super::cancel::CancelToken;
use super::counter::Counter;
use super::job::AnalysisResult;
use super::message::Message;
use crate::error::StorageError;
use crate::storage::{Sink, StorageRecord};
use crate::summary::FingerprintTally;
use crossbeam::channel::Receiver;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StashReport {
    pub stored: usize,
    pub sentinels: usize,
    pub tally: FingerprintTally,
}

/// Owns the sink for the whole run: opens it once, closes it exactly once.
pub struct Stasher<S: Sink> {
    sink: S,
    results: Receiver<Message<AnalysisResult>>,
    counter: Arc<Counter>,
    cancel: CancelToken,
}

impl<S: Sink> Stasher<S> {
    pub fn new(
        sink: S,
        results: Receiver<Message<AnalysisResult>>,
        counter: Arc<Counter>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            sink,
            results,
            counter,
            cancel,
        }
    }

    /// Drain results into the sink until `Done`.
    ///
    /// A storage failure raises cancellation and ends the run with that error.
    pub fn run(mut self) -> Result<StashReport, StorageError> {
        let mut report = StashReport::default();
        let drained = self.drain(&mut report);
        let closed = self.sink.close();

        let outcome = drained.and(closed);
        match &outcome {
            Ok(()) => tracing::info!(
                sink = %self.sink.describe(),
                stored = report.stored,
                "Results stored"
            ),
            Err(error) => {
                tracing::error!(sink = %self.sink.describe(), %error, "Storage failed");
                self.cancel.raise();
            }
        }
        outcome.map(|()| report)
    }

    fn drain(&mut self, report: &mut StashReport) -> Result<(), StorageError> {
        self.sink.open()?;

        while let Ok(message) = self.results.recv() {
            let result = match message {
                Message::Done => {
                    report.sentinels += 1;
                    break;
                }
                Message::Item(result) => result,
            };
            self.sink.store(&StorageRecord::from(&result))?;
            self.counter.increment();
            report.tally.record(&result);
            report.stored += 1;
        }
        Ok(())
    }
}
