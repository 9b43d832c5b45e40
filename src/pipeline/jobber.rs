//! Job producer

use super::cancel::CancelToken;
use super::counter::Counter;
use super::job::Job;
use super::message::Message;
use super::validator::ValidatorChain;
use crossbeam::channel::Sender;
use std::path::PathBuf;
use std::sync::Arc;

/// What the jobber did with the raw candidate list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobberReport {
    pub accepted: usize,
    pub rejected: usize,
    /// Enqueuing stopped early because cancellation was raised
    pub cancelled: bool,
}

/// Validates candidates and feeds the job queue.
///
/// Exactly `workers` `Done` messages follow the last job, whatever happened before,
/// and only then is the accepted count published as every counter's hard max.
pub struct Jobber<'a> {
    validators: &'a ValidatorChain,
    jobs: Sender<Message<Job>>,
    workers: usize,
    counters: Vec<Arc<Counter>>,
    cancel: CancelToken,
}

impl<'a> Jobber<'a> {
    pub fn new(
        validators: &'a ValidatorChain,
        jobs: Sender<Message<Job>>,
        workers: usize,
        counters: Vec<Arc<Counter>>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            validators,
            jobs,
            workers,
            counters,
            cancel,
        }
    }

    pub fn run(self, candidates: Vec<PathBuf>) -> JobberReport {
        let mut report = JobberReport::default();

        for candidate in candidates {
            if self.cancel.is_raised() {
                report.cancelled = true;
                break;
            }
            if let Some(validator) = self.validators.rejected_by(&candidate) {
                tracing::debug!(path = %candidate.display(), validator, "Rejected job");
                report.rejected += 1;
                continue;
            }
            if self.jobs.send(Message::Item(Job::new(candidate))).is_err() {
                // Every worker is gone; nothing left to feed
                tracing::error!("Job queue closed before all jobs were enqueued");
                report.cancelled = true;
                break;
            }
            report.accepted += 1;
        }

        for _ in 0..self.workers {
            if self.jobs.send(Message::Done).is_err() {
                break;
            }
        }

        for counter in &self.counters {
            counter.set_hard_max(report.accepted);
        }
        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected,
            cancelled = report.cancelled,
            "Jobs enqueued"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validator::RegularFileValidator;
    use crossbeam::channel::unbounded;
    use std::fs;
    use tempfile::TempDir;

    fn chain() -> ValidatorChain {
        ValidatorChain::new().with(RegularFileValidator)
    }

    #[test]
    fn test_enqueues_valid_jobs_then_one_done_per_worker() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.bin");
        fs::write(&a, b"a").unwrap();
        let missing = temp_dir.path().join("c.bin");

        let validators = chain();
        let counter = Arc::new(Counter::new("jobs"));
        let (tx, rx) = unbounded();
        let report = Jobber::new(&validators, tx, 3, vec![counter.clone()], CancelToken::new())
            .run(vec![a.clone(), missing, temp_dir.path().to_path_buf()]);

        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 2);
        assert!(!report.cancelled);
        assert_eq!(counter.hard_max(), Some(1));

        let messages: Vec<_> = rx.iter().collect();
        assert_eq!(messages[0], Message::Item(Job::new(a)));
        assert_eq!(messages.iter().filter(|m| m.is_done()).count(), 3);
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_empty_input_publishes_zero() {
        let validators = chain();
        let counter = Arc::new(Counter::new("jobs"));
        let (tx, rx) = unbounded();
        let report = Jobber::new(&validators, tx, 2, vec![counter.clone()], CancelToken::new())
            .run(Vec::new());

        assert_eq!(report.accepted, 0);
        assert!(counter.is_complete());
        assert_eq!(rx.iter().filter(|m| m.is_done()).count(), 2);
    }

    #[test]
    fn test_cancelled_jobber_still_sends_sentinels() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.bin");
        fs::write(&a, b"a").unwrap();

        let validators = chain();
        let cancel = CancelToken::new();
        cancel.raise();
        let (tx, rx) = unbounded();
        let report = Jobber::new(&validators, tx, 2, Vec::new(), cancel).run(vec![a]);

        assert!(report.cancelled);
        assert_eq!(report.accepted, 0);
        let messages: Vec<_> = rx.iter().collect();
        assert_eq!(messages, vec![Message::Done, Message::Done]);
    }
}
