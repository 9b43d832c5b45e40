//! Wiring and shutdown of one pipeline run

use super::cancel::CancelToken;
use super::counter::{Counter, CounterSnapshot};
use super::jobber::{Jobber, JobberReport};
use super::message::Message;
use super::monitor::ProgressMonitor;
use super::stasher::{StashReport, Stasher};
use super::validator::{MaxSizeValidator, RegularFileValidator, ValidatorChain};
use super::worker::{Worker, WorkerReport};
use crate::analysis::Analyzer;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::storage::Sink;
use crate::summary::FingerprintTally;
use crossbeam::channel::{bounded, unbounded};
use indicatif::ProgressDrawTarget;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counter advanced by workers, once per analyzed job
pub const JOBS_COUNTER: &str = "jobs";
/// Counter advanced by the stasher, once per stored record
pub const RESULTS_COUNTER: &str = "results";

/// Totals of a finished run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub workers: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub processed: usize,
    pub failed: usize,
    pub discarded: usize,
    pub stored: usize,
    pub worker_sentinels: usize,
    pub stasher_sentinels: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
    /// Final state of every counter, by name
    pub counters: Vec<(&'static str, CounterSnapshot)>,
    pub tally: FingerprintTally,
}

/// A configured pipeline. `run` may be called more than once.
pub struct Pipeline<A: Analyzer> {
    analyzer: A,
    validators: ValidatorChain,
    workers: usize,
    queue_capacity: usize,
    tick: Duration,
    cancel: CancelToken,
    show_progress: bool,
}

impl<A: Analyzer> Pipeline<A> {
    /// Pipeline sized from configuration, accepting regular files only
    pub fn new(analyzer: A, config: &PipelineConfig) -> Self {
        let workers = config.worker_count();
        Self {
            analyzer,
            validators: ValidatorChain::new().with(RegularFileValidator),
            workers,
            queue_capacity: config.queue_capacity(workers),
            tick: Duration::from_millis(config.tick_ms.max(1)),
            cancel: CancelToken::new(),
            show_progress: false,
        }
    }

    /// Add a size limit on top of the current validators; 0 leaves them unchanged
    pub fn with_max_file_size_mb(mut self, max_size_mb: u64) -> Self {
        if max_size_mb > 0 {
            self.validators = self.validators.with(MaxSizeValidator::new(max_size_mb));
        }
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the batch over `candidates`, storing every result in `sink`.
    ///
    /// Shutdown is a two-phase barrier: the jobber and all workers are joined first,
    /// which guarantees every result is queued; only then does the stasher get its
    /// `Done`, and it is joined last.
    pub fn run<S: Sink>(
        &self,
        candidates: Vec<PathBuf>,
        sink: S,
    ) -> Result<PipelineReport, PipelineError> {
        let start_time = Instant::now();
        let workers = self.workers;
        let total_candidates = candidates.len();
        tracing::info!(
            workers,
            candidates = total_candidates,
            sink = %sink.describe(),
            "Starting pipeline"
        );

        let (event_tx, event_rx) = unbounded();
        let (warning_tx, warning_rx) = unbounded();
        let jobs_counter = Arc::new(Counter::with_events(JOBS_COUNTER, event_tx.clone()));
        let results_counter = Arc::new(Counter::with_events(RESULTS_COUNTER, event_tx));
        jobs_counter.set_soft_max(total_candidates);
        results_counter.set_soft_max(total_candidates);

        let draw_target = if self.show_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let monitor = ProgressMonitor::new(
            event_rx,
            warning_rx,
            &[JOBS_COUNTER, RESULTS_COUNTER],
            self.tick,
            draw_target,
        );
        let monitor_handle = thread::spawn(move || monitor.run());

        let (job_tx, job_rx) = bounded(self.queue_capacity);
        let (result_tx, result_rx) = bounded(self.queue_capacity);

        let joined = crossbeam::thread::scope(|s| {
            let stasher = Stasher::new(sink, result_rx, results_counter.clone(), self.cancel.clone());
            let stasher_handle = s.spawn(move |_| stasher.run());

            let jobber = Jobber::new(
                &self.validators,
                job_tx,
                workers,
                vec![jobs_counter.clone(), results_counter.clone()],
                self.cancel.clone(),
            );
            let jobber_handle = s.spawn(move |_| jobber.run(candidates));

            let worker_handles: Vec<_> = (0..workers)
                .map(|id| {
                    let worker = Worker::new(
                        id,
                        &self.analyzer,
                        job_rx.clone(),
                        result_tx.clone(),
                        jobs_counter.clone(),
                        warning_tx.clone(),
                        self.cancel.clone(),
                    );
                    s.spawn(move |_| worker.run())
                })
                .collect();
            drop(job_rx);

            // Phase 1: all jobs drained, all results queued
            let jobber_report = jobber_handle.join();
            let worker_reports: Vec<_> = worker_handles.into_iter().map(|h| h.join()).collect();

            // Phase 2: release the stasher
            if result_tx.send(Message::Done).is_err() {
                tracing::debug!("Stasher exited before its Done");
            }
            drop(result_tx);
            let stash_outcome = stasher_handle.join();

            (jobber_report, worker_reports, stash_outcome)
        })
        .map_err(|_| PipelineError::ThreadPanic("pipeline"))?;

        let counters = vec![
            (JOBS_COUNTER, jobs_counter.snapshot()),
            (RESULTS_COUNTER, results_counter.snapshot()),
        ];
        // Dropping the last senders lets the monitor see a closed channel
        drop(jobs_counter);
        drop(results_counter);
        drop(warning_tx);
        if monitor_handle.join().is_err() {
            tracing::warn!("Progress monitor panicked");
        }

        let (jobber_report, worker_reports, stash_outcome) = joined;
        let jobber_report: JobberReport =
            jobber_report.map_err(|_| PipelineError::ThreadPanic("jobber"))?;
        let worker_reports = worker_reports
            .into_iter()
            .collect::<Result<Vec<WorkerReport>, _>>()
            .map_err(|_| PipelineError::ThreadPanic("worker"))?;
        let stash: StashReport = stash_outcome.map_err(|_| PipelineError::ThreadPanic("stasher"))??;

        let report = PipelineReport {
            workers,
            candidates: total_candidates,
            accepted: jobber_report.accepted,
            rejected: jobber_report.rejected,
            processed: worker_reports.iter().map(|r| r.processed).sum(),
            failed: worker_reports.iter().map(|r| r.failed).sum(),
            discarded: worker_reports.iter().map(|r| r.discarded).sum(),
            stored: stash.stored,
            worker_sentinels: worker_reports.iter().map(|r| r.sentinels).sum(),
            stasher_sentinels: stash.sentinels,
            cancelled: jobber_report.cancelled || self.cancel.is_raised(),
            elapsed: start_time.elapsed(),
            counters,
            tally: stash.tally,
        };
        tracing::info!(
            accepted = report.accepted,
            stored = report.stored,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline finished"
        );
        Ok(report)
    }
}
