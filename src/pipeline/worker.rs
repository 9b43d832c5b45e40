//! Analysis workers

use super::cancel::CancelToken;
use super::counter::Counter;
use super::job::{AnalysisResult, Job};
use super::message::Message;
use crate::analysis::{
    Analyzer, Document, content_id, extract_embedded_binaries, extract_scripts, render_tree,
    tree_fingerprint,
};
use crate::error::AnalysisError;
use crossbeam::channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Out-of-band notice for the progress monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub file_name: String,
    pub message: String,
}

/// Per-worker totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub processed: usize,
    pub failed: usize,
    /// Jobs dropped unprocessed after cancellation
    pub discarded: usize,
    /// `Done` messages consumed; 1 for a worker that shut down normally
    pub sentinels: usize,
}

pub struct Worker<'a, A: Analyzer> {
    id: usize,
    analyzer: &'a A,
    jobs: Receiver<Message<Job>>,
    results: Sender<Message<AnalysisResult>>,
    counter: Arc<Counter>,
    warnings: Sender<Warning>,
    cancel: CancelToken,
}

impl<'a, A: Analyzer> Worker<'a, A> {
    pub fn new(
        id: usize,
        analyzer: &'a A,
        jobs: Receiver<Message<Job>>,
        results: Sender<Message<AnalysisResult>>,
        counter: Arc<Counter>,
        warnings: Sender<Warning>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            analyzer,
            jobs,
            results,
            counter,
            warnings,
            cancel,
        }
    }

    /// Pull jobs until this worker's `Done` arrives
    pub fn run(self) -> WorkerReport {
        let mut report = WorkerReport::default();

        while let Ok(message) = self.jobs.recv() {
            let job = match message {
                Message::Done => {
                    report.sentinels += 1;
                    break;
                }
                Message::Item(job) => job,
            };

            if self.cancel.is_raised() {
                report.discarded += 1;
                continue;
            }

            let result = analyze_job(self.analyzer, &job);
            let warning = result.is_failure().then(|| Warning {
                file_name: result.file_name.clone(),
                message: result.tree.clone(),
            });

            if self.results.send(Message::Item(result)).is_err() {
                // The stasher is gone, which only happens on a fatal storage error
                tracing::error!(worker = self.id, "Result queue closed");
                self.cancel.raise();
                report.discarded += 1;
                continue;
            }
            if let Some(warning) = warning {
                tracing::debug!(worker = self.id, file = %warning.file_name, "{}", warning.message);
                report.failed += 1;
                let _ = self.warnings.send(warning);
            }
            self.counter.increment();
            report.processed += 1;
        }

        tracing::debug!(worker = self.id, ?report, "Worker finished");
        report
    }
}

/// Analyze one job into a uniform result. Never fails and never panics.
pub fn analyze_job<A: Analyzer + ?Sized>(analyzer: &A, job: &Job) -> AnalysisResult {
    let file_name = job.file_name();

    let content_id = match content_id(job.path()) {
        Ok(id) => id,
        Err(source) => {
            let error = AnalysisError::Io {
                path: job.path().to_path_buf(),
                source,
            };
            return AnalysisResult::failure(String::new(), file_name, error.to_string());
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let document = analyzer.parse(job.path())?;
        let tree = render_tree(document.revisions());
        let script = extract_scripts(&document);
        let binary = extract_embedded_binaries(&document);
        Ok::<_, AnalysisError>((tree, script, binary))
    }))
    .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok((tree, script, binary)) => {
            let fingerprint = tree_fingerprint(&tree);
            AnalysisResult::success(content_id, fingerprint, tree, script, binary, file_name)
        }
        Err(error) => AnalysisResult::failure(content_id, file_name, error.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DocObject, NodeInfo, ObjectId, Revision};
    use crossbeam::channel::unbounded;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct OneNode(Vec<Revision>);

    impl Document for OneNode {
        fn revisions(&self) -> &[Revision] {
            &self.0
        }
        fn script_objects(&self, _: usize) -> Vec<ObjectId> {
            Vec::new()
        }
        fn stream_objects(&self, _: usize) -> Vec<ObjectId> {
            Vec::new()
        }
        fn object(&self, _: usize, _: ObjectId) -> Option<&DocObject> {
            None
        }
    }

    /// Succeeds for `*.ok`, errors for `*.bad`, panics otherwise
    struct ByExtension;

    impl Analyzer for ByExtension {
        type Document = OneNode;

        fn parse(&self, path: &Path) -> Result<OneNode, AnalysisError> {
            match path.extension().and_then(|e| e.to_str()) {
                Some("ok") => {
                    let mut revision = Revision {
                        root: Some(1),
                        ..Revision::default()
                    };
                    revision.nodes.insert(1, NodeInfo::new("/Catalog", Vec::new()));
                    Ok(OneNode(vec![revision]))
                }
                Some("bad") => Err(AnalysisError::Parse("broken xref".to_string())),
                _ => panic!("analyzer exploded"),
            }
        }
    }

    fn write(dir: &TempDir, name: &str) -> Job {
        let path = dir.path().join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        Job::new(path)
    }

    #[test]
    fn test_success_fields() {
        let dir = TempDir::new().unwrap();
        let result = analyze_job(&ByExtension, &write(&dir, "a.ok"));

        assert!(!result.is_failure());
        assert_eq!(result.tree, "/Catalog (1) ");
        assert_eq!(result.fingerprint, tree_fingerprint("/Catalog (1) "));
        assert_eq!(result.content_id.len(), 64);
        assert_eq!(result.file_name, "a.ok");
    }

    #[test]
    fn test_error_and_panic_become_diagnostics() {
        let dir = TempDir::new().unwrap();

        let failed = analyze_job(&ByExtension, &write(&dir, "b.bad"));
        assert!(failed.is_failure());
        assert!(failed.fingerprint.is_empty());
        assert_eq!(failed.content_id.len(), 64);
        assert!(failed.tree.contains("broken xref"));

        let panicked = analyze_job(&ByExtension, &write(&dir, "c.boom"));
        assert!(panicked.is_failure());
        assert!(panicked.tree.contains("analyzer exploded"));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let result = analyze_job(&ByExtension, &Job::new(dir.path().join("gone.ok")));
        assert!(result.is_failure());
        assert!(result.content_id.is_empty());
        assert!(result.tree.starts_with("Failed to read"));
    }

    #[test]
    fn test_worker_loop_counts_and_warns() {
        let dir = TempDir::new().unwrap();
        let (job_tx, job_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let (warn_tx, warn_rx) = unbounded();
        let counter = Arc::new(Counter::new("jobs"));

        job_tx.send(Message::Item(write(&dir, "a.ok"))).unwrap();
        job_tx.send(Message::Item(write(&dir, "b.bad"))).unwrap();
        job_tx.send(Message::Done).unwrap();
        // Belongs to another worker and must stay queued
        job_tx.send(Message::Done).unwrap();

        let report = Worker::new(
            0,
            &ByExtension,
            job_rx.clone(),
            result_tx,
            counter.clone(),
            warn_tx,
            CancelToken::new(),
        )
        .run();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.sentinels, 1);
        assert_eq!(counter.value(), 2);
        assert_eq!(result_rx.try_iter().count(), 2);
        assert_eq!(warn_rx.try_iter().count(), 1);
        assert_eq!(job_rx.try_recv().unwrap(), Message::Done);
    }

    #[test]
    fn test_cancelled_worker_discards_queued_jobs() {
        let dir = TempDir::new().unwrap();
        let (job_tx, job_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let (warn_tx, _warn_rx) = unbounded();
        let counter = Arc::new(Counter::new("jobs"));
        let cancel = CancelToken::new();
        cancel.raise();

        job_tx.send(Message::Item(write(&dir, "a.ok"))).unwrap();
        job_tx.send(Message::Done).unwrap();

        let report = Worker::new(0, &ByExtension, job_rx, result_tx, counter.clone(), warn_tx, cancel)
            .run();

        assert_eq!(report.discarded, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(report.sentinels, 1);
        assert_eq!(counter.value(), 0);
        assert_eq!(result_rx.try_iter().count(), 0);
    }
}
