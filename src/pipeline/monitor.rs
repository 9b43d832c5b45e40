//! Progress rendering driven by counter events
//!
//! The monitor never reads counters directly. It folds the [`CounterEvent`]s each
//! counter publishes into a local view and renders that with indicatif: a
//! "filling queues" spinner while the hard max is unknown, a bar once it is set.
//! Events from different threads can arrive out of order, so the view keeps the
//! highest value seen.

use super::counter::{CounterEvent, CounterSnapshot};
use super::worker::Warning;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::LazyLock;
use std::time::Duration;

static SPINNER_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {prefix:>8} {msg} [{elapsed_precise}]")
        .expect("valid progress template")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
});

static BAR_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:>8} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({percent}%)")
        .expect("valid progress template")
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
});

struct CounterView {
    name: &'static str,
    snapshot: CounterSnapshot,
    bar: ProgressBar,
    determinate: bool,
}

impl CounterView {
    fn merge(&mut self, update: CounterSnapshot) {
        self.snapshot.value = self.snapshot.value.max(update.value);
        self.snapshot.hard_max = update.hard_max.or(self.snapshot.hard_max);
        self.snapshot.soft_max = update.soft_max.or(self.snapshot.soft_max);
    }

    fn render(&mut self) {
        let snapshot = self.snapshot;
        match snapshot.hard_max {
            Some(max) => {
                if !self.determinate {
                    self.bar.set_style(BAR_STYLE.clone());
                    self.bar.set_message("");
                    self.determinate = true;
                }
                self.bar.set_length(max as u64);
                self.bar.set_position(snapshot.value as u64);
            }
            None => {
                let message = match snapshot.soft_max {
                    Some(estimate) => format!("filling queues ({} of ~{estimate})", snapshot.value),
                    None => format!("filling queues ({})", snapshot.value),
                };
                self.bar.set_message(message);
            }
        }
    }
}

/// What the monitor observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub events: usize,
    pub warnings: usize,
    /// Every counter reached its hard max before the event channel closed
    pub completed: bool,
}

pub struct ProgressMonitor {
    events: Receiver<CounterEvent>,
    warnings: Receiver<Warning>,
    multi: MultiProgress,
    views: Vec<CounterView>,
    tick: Duration,
}

impl ProgressMonitor {
    pub fn new(
        events: Receiver<CounterEvent>,
        warnings: Receiver<Warning>,
        counters: &[&'static str],
        tick: Duration,
        draw_target: ProgressDrawTarget,
    ) -> Self {
        let multi = MultiProgress::with_draw_target(draw_target);
        let views = counters
            .iter()
            .map(|&name| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(SPINNER_STYLE.clone());
                bar.set_prefix(name);
                bar.set_message("filling queues");
                bar.enable_steady_tick(tick);
                CounterView {
                    name,
                    snapshot: CounterSnapshot {
                        value: 0,
                        hard_max: None,
                        soft_max: None,
                    },
                    bar,
                    determinate: false,
                }
            })
            .collect();

        Self {
            events,
            warnings,
            multi,
            views,
            tick,
        }
    }

    /// Render until every counter completes or the counters are dropped
    pub fn run(mut self) -> MonitorReport {
        let mut report = MonitorReport::default();

        loop {
            match self.events.recv_timeout(self.tick) {
                Ok(event) => {
                    report.events += 1;
                    self.apply(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            report.warnings += self.drain_warnings();
            if self.all_complete() {
                report.completed = true;
                break;
            }
        }

        report.warnings += self.drain_warnings();
        for view in &self.views {
            view.bar.finish();
        }
        tracing::debug!(?report, "Progress monitor finished");
        report
    }

    fn apply(&mut self, event: CounterEvent) {
        if let Some(view) = self.views.iter_mut().find(|v| v.name == event.counter) {
            view.merge(event.snapshot);
            view.render();
        }
    }

    fn all_complete(&self) -> bool {
        !self.views.is_empty() && self.views.iter().all(|v| v.snapshot.is_complete())
    }

    fn drain_warnings(&self) -> usize {
        let mut drained = 0;
        for warning in self.warnings.try_iter() {
            drained += 1;
            let line = format!("{}: {}", warning.file_name, warning.message);
            if self.multi.is_hidden() {
                tracing::warn!("{line}");
            } else {
                let _ = self.multi.println(format!("{} {line}", console::style("⚠").yellow()));
            }
        }
        drained
    }
}
